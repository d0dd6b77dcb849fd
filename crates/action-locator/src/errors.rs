//! Error types for target resolution

use stepwright_core_types::{ErrorCode, ExecutorError};
use stepwright_driver::DriverError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    /// Nothing attached before the timeout
    #[error("Target not found: {0}")]
    NotFound(String),

    /// More than one element matches a target that must be unique
    #[error("Target not unique: {target} matched {count} elements")]
    NotUnique { target: String, count: usize },

    /// Malformed spec, or a spec kind that cannot be resolved to elements
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Driver failed while querying
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::NotFound(_) | LocatorError::NotUnique { .. } => true,
            LocatorError::InvalidTarget(_) => false,
            LocatorError::Driver(err) => err.is_retryable(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LocatorError::NotFound(_) => ErrorCode::TargetNotFound,
            LocatorError::NotUnique { .. } => ErrorCode::TargetNotUnique,
            LocatorError::InvalidTarget(_) => ErrorCode::InvalidActionspec,
            LocatorError::Driver(_) => ErrorCode::DriverError,
        }
    }
}

impl From<LocatorError> for ExecutorError {
    fn from(err: LocatorError) -> Self {
        let code = err.code();
        let base = ExecutorError::new(code, err.to_string());
        match err {
            LocatorError::NotUnique { count, .. } => base.with_detail("count", count),
            LocatorError::Driver(driver) => base.with_detail("driver_error", driver.kind()),
            _ => base,
        }
    }
}
