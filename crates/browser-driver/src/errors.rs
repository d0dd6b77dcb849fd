//! Error types for driver calls

use stepwright_core_types::{ErrorCode, ExecutorError};
use thiserror::Error;

/// Driver failure enumeration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Bounded wait elapsed
    #[error("Driver timeout: {0}")]
    Timeout(String),

    /// Navigation could not complete
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Handle no longer attached to the document
    #[error("Element detached: {0}")]
    Detached(String),

    /// Element exists but cannot receive input (hidden, disabled, obscured)
    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    /// Page script raised or returned garbage
    #[error("Script error: {0}")]
    Script(String),

    /// Capability missing in this driver
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Transport or protocol failure
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Session was closed or never started
    #[error("Session closed")]
    SessionClosed,
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout(_))
    }

    /// Check if the same call may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriverError::Timeout(_)
                | DriverError::Detached(_)
                | DriverError::NotInteractable(_)
                | DriverError::Protocol(_)
        )
    }

    /// Short machine name used in error details
    pub fn kind(&self) -> &'static str {
        match self {
            DriverError::Timeout(_) => "timeout",
            DriverError::Navigation(_) => "navigation",
            DriverError::Detached(_) => "detached",
            DriverError::NotInteractable(_) => "not_interactable",
            DriverError::Script(_) => "script",
            DriverError::Unsupported(_) => "unsupported",
            DriverError::Protocol(_) => "protocol",
            DriverError::SessionClosed => "session_closed",
        }
    }
}

/// Generic execution-stage mapping; callers that know better (navigation,
/// upload) pick their own code instead.
impl From<DriverError> for ExecutorError {
    fn from(err: DriverError) -> Self {
        ExecutorError::new(ErrorCode::DriverError, err.to_string())
            .with_detail("driver_error", err.kind())
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(DriverError::Timeout("nav".into()).is_timeout());
        assert!(!DriverError::Navigation("dns".into()).is_timeout());
        assert!(DriverError::Detached("el-1".into()).is_retryable());
        assert!(!DriverError::SessionClosed.is_retryable());
        assert!(!DriverError::Unsupported("pdf".into()).is_retryable());
    }

    #[test]
    fn test_converts_into_executor_error() {
        let err: ExecutorError = DriverError::NotInteractable("e1".into()).into();
        assert_eq!(err.code, ErrorCode::DriverError);
        assert!(err.retryable);
        assert_eq!(err.details["driver_error"], "not_interactable");
    }
}
