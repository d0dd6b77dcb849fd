//! Error types for condition evaluation

use action_locator::LocatorError;
use stepwright_core_types::ErrorCode;
use stepwright_driver::DriverError;
use thiserror::Error;

/// Gate error enumeration.
///
/// Never escapes [`crate::ConditionEvaluator::evaluate`]; it is folded into
/// the outcome details.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GateError {
    /// Required argument absent
    #[error("Condition '{kind}' requires argument '{arg}'")]
    MissingArgument { kind: String, arg: String },

    /// Argument present but unusable (wrong type, bad regex)
    #[error("Condition '{kind}' has invalid argument '{arg}': {reason}")]
    InvalidArgument {
        kind: String,
        arg: String,
        reason: String,
    },

    /// Element condition without a target and no action target to fall back to
    #[error("Condition '{0}' has no target")]
    NoTarget(String),

    /// Target resolution failed
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// Driver failed while reading state
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl GateError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            GateError::Locator(err) => err.is_retryable(),
            GateError::Driver(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Catalog code reported in outcome details
    pub fn code(&self) -> ErrorCode {
        match self {
            GateError::Locator(err) => err.code(),
            GateError::MissingArgument { .. }
            | GateError::InvalidArgument { .. }
            | GateError::NoTarget(_) => ErrorCode::InvalidActionspec,
            GateError::Driver(_) => ErrorCode::DriverError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_the_catalog() {
        let err = GateError::Locator(LocatorError::NotUnique {
            target: "css=a".into(),
            count: 2,
        });
        assert_eq!(err.code(), ErrorCode::TargetNotUnique);
        assert!(err.is_retryable());

        let err = GateError::MissingArgument {
            kind: "url_equals".into(),
            arg: "url".into(),
        };
        assert_eq!(err.code(), ErrorCode::InvalidActionspec);
        assert!(!err.is_retryable());
    }
}
