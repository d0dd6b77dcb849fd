//! Closed error catalog for the execution engine

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::Severity;

/// Stage of the pipeline an error was raised in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    /// Malformed or unsafe spec, never retried
    Validation,
    /// Guard conditions before dispatch
    Precondition,
    /// Driver dispatch
    Execution,
    /// Expectations after dispatch
    Postcondition,
    /// Run-level policy limits
    Policy,
    /// Evidence capture
    Evidence,
    /// Unexpected fault mapped into the catalog
    Internal,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::Validation => "validation",
            ErrorStage::Precondition => "precondition",
            ErrorStage::Execution => "execution",
            ErrorStage::Postcondition => "postcondition",
            ErrorStage::Policy => "policy",
            ErrorStage::Evidence => "evidence",
            ErrorStage::Internal => "internal",
        }
    }
}

/// Stable error codes. Adding one is a compile-checked change.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidActionspec,
    SecretUnavailable,
    TargetNotFound,
    TargetNotUnique,
    PreconditionFailed,
    BlockingOverlay,
    NavigationTimeout,
    DriverError,
    UploadFailed,
    PostconditionFailed,
    AssertionFailed,
    HardCapReached,
    RecoveryExhausted,
    SameStateRevisit,
    PolicyHalt,
    EvidenceCaptureFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidActionspec => "INVALID_ACTIONSPEC",
            ErrorCode::SecretUnavailable => "SECRET_UNAVAILABLE",
            ErrorCode::TargetNotFound => "TARGET_NOT_FOUND",
            ErrorCode::TargetNotUnique => "TARGET_NOT_UNIQUE",
            ErrorCode::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorCode::BlockingOverlay => "BLOCKING_OVERLAY",
            ErrorCode::NavigationTimeout => "NAVIGATION_TIMEOUT",
            ErrorCode::DriverError => "DRIVER_ERROR",
            ErrorCode::UploadFailed => "UPLOAD_FAILED",
            ErrorCode::PostconditionFailed => "POSTCONDITION_FAILED",
            ErrorCode::AssertionFailed => "ASSERTION_FAILED",
            ErrorCode::HardCapReached => "HARD_CAP_REACHED",
            ErrorCode::RecoveryExhausted => "RECOVERY_EXHAUSTED",
            ErrorCode::SameStateRevisit => "SAME_STATE_REVISIT",
            ErrorCode::PolicyHalt => "POLICY_HALT",
            ErrorCode::EvidenceCaptureFailed => "EVIDENCE_CAPTURE_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn stage(&self) -> ErrorStage {
        match self {
            ErrorCode::InvalidActionspec | ErrorCode::SecretUnavailable => ErrorStage::Validation,
            ErrorCode::TargetNotFound
            | ErrorCode::TargetNotUnique
            | ErrorCode::PreconditionFailed
            | ErrorCode::BlockingOverlay => ErrorStage::Precondition,
            ErrorCode::NavigationTimeout | ErrorCode::DriverError | ErrorCode::UploadFailed => {
                ErrorStage::Execution
            }
            ErrorCode::PostconditionFailed | ErrorCode::AssertionFailed => {
                ErrorStage::Postcondition
            }
            ErrorCode::HardCapReached
            | ErrorCode::RecoveryExhausted
            | ErrorCode::SameStateRevisit
            | ErrorCode::PolicyHalt => ErrorStage::Policy,
            ErrorCode::EvidenceCaptureFailed => ErrorStage::Evidence,
            ErrorCode::InternalError => ErrorStage::Internal,
        }
    }

    /// Only precondition, execution and postcondition failures go through retry/recovery.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.stage(),
            ErrorStage::Precondition | ErrorStage::Execution | ErrorStage::Postcondition
        )
    }

    pub fn default_severity(&self) -> Severity {
        match self.stage() {
            ErrorStage::Evidence => Severity::Warning,
            ErrorStage::Policy | ErrorStage::Internal => Severity::Critical,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by every engine stage.
///
/// `details` is diagnostic JSON and must never carry raw secret values.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq)]
#[error("{code}: {message}")]
pub struct ExecutorError {
    pub code: ErrorCode,
    pub stage: ErrorStage,
    pub severity: Severity,
    pub message: String,
    pub retryable: bool,
    #[serde(default)]
    pub details: Value,
}

impl ExecutorError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            stage: code.stage(),
            severity: code.default_severity(),
            message: message.into(),
            retryable: code.is_retryable(),
            details: Value::Object(Map::new()),
        }
    }

    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidActionspec, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Adds one key to the details object, converting it into an object if needed.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !self.details.is_object() {
            self.details = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn non_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codes_map_to_stages() {
        assert_eq!(ErrorCode::InvalidActionspec.stage(), ErrorStage::Validation);
        assert_eq!(ErrorCode::TargetNotUnique.stage(), ErrorStage::Precondition);
        assert_eq!(ErrorCode::UploadFailed.stage(), ErrorStage::Execution);
        assert_eq!(ErrorCode::PostconditionFailed.stage(), ErrorStage::Postcondition);
        assert_eq!(ErrorCode::SameStateRevisit.stage(), ErrorStage::Policy);
        assert_eq!(ErrorCode::EvidenceCaptureFailed.stage(), ErrorStage::Evidence);
    }

    #[test]
    fn test_retryable_follows_stage() {
        assert!(ErrorCode::TargetNotFound.is_retryable());
        assert!(ErrorCode::NavigationTimeout.is_retryable());
        assert!(ErrorCode::PostconditionFailed.is_retryable());
        assert!(!ErrorCode::InvalidActionspec.is_retryable());
        assert!(!ErrorCode::HardCapReached.is_retryable());
        assert!(!ErrorCode::InternalError.is_retryable());
    }

    #[test]
    fn test_error_serializes_with_stable_code() {
        let err = ExecutorError::new(ErrorCode::TargetNotUnique, "2 elements matched")
            .with_detail("count", 2);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "TARGET_NOT_UNIQUE");
        assert_eq!(value["stage"], "precondition");
        assert_eq!(value["severity"], "error");
        assert_eq!(value["retryable"], true);
        assert_eq!(value["details"], json!({"count": 2}));
        assert_eq!(err.to_string(), "TARGET_NOT_UNIQUE: 2 elements matched");
    }

    #[test]
    fn test_with_detail_replaces_non_object_details() {
        let err = ExecutorError::internal("boom")
            .with_details(json!("raw"))
            .with_detail("phase", "after");
        assert_eq!(err.details, json!({"phase": "after"}));
    }
}
