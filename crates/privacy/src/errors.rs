use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PrivacyError {
    #[error("invalid redaction pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },
}

pub type PrivacyResult<T> = Result<T, PrivacyError>;
