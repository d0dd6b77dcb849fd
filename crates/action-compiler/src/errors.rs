//! Static validation errors for action specs

use action_gate::GateError;
use action_locator::LocatorError;
use stepwright_core_types::{ErrorCode, ExecutorError};
use thiserror::Error;

/// Reasons an [`crate::ActionSpec`] is rejected before anything runs.
///
/// All of them map to `INVALID_ACTIONSPEC` and are never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpecError {
    #[error("Action id must not be empty")]
    EmptyId,

    /// A field the action kind needs is absent
    #[error("Action '{action}' ({kind}) requires {field}")]
    MissingField {
        action: String,
        kind: String,
        field: &'static str,
    },

    #[error("Action '{action}' has an invalid target: {source}")]
    Target {
        action: String,
        #[source]
        source: LocatorError,
    },

    /// `url` targets only make sense for navigation
    #[error("Action '{action}' ({kind}) cannot act on a url target")]
    UrlTarget { action: String, kind: String },

    #[error("Action '{action}' {list}[{index}] is invalid: {source}")]
    Condition {
        action: String,
        list: &'static str,
        index: usize,
        #[source]
        source: GateError,
    },

    /// Critical actions must prove their effect
    #[error("Critical action '{0}' has no strong postcondition")]
    NoStrongPostcondition(String),

    #[error("Action '{0}' has a zero timeout")]
    ZeroTimeout(String),

    #[error("Duplicate action id '{0}'")]
    DuplicateId(String),
}

impl From<SpecError> for ExecutorError {
    fn from(err: SpecError) -> Self {
        let rule = match &err {
            SpecError::NoStrongPostcondition(_) => "strong_postcondition",
            SpecError::Target { .. } | SpecError::UrlTarget { .. } => "target",
            SpecError::Condition { .. } => "condition",
            _ => "shape",
        };
        ExecutorError::new(ErrorCode::InvalidActionspec, err.to_string()).with_detail("rule", rule)
    }
}
