//! Run-level error types

use action_compiler::SpecError;
use stepwright_evidence_store::EvidenceError;
use thiserror::Error;

/// Errors that prevent a run from producing a trace at all.
///
/// Everything that happens after `run_started` is reported through the
/// [`crate::RunReport`] instead.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Run directory, trace or manifest could not be written
    #[error("Evidence error: {0}")]
    Evidence(#[from] EvidenceError),

    /// Static validation of the action list failed
    #[error("Flow validation failed: {0}")]
    InvalidFlow(#[from] SpecError),
}

impl FlowError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FlowError::Evidence(err) => err.is_retryable(),
            FlowError::InvalidFlow(_) => false,
        }
    }
}
