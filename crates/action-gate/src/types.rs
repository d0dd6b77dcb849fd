//! Evaluation results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stepwright_core_types::{ErrorCode, Severity};

use crate::conditions::{ConditionKind, ConditionSpec};

/// Result of evaluating one condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    pub kind: ConditionKind,
    pub ok: bool,
    pub severity: Severity,

    /// Observed values; carries `code` when a target was missing or ambiguous
    #[serde(default)]
    pub details: Value,
}

impl ConditionOutcome {
    pub fn new(spec: &ConditionSpec, ok: bool, details: Value) -> Self {
        Self {
            kind: spec.kind,
            ok,
            severity: spec.severity,
            details,
        }
    }

    /// Failed at error or critical severity
    pub fn is_blocking(&self) -> bool {
        !self.ok && self.severity.is_blocking()
    }

    /// Catalog code recorded by the evaluator, if any
    pub fn code(&self) -> Option<ErrorCode> {
        self.details
            .get("code")
            .and_then(|code| serde_json::from_value(code.clone()).ok())
    }
}

/// Outcomes that fail at a blocking severity
pub fn blocking_failures(outcomes: &[ConditionOutcome]) -> Vec<&ConditionOutcome> {
    outcomes.iter().filter(|o| o.is_blocking()).collect()
}
