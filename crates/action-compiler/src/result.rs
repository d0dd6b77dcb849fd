//! Structured outcome of one action execution

use action_gate::ConditionOutcome;
use serde::{Deserialize, Serialize};
use stepwright_core_types::ExecutorError;
use stepwright_evidence_store::EvidenceItem;

use crate::spec::{ActionKind, ActionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,
    pub kind: ActionKind,
    pub step: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutorError>,
    /// State key of the "before" observation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_after: Option<String>,
    #[serde(default)]
    pub preconditions: Vec<ConditionOutcome>,
    #[serde(default)]
    pub postconditions: Vec<ConditionOutcome>,
    #[serde(default)]
    pub assertions: Vec<ConditionOutcome>,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    /// `literal` or `secret:<name>` for fill actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_source: Option<String>,
    pub duration_ms: u64,
}

impl ActionResult {
    pub(crate) fn started(action: &ActionSpec, step: &str) -> Self {
        Self {
            action_id: action.id.clone(),
            kind: action.kind,
            step: step.to_string(),
            status: ActionStatus::Success,
            error: None,
            state_before: None,
            state_after: None,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            assertions: Vec::new(),
            evidence: Vec::new(),
            input_source: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }

    pub(crate) fn fail(&mut self, error: ExecutorError) {
        self.status = ActionStatus::Failed;
        self.error = Some(error);
    }
}
