//! Offline view of a finished (or interrupted) run.
//!
//! Everything here is derived from `trace.jsonl` and
//! `evidence_manifest.json` alone; no browser is needed.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use stepwright_core_types::RunId;
use stepwright_evidence_store::{
    load_manifest, read_trace, verify_manifest, EvidenceResult, IntegrityIssue, TraceEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Succeeded,
    Failed,
    NotReached,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub action_id: String,
    pub state: ActionState,
    pub attempts: u32,
    /// Error code of the last failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    /// `None` when the trace has no `run_finished` line
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<String>,
    pub finalized: bool,
    pub event_counts: BTreeMap<String, usize>,
    pub actions: Vec<ActionOutcome>,
    pub evidence_items: usize,
    pub redactions: u64,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.status.is_some() && self.finalized
    }
}

/// Reconstruct a run's outcome from its directory
pub fn load_run(run_dir: &Path) -> EvidenceResult<RunSummary> {
    let manifest = load_manifest(run_dir)?;
    let events = read_trace(run_dir)?;

    let mut order: Vec<String> = manifest
        .metadata
        .get("actions")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let mut outcomes: BTreeMap<String, ActionOutcome> = BTreeMap::new();
    let mut event_counts = BTreeMap::new();
    let mut finished: Option<&TraceEvent> = None;

    for event in &events {
        *event_counts.entry(event.event.clone()).or_insert(0) += 1;
        if event.event == "run_finished" {
            finished = Some(event);
        }
        let Some(action_id) = event.action_id.as_deref() else {
            continue;
        };
        if !order.iter().any(|id| id == action_id) {
            order.push(action_id.to_string());
        }
        let outcome = outcomes
            .entry(action_id.to_string())
            .or_insert_with(|| ActionOutcome {
                action_id: action_id.to_string(),
                state: ActionState::NotReached,
                attempts: 0,
                last_code: None,
            });
        if let Some(attempt) = event.attempt {
            outcome.attempts = outcome.attempts.max(attempt);
        }
        match event.event.as_str() {
            "action_failed" => {
                outcome.state = ActionState::Failed;
                outcome.last_code = payload_str(&event.payload, "code");
            }
            _ if event.state == "SUCCESS" => outcome.state = ActionState::Succeeded,
            _ => {}
        }
    }

    let actions = order
        .into_iter()
        .map(|id| {
            outcomes.remove(&id).unwrap_or(ActionOutcome {
                action_id: id,
                state: ActionState::NotReached,
                attempts: 0,
                last_code: None,
            })
        })
        .collect();

    Ok(RunSummary {
        run_id: manifest.run_id.clone(),
        status: finished.and_then(|e| payload_str(&e.payload, "status")),
        error_code: finished.and_then(|e| payload_str(&e.payload, "code")),
        halt_reason: finished.and_then(|e| payload_str(&e.payload, "halt_reason")),
        finalized: manifest.finalized,
        event_counts,
        actions,
        evidence_items: manifest.items.len(),
        redactions: manifest.redaction.total,
    })
}

/// Re-hash every manifest item against the bytes on disk
pub fn verify_evidence(run_dir: &Path) -> EvidenceResult<Vec<IntegrityIssue>> {
    let manifest = load_manifest(run_dir)?;
    Ok(verify_manifest(run_dir, &manifest))
}

fn payload_str(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}
