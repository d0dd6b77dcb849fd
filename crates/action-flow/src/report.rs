//! Run outcome

use std::fmt;
use std::path::PathBuf;

use action_compiler::ActionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwright_core_types::{ExecutorError, RunId};

use crate::config::RunMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    /// Stopped by policy for human review (interactive mode only)
    Halted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Halted => "halted",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub mode: RunMode,
    /// Action attempts, retries included
    pub steps_executed: u32,
    pub actions_completed: usize,
    pub retries_used: u32,
    pub recovery_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutorError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<String>,
    /// Final result of every action that was reached
    pub results: Vec<ActionResult>,
    pub run_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
