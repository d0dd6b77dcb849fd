use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs for single-action execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Poll interval of `wait_for`
    pub wait_poll_interval_ms: u64,
    /// Used when an action sets no `timeout_ms`
    pub default_timeout_ms: u64,
    /// Poll interval while waiting for a target to attach
    pub attach_poll_interval_ms: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            wait_poll_interval_ms: 250,
            default_timeout_ms: 10_000,
            attach_poll_interval_ms: 100,
        }
    }
}

impl CompilerConfig {
    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms.max(1))
    }

    pub fn attach_poll_interval(&self) -> Duration {
        Duration::from_millis(self.attach_poll_interval_ms.max(1))
    }

    pub fn timeout_for(&self, timeout_ms: Option<u64>) -> Duration {
        Duration::from_millis(timeout_ms.unwrap_or(self.default_timeout_ms))
    }
}
