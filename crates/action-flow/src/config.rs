//! Policy parameters

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How policy limits end a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Policy limits halt the run for human review
    Interactive,
    /// Policy limits fail the run; outcome is always success or failed
    #[default]
    Deterministic,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Interactive => "interactive",
            RunMode::Deterministic => "deterministic",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub mode: RunMode,
    pub retries_per_action: u32,
    pub recovery_max: u32,
    /// Revisits of one state key tolerated before the run stops
    pub same_state_revisits: u32,
    /// Upper bound on action attempts, retries included
    pub hard_cap_steps: u32,
    /// Delay before retry n is `backoff_ms[n - 1]`, capped at the last entry
    pub backoff_ms: Vec<u64>,
    pub allow_reload_once: bool,
    pub reload_timeout_ms: u64,
    /// Dismiss controls tried first, by selector
    pub overlay_dismiss_selectors: Vec<String>,
    /// Then by exact button text
    pub overlay_dismiss_texts: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Deterministic,
            retries_per_action: 2,
            recovery_max: 2,
            same_state_revisits: 3,
            hard_cap_steps: 200,
            backoff_ms: vec![250, 500, 1000],
            allow_reload_once: true,
            reload_timeout_ms: 10_000,
            overlay_dismiss_selectors: vec![
                "[data-dismiss]".into(),
                "[data-overlay-close]".into(),
                "[aria-label=Close]".into(),
                ".cookie-accept".into(),
                ".modal .close".into(),
            ],
            overlay_dismiss_texts: vec![
                "Accept".into(),
                "Accept all".into(),
                "Got it".into(),
                "Close".into(),
                "Dismiss".into(),
                "OK".into(),
            ],
        }
    }
}

impl PolicyConfig {
    /// Delay before the `retry`-th retry (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let index = (retry.max(1) - 1) as usize;
        let ms = self
            .backoff_ms
            .get(index)
            .or_else(|| self.backoff_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_millis(self.reload_timeout_ms)
    }
}
