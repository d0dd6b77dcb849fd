//! Run-scoped policy counters

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

/// Distinct state keys remembered for revisit detection
pub const RECENT_WINDOW: usize = 5;

/// Mutable counters for one run; created at `run_started`, dropped at the end
#[derive(Debug, Default, Clone, Serialize)]
pub struct PolicyState {
    /// Action attempts so far, retries included
    pub attempts: u32,
    pub retries_used: u32,
    pub recovery_used: u32,
    pub reload_used: bool,
    revisits: HashMap<String, u32>,
    recent: VecDeque<String>,
    last_key: Option<String>,
}

impl PolicyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a "before" state without counting it
    pub fn register_before(&mut self, key: &str) {
        self.remember(key);
    }

    /// Count an "after" state and return its revisit count.
    ///
    /// A key is a revisit when it equals the previous key or is still in the
    /// window of recent distinct keys.
    pub fn record_after(&mut self, key: &str) -> u32 {
        let repeated =
            self.last_key.as_deref() == Some(key) || self.recent.iter().any(|k| k == key);
        let count = self.revisits.entry(key.to_string()).or_insert(0);
        if repeated {
            *count += 1;
        }
        let count = *count;
        self.remember(key);
        count
    }

    pub fn revisits(&self, key: &str) -> u32 {
        self.revisits.get(key).copied().unwrap_or(0)
    }

    fn remember(&mut self, key: &str) {
        self.recent.retain(|k| k != key);
        self.recent.push_back(key.to_string());
        while self.recent.len() > RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.last_key = Some(key.to_string());
    }
}
