//! Recovery strategies tried after retries are exhausted

use std::fmt;
use std::time::Duration;

use action_compiler::ActionSpec;
use action_gate::{ConditionEvaluator, ConditionKind, ConditionSpec};
use action_locator::TargetSpec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stepwright_driver::{BrowserDriver, DriverError, ElementHandle, Locator};
use tracing::{debug, info};

use crate::config::PolicyConfig;
use crate::state::PolicyState;

const DISMISS_CLICK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStep {
    DismissOverlay,
    Reload,
    AlternativeTarget,
}

impl RecoveryStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStep::DismissOverlay => "dismiss_overlay",
            RecoveryStep::Reload => "reload",
            RecoveryStep::AlternativeTarget => "alternative_target",
        }
    }
}

impl fmt::Display for RecoveryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed order of the recovery chain
pub const RECOVERY_CHAIN: [RecoveryStep; 3] = [
    RecoveryStep::DismissOverlay,
    RecoveryStep::Reload,
    RecoveryStep::AlternativeTarget,
];

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// Nothing to do; costs no budget
    NotApplicable,
    /// Tried and did not help; costs one unit
    Failed(String),
    /// Tried and worked; costs one unit and the action retries
    Applied(Value),
}

/// Per-action progress through retries and recovery
#[derive(Debug, Clone, Default)]
pub struct ActionCursor {
    pub attempt: u32,
    /// Retries since the last successful recovery
    pub retries: u32,
    pub recoveries: u32,
    /// Next alternative target to try
    pub alternative: usize,
    /// Substituted target, if any
    pub target: Option<TargetSpec>,
}

/// Runs single recovery steps against the page
pub struct Recovery<'a> {
    pub policy: &'a PolicyConfig,
    pub evaluator: &'a ConditionEvaluator,
}

impl<'a> Recovery<'a> {
    pub fn attempt(
        &self,
        step: RecoveryStep,
        driver: &mut dyn BrowserDriver,
        action: &ActionSpec,
        state: &mut PolicyState,
        cursor: &mut ActionCursor,
    ) -> RecoveryOutcome {
        let outcome = match step {
            RecoveryStep::DismissOverlay => self.dismiss_overlay(driver),
            RecoveryStep::Reload => self.reload(driver, state),
            RecoveryStep::AlternativeTarget => substitute_target(action, cursor),
        };
        debug!(action_id = %action.id, %step, ?outcome, "recovery step");
        outcome
    }

    /// Click the one unambiguous dismiss control of a visible blocking overlay
    fn dismiss_overlay(&self, driver: &mut dyn BrowserDriver) -> RecoveryOutcome {
        let overlay = ConditionSpec::new(ConditionKind::NoBlockingOverlay);
        if self.evaluator.evaluate(&*driver, &overlay, None).ok {
            return RecoveryOutcome::NotApplicable;
        }
        let (handle, via) = match self.find_dismiss_control(&*driver) {
            Ok(Some(found)) => found,
            Ok(None) => return RecoveryOutcome::NotApplicable,
            Err(err) => return RecoveryOutcome::Failed(err.to_string()),
        };
        if let Err(err) = driver.click(&handle, DISMISS_CLICK_TIMEOUT) {
            return RecoveryOutcome::Failed(err.to_string());
        }
        if self.evaluator.evaluate(&*driver, &overlay, None).ok {
            info!(%via, "blocking overlay dismissed");
            RecoveryOutcome::Applied(json!({ "via": via }))
        } else {
            RecoveryOutcome::Failed(format!("overlay still present after clicking {via}"))
        }
    }

    /// Selector candidates first, then exact button text; a candidate
    /// matching more than one visible element is skipped.
    fn find_dismiss_control(
        &self,
        driver: &dyn BrowserDriver,
    ) -> Result<Option<(ElementHandle, String)>, DriverError> {
        let by_selector = self
            .policy
            .overlay_dismiss_selectors
            .iter()
            .map(|s| (Locator::css(s.as_str()), format!("selector:{s}")));
        let by_text = self
            .policy
            .overlay_dismiss_texts
            .iter()
            .map(|t| (Locator::text(t.as_str(), true), format!("text:{t}")));
        for (locator, via) in by_selector.chain(by_text) {
            let mut visible = Vec::new();
            for handle in driver.query(&[], &locator)? {
                if driver.is_visible(&handle)? {
                    visible.push(handle);
                }
            }
            if visible.len() == 1 {
                return Ok(visible.pop().map(|handle| (handle, via)));
            }
        }
        Ok(None)
    }

    fn reload(&self, driver: &mut dyn BrowserDriver, state: &mut PolicyState) -> RecoveryOutcome {
        if !self.policy.allow_reload_once || state.reload_used {
            return RecoveryOutcome::NotApplicable;
        }
        state.reload_used = true;
        match driver.reload(self.policy.reload_timeout()) {
            Ok(()) => RecoveryOutcome::Applied(json!({})),
            Err(err) => RecoveryOutcome::Failed(err.to_string()),
        }
    }
}

fn substitute_target(action: &ActionSpec, cursor: &mut ActionCursor) -> RecoveryOutcome {
    let Some(next) = action.alternative_targets.get(cursor.alternative) else {
        return RecoveryOutcome::NotApplicable;
    };
    cursor.alternative += 1;
    cursor.target = Some(next.clone());
    RecoveryOutcome::Applied(json!({ "target": next.to_string(), "index": cursor.alternative - 1 }))
}
