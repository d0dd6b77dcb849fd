//! Single-action execution pipeline

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use action_gate::{blocking_failures, ConditionEvaluator, ConditionKind, ConditionOutcome};
use action_locator::{TargetResolver, TargetSpec};
use serde_json::json;
use stepwright_core_types::{ErrorCode, ErrorStage, ExecutorError};
use stepwright_driver::BrowserDriver;
use stepwright_evidence_store::{EvidenceStore, Observer, Phase};
use tracing::{debug, info, warn};

use crate::config::CompilerConfig;
use crate::result::ActionResult;
use crate::secrets::{EnvSecretResolver, SecretResolver};
use crate::spec::{ActionKind, ActionSpec};

/// Run-scoped collaborators for one execution
pub struct StepContext<'a> {
    pub store: &'a mut EvidenceStore,
    pub observer: &'a Observer,
    /// Evidence label, e.g. `002-a1`
    pub step: &'a str,
    /// Replaces the action's own target when recovery substituted one
    pub target: Option<&'a TargetSpec>,
}

/// Executes exactly one [`ActionSpec`] against a driver.
///
/// Never fails outright: every error, including a driver panic, ends up in
/// [`ActionResult::error`].
pub struct ActionCompiler {
    config: CompilerConfig,
    pub(crate) resolver: TargetResolver,
    pub(crate) evaluator: ConditionEvaluator,
    pub(crate) secrets: Arc<dyn SecretResolver>,
}

impl ActionCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            resolver: TargetResolver::new(config.attach_poll_interval()),
            evaluator: ConditionEvaluator::new(),
            secrets: Arc::new(EnvSecretResolver::default()),
            config,
        }
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretResolver>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_evaluator(mut self, evaluator: ConditionEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    pub fn execute(
        &self,
        driver: &mut dyn BrowserDriver,
        action: &ActionSpec,
        ctx: StepContext<'_>,
    ) -> ActionResult {
        let started = Instant::now();
        let StepContext {
            store,
            observer,
            step,
            target,
        } = ctx;
        let target = target.or(action.target.as_ref());
        let mut result = ActionResult::started(action, step);
        info!(action_id = %action.id, kind = %action.kind, %step, "executing action");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(&mut *driver, action, target, store, observer, &mut result)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => result.fail(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(action_id = %action.id, %step, %message, "driver panicked during action");
                result.fail(
                    ExecutorError::internal(format!("driver panicked: {message}"))
                        .with_detail("action_id", action.id.clone()),
                );
            }
        }

        if !result.is_success() || action.is_critical() {
            self.capture_full(&*driver, store, observer, step, &mut result);
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        match &result.error {
            None => debug!(action_id = %action.id, %step, duration_ms = result.duration_ms, "action succeeded"),
            Some(err) => info!(action_id = %action.id, %step, code = %err.code, "action failed"),
        }
        result
    }

    fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        action: &ActionSpec,
        target: Option<&TargetSpec>,
        store: &mut EvidenceStore,
        observer: &Observer,
        result: &mut ActionResult,
    ) -> Result<(), ExecutorError> {
        // 1. Static rules, strong postcondition for critical actions included
        action.validate()?;

        // 2. Before observation
        let before = observe(&*driver, store, observer, result, Phase::Before);
        result.state_before = before;

        // 3. Guard, 4. dispatch
        let mut dispatched = self.check_preconditions(&*driver, action, target, result);
        if dispatched.is_ok() {
            dispatched = self.dispatch(driver, action, target, result);
        }

        // 5. After observation, even when dispatch failed
        let after = observe(&*driver, store, observer, result, Phase::After);
        result.state_after = after;
        dispatched?;

        // 6. Postconditions unless dispatch already evaluated them
        let folded = matches!(action.kind, ActionKind::WaitFor)
            || (action.kind == ActionKind::Assert && action.assertions.is_empty());
        if !folded && !action.postconditions.is_empty() {
            let outcomes = self
                .evaluator
                .evaluate_all(&*driver, &action.postconditions, target);
            let failed = failing_kinds(&outcomes);
            result.postconditions = outcomes;
            if !failed.is_empty() {
                return Err(ExecutorError::new(
                    ErrorCode::PostconditionFailed,
                    format!("{} postcondition(s) failed", failed.len()),
                )
                .with_detail("failed", json!(failed)));
            }
        }
        Ok(())
    }

    fn check_preconditions(
        &self,
        driver: &dyn BrowserDriver,
        action: &ActionSpec,
        target: Option<&TargetSpec>,
        result: &mut ActionResult,
    ) -> Result<(), ExecutorError> {
        let outcomes = self
            .evaluator
            .evaluate_all(driver, &action.preconditions, target);
        let failed = failing_kinds(&outcomes);
        let first = blocking_failures(&outcomes).first().map(|o| (*o).clone());
        result.preconditions = outcomes;

        let Some(first) = first else {
            return Ok(());
        };
        // Missing, ambiguous or obscured targets keep their own code
        let code = first
            .code()
            .filter(|code| code.stage() == ErrorStage::Precondition)
            .unwrap_or(ErrorCode::PreconditionFailed);
        Err(ExecutorError::new(
            code,
            format!("precondition {} failed", first.kind),
        )
        .with_detail("failed", json!(failed))
        .with_detail("condition", first.details))
    }

    fn capture_full(
        &self,
        driver: &dyn BrowserDriver,
        store: &mut EvidenceStore,
        observer: &Observer,
        step: &str,
        result: &mut ActionResult,
    ) {
        match observer.capture_full(driver, store, step, Phase::After) {
            Ok(items) => result.evidence.extend(items),
            Err(err) => warn!(%step, error = %err, "full evidence capture failed"),
        }
        if store.has_full_artifact(step) {
            return;
        }
        match result.error.take() {
            Some(err) => result.error = Some(err.with_detail("evidence_capture_failed", true)),
            None => result.fail(ExecutorError::new(
                ErrorCode::EvidenceCaptureFailed,
                format!("no full evidence captured for critical step {step}"),
            )),
        }
    }
}

/// Kinds of outcomes that failed at a blocking severity
pub(crate) fn failing_kinds(outcomes: &[ConditionOutcome]) -> Vec<ConditionKind> {
    blocking_failures(outcomes).iter().map(|o| o.kind).collect()
}

fn observe(
    driver: &dyn BrowserDriver,
    store: &mut EvidenceStore,
    observer: &Observer,
    result: &mut ActionResult,
    phase: Phase,
) -> Option<String> {
    match observer.capture(driver, store, &result.step, phase) {
        Ok(observation) => {
            result.evidence.extend(observation.items);
            Some(observation.state_key)
        }
        Err(err) => {
            warn!(step = %result.step, %phase, error = %err, "observation failed");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
