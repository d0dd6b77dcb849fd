//! Step loop: sequencing, retry, recovery, anti-loop and the audit trail

use std::path::PathBuf;
use std::thread;

use action_compiler::{
    validate_flow, ActionCompiler, ActionKind, ActionResult, ActionSpec, StepContext,
};
use action_gate::ConditionOutcome;
use chrono::Utc;
use serde_json::{json, Value};
use stepwright_core_types::{ErrorCode, ExecutorError, RunId};
use stepwright_driver::BrowserDriver;
use stepwright_evidence_store::{
    step_label, EvidenceStore, Observer, TraceRecord, TraceWriter,
};
use stepwright_privacy::Redactor;
use tracing::{debug, info, warn};

use crate::config::{PolicyConfig, RunMode};
use crate::errors::FlowError;
use crate::report::{RunReport, RunStatus};
use crate::state::PolicyState;
use crate::strategies::{ActionCursor, Recovery, RecoveryOutcome, RECOVERY_CHAIN};

/// Mutable state of one run, threaded through the loop explicitly
struct RunContext {
    store: EvidenceStore,
    trace: TraceWriter,
    state: PolicyState,
    results: Vec<ActionResult>,
    completed: usize,
}

impl RunContext {
    fn emit(&mut self, record: TraceRecord) -> Result<(), FlowError> {
        self.trace.append(record)?;
        Ok(())
    }

    /// Fold trace redactions into the manifest and persist it
    fn checkpoint(&mut self) -> Result<(), FlowError> {
        let report = self.trace.take_redactions();
        self.store.merge_redactions(&report);
        self.store.persist()?;
        Ok(())
    }
}

/// Why the loop stopped before the last action
struct Stop {
    status: RunStatus,
    error: ExecutorError,
    halt_reason: Option<String>,
}

impl Stop {
    fn failed(error: ExecutorError) -> Self {
        Self {
            status: RunStatus::Failed,
            error,
            halt_reason: None,
        }
    }
}

/// Sequences an ordered action list against one browser session
pub struct StepLoop {
    policy: PolicyConfig,
    compiler: ActionCompiler,
    observer: Observer,
    redactor: Redactor,
    runs_root: PathBuf,
}

impl StepLoop {
    pub fn new(
        runs_root: impl Into<PathBuf>,
        policy: PolicyConfig,
        compiler: ActionCompiler,
        observer: Observer,
        redactor: Redactor,
    ) -> Self {
        Self {
            policy,
            compiler,
            observer,
            redactor,
            runs_root: runs_root.into(),
        }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn runs_root(&self) -> &PathBuf {
        &self.runs_root
    }

    /// Static validation of a whole flow, duplicate ids included
    pub fn validate(&self, actions: &[ActionSpec]) -> Result<(), FlowError> {
        validate_flow(actions)?;
        Ok(())
    }

    /// Execute `actions` in order.
    ///
    /// Starts and closes the driver session. Only failures to write the run
    /// directory surface as `Err`; every other outcome is in the report and
    /// ends with a `run_finished` trace event.
    pub fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        actions: &[ActionSpec],
        run_id: RunId,
    ) -> Result<RunReport, FlowError> {
        let started_at = Utc::now();
        let mut store = EvidenceStore::create(&self.runs_root, &run_id)?;
        let trace = TraceWriter::create(
            &store.layout().trace_path(),
            run_id.clone(),
            self.redactor.clone(),
        )?;
        let action_ids: Vec<&str> = actions.iter().map(|a| a.id.as_str()).collect();
        store.set_metadata("mode", json!(self.policy.mode));
        store.set_metadata("actions", json!(action_ids));
        let mut ctx = RunContext {
            store,
            trace,
            state: PolicyState::new(),
            results: Vec::new(),
            completed: 0,
        };

        info!(%run_id, actions = actions.len(), mode = %self.policy.mode, "run started");
        ctx.emit(TraceRecord::new("run_started", "INIT").payload(json!({
            "actions": action_ids,
            "mode": self.policy.mode,
            "retries_per_action": self.policy.retries_per_action,
            "recovery_max": self.policy.recovery_max,
            "same_state_revisits": self.policy.same_state_revisits,
            "hard_cap_steps": self.policy.hard_cap_steps,
        })))?;

        let outcome = match driver.start() {
            Ok(()) => self.steps(driver, actions, &mut ctx),
            Err(err) => {
                warn!(%run_id, error = %err, "driver session failed to start");
                Ok(Some(Stop::failed(err.into())))
            }
        };
        if let Err(err) = driver.close() {
            warn!(%run_id, error = %err, "driver session did not close cleanly");
        }
        let stop = outcome?;

        let (status, error, halt_reason) = match stop {
            None => (RunStatus::Success, None, None),
            Some(stop) => (stop.status, Some(stop.error), stop.halt_reason),
        };
        ctx.emit(TraceRecord::new("run_finished", "FINISHED").payload(json!({
            "status": status,
            "steps_executed": ctx.state.attempts,
            "actions_completed": ctx.completed,
            "retries_used": ctx.state.retries_used,
            "recovery_used": ctx.state.recovery_used,
            "code": error.as_ref().map(|e| e.code),
            "halt_reason": halt_reason,
        })))?;
        ctx.store.set_metadata("status", json!(status));
        ctx.checkpoint()?;
        ctx.store.finalize()?;
        info!(%run_id, %status, steps = ctx.state.attempts, "run finished");

        Ok(RunReport {
            run_id,
            status,
            mode: self.policy.mode,
            steps_executed: ctx.state.attempts,
            actions_completed: ctx.completed,
            retries_used: ctx.state.retries_used,
            recovery_used: ctx.state.recovery_used,
            error,
            halt_reason,
            results: ctx.results,
            run_dir: ctx.store.run_dir(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn steps(
        &self,
        driver: &mut dyn BrowserDriver,
        actions: &[ActionSpec],
        ctx: &mut RunContext,
    ) -> Result<Option<Stop>, FlowError> {
        for (index, action) in actions.iter().enumerate() {
            let stop = self.run_action(driver, index, action, ctx)?;
            ctx.checkpoint()?;
            if stop.is_some() {
                return Ok(stop);
            }
        }
        Ok(None)
    }

    /// Attempts one action until it succeeds or a terminal condition is met
    fn run_action(
        &self,
        driver: &mut dyn BrowserDriver,
        index: usize,
        action: &ActionSpec,
        ctx: &mut RunContext,
    ) -> Result<Option<Stop>, FlowError> {
        let mut cursor = ActionCursor::default();
        let mut last: Option<ActionResult> = None;
        loop {
            if ctx.state.attempts >= self.policy.hard_cap_steps {
                ctx.results.extend(last);
                let stop = self.policy_stop(
                    ctx,
                    index,
                    action,
                    ErrorCode::HardCapReached,
                    format!("hard cap of {} attempts reached", self.policy.hard_cap_steps),
                    json!({ "hard_cap_steps": self.policy.hard_cap_steps }),
                )?;
                return Ok(Some(stop));
            }
            ctx.state.attempts += 1;
            cursor.attempt += 1;
            let step = step_label(index, cursor.attempt);

            let result = self.compiler.execute(
                driver,
                action,
                StepContext {
                    store: &mut ctx.store,
                    observer: &self.observer,
                    step: &step,
                    target: cursor.target.as_ref(),
                },
            );
            if let Some(key) = &result.state_before {
                ctx.state.register_before(key);
            }

            if result.is_success() {
                ctx.emit(completed_record(index, action, &cursor, &result))?;
                if action.kind == ActionKind::WaitFor {
                    ctx.emit(
                        TraceRecord::new("postconditions_checked", "SUCCESS")
                            .step(index)
                            .action(&action.id)
                            .attempt(cursor.attempt)
                            .payload(json!({
                                "step": result.step,
                                "postconditions": outcome_summary(&result.postconditions),
                            })),
                    )?;
                }
                ctx.completed += 1;
                let after = result.state_after.clone();
                ctx.results.push(result);
                if let Some(key) = after {
                    let count = ctx.state.record_after(&key);
                    if count > self.policy.same_state_revisits {
                        let stop = self.policy_stop(
                            ctx,
                            index,
                            action,
                            ErrorCode::SameStateRevisit,
                            format!("state {key} revisited {count} times"),
                            json!({ "state_key": key, "revisits": count }),
                        )?;
                        return Ok(Some(stop));
                    }
                }
                return Ok(None);
            }

            let error = result
                .error
                .clone()
                .unwrap_or_else(|| ExecutorError::internal("action failed without an error"));
            ctx.emit(
                TraceRecord::new("action_failed", "FAILED")
                    .step(index)
                    .action(&action.id)
                    .attempt(cursor.attempt)
                    .payload(json!({
                        "step": step,
                        "kind": action.kind,
                        "code": error.code,
                        "stage": error.stage,
                        "severity": error.severity,
                        "message": error.message,
                        "retryable": error.retryable,
                        "details": error.details,
                        "state_before": result.state_before,
                        "state_after": result.state_after,
                    })),
            )?;
            last = Some(result);

            if !error.retryable {
                ctx.results.extend(last);
                return Ok(Some(Stop::failed(error)));
            }

            if cursor.retries < self.policy.retries_per_action {
                cursor.retries += 1;
                ctx.state.retries_used += 1;
                let delay = self.policy.backoff(cursor.retries);
                ctx.emit(
                    TraceRecord::new("retry_scheduled", "RETRY")
                        .step(index)
                        .action(&action.id)
                        .attempt(cursor.attempt)
                        .payload(json!({
                            "retry": cursor.retries,
                            "delay_ms": delay.as_millis() as u64,
                            "code": error.code,
                        })),
                )?;
                debug!(action_id = %action.id, retry = cursor.retries, delay_ms = delay.as_millis() as u64, "retry scheduled");
                thread::sleep(delay);
                continue;
            }

            if self.recover(driver, index, action, ctx, &mut cursor, &error)? {
                cursor.retries = 0;
                continue;
            }

            ctx.results.extend(last);
            let stop = self.policy_stop(
                ctx,
                index,
                action,
                ErrorCode::RecoveryExhausted,
                format!("retries and recovery exhausted for {}", action.id),
                json!({
                    "last_code": error.code,
                    "retries": cursor.retries,
                    "recoveries": cursor.recoveries,
                }),
            )?;
            return Ok(Some(stop));
        }
    }

    /// Walk the recovery chain; true when a step worked and the action
    /// should be retried
    fn recover(
        &self,
        driver: &mut dyn BrowserDriver,
        index: usize,
        action: &ActionSpec,
        ctx: &mut RunContext,
        cursor: &mut ActionCursor,
        error: &ExecutorError,
    ) -> Result<bool, FlowError> {
        let recovery = Recovery {
            policy: &self.policy,
            evaluator: self.compiler.evaluator(),
        };
        for strategy in RECOVERY_CHAIN {
            if cursor.recoveries >= self.policy.recovery_max {
                break;
            }
            let (ok, detail) =
                match recovery.attempt(strategy, driver, action, &mut ctx.state, cursor) {
                    RecoveryOutcome::NotApplicable => continue,
                    RecoveryOutcome::Failed(reason) => (false, json!({ "reason": reason })),
                    RecoveryOutcome::Applied(detail) => (true, detail),
                };
            cursor.recoveries += 1;
            ctx.state.recovery_used += 1;
            ctx.emit(
                TraceRecord::new("recovery_attempted", "RECOVER")
                    .step(index)
                    .action(&action.id)
                    .attempt(cursor.attempt)
                    .payload(json!({
                        "strategy": strategy,
                        "ok": ok,
                        "detail": detail,
                        "code": error.code,
                        "budget_left": self.policy.recovery_max - cursor.recoveries,
                    })),
            )?;
            info!(action_id = %action.id, %strategy, ok, "recovery attempted");
            if ok {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Terminal policy outcome: halt for review when interactive, plain
    /// failure when deterministic
    fn policy_stop(
        &self,
        ctx: &mut RunContext,
        index: usize,
        action: &ActionSpec,
        code: ErrorCode,
        message: String,
        details: Value,
    ) -> Result<Stop, FlowError> {
        warn!(action_id = %action.id, %code, mode = %self.policy.mode, "policy limit reached");
        let payload = json!({ "reason": code, "message": message, "details": details });
        match self.policy.mode {
            RunMode::Interactive => {
                ctx.emit(
                    TraceRecord::new("policy_halt", "HALT")
                        .step(index)
                        .action(&action.id)
                        .payload(payload),
                )?;
                let error = ExecutorError::new(
                    ErrorCode::PolicyHalt,
                    format!("halted for review: {message}"),
                )
                .with_details(details)
                .with_detail("reason", code.as_str());
                Ok(Stop {
                    status: RunStatus::Halted,
                    error,
                    halt_reason: Some(code.as_str().to_string()),
                })
            }
            RunMode::Deterministic => {
                ctx.emit(
                    TraceRecord::new("policy_limit_reached", "FAILED")
                        .step(index)
                        .action(&action.id)
                        .payload(payload),
                )?;
                Ok(Stop::failed(
                    ExecutorError::new(code, message).with_details(details),
                ))
            }
        }
    }
}

/// Trace event name for a successful action. `wait_for` is followed by a
/// separate `postconditions_checked` event.
fn completion_event(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Assert => "assert_checked",
        _ => "action_compiled",
    }
}

fn completed_record(
    index: usize,
    action: &ActionSpec,
    cursor: &ActionCursor,
    result: &ActionResult,
) -> TraceRecord {
    TraceRecord::new(completion_event(action.kind), "SUCCESS")
        .step(index)
        .action(&action.id)
        .attempt(cursor.attempt)
        .payload(json!({
            "step": result.step,
            "kind": action.kind,
            "target": cursor.target.as_ref().or(action.target.as_ref()).map(|t| t.to_string()),
            "input": result.input_source,
            "state_before": result.state_before,
            "state_after": result.state_after,
            "preconditions": outcome_summary(&result.preconditions),
            "postconditions": outcome_summary(&result.postconditions),
            "assertions": outcome_summary(&result.assertions),
            "evidence": result.evidence.len(),
            "duration_ms": result.duration_ms,
        }))
}

fn outcome_summary(outcomes: &[ConditionOutcome]) -> Value {
    Value::Array(
        outcomes
            .iter()
            .map(|o| json!({ "kind": o.kind, "ok": o.ok, "severity": o.severity }))
            .collect(),
    )
}
