//! Per-kind dispatch

use std::thread;
use std::time::{Duration, Instant};

use action_locator::TargetSpec;
use serde_json::json;
use stepwright_core_types::{ErrorCode, ExecutorError};
use stepwright_driver::{BrowserDriver, DriverError, LoadState};
use tracing::debug;

use crate::compiler::{failing_kinds, ActionCompiler};
use crate::result::ActionResult;
use crate::spec::{ActionKind, ActionSpec, ValueSource};

impl ActionCompiler {
    pub(crate) fn dispatch(
        &self,
        driver: &mut dyn BrowserDriver,
        action: &ActionSpec,
        target: Option<&TargetSpec>,
        result: &mut ActionResult,
    ) -> Result<(), ExecutorError> {
        let timeout = self.config().timeout_for(action.timeout_ms);
        match action.kind {
            ActionKind::Navigate => self.navigate(driver, action, timeout),
            ActionKind::Click => {
                let target = require_target(action, target)?;
                let handle = self.resolver.resolve_unique(&*driver, target, timeout)?;
                driver.click(&handle, timeout)?;
                Ok(())
            }
            ActionKind::Fill => {
                let target = require_target(action, target)?;
                let value = self.resolve_value(action, result)?;
                let handle = self.resolver.resolve_unique(&*driver, target, timeout)?;
                driver.click(&handle, timeout)?;
                driver.fill(&handle, &value, timeout)?;
                Ok(())
            }
            ActionKind::WaitFor => self.wait_for(&*driver, action, target, timeout, result),
            ActionKind::Assert => self.assert(&*driver, action, target, result),
            ActionKind::Upload => self.upload(driver, action, target, timeout),
            ActionKind::Noop => Ok(()),
        }
    }

    fn navigate(
        &self,
        driver: &mut dyn BrowserDriver,
        action: &ActionSpec,
        timeout: Duration,
    ) -> Result<(), ExecutorError> {
        let url = action
            .navigation_url()
            .ok_or_else(|| ExecutorError::invalid_spec(format!("{} has no url", action.id)))?;
        driver
            .navigate(url, timeout)
            .map_err(|err| navigation_error(err, timeout))?;
        driver
            .wait_for_load_state(LoadState::NetworkIdle, timeout)
            .map_err(|err| navigation_error(err, timeout))
    }

    /// Poll postconditions until all pass or the timeout elapses
    fn wait_for(
        &self,
        driver: &dyn BrowserDriver,
        action: &ActionSpec,
        target: Option<&TargetSpec>,
        timeout: Duration,
        result: &mut ActionResult,
    ) -> Result<(), ExecutorError> {
        let poll = self.config().wait_poll_interval();
        let started = Instant::now();
        let mut polls = 0u32;
        loop {
            polls += 1;
            let outcomes = self
                .evaluator
                .evaluate_all(driver, &action.postconditions, target);
            let pending = failing_kinds(&outcomes);
            result.postconditions = outcomes;
            if pending.is_empty() {
                debug!(action_id = %action.id, polls, "wait satisfied");
                return Ok(());
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ExecutorError::new(
                    ErrorCode::PostconditionFailed,
                    format!(
                        "{} condition(s) still failing after {} ms",
                        pending.len(),
                        timeout.as_millis()
                    ),
                )
                .with_detail("failed", json!(pending))
                .with_detail("polls", polls));
            }
            thread::sleep(poll.min(timeout - elapsed));
        }
    }

    /// Read-only: assertions, or postconditions when there are none
    fn assert(
        &self,
        driver: &dyn BrowserDriver,
        action: &ActionSpec,
        target: Option<&TargetSpec>,
        result: &mut ActionResult,
    ) -> Result<(), ExecutorError> {
        let conditions = if action.assertions.is_empty() {
            &action.postconditions
        } else {
            &action.assertions
        };
        let outcomes = self.evaluator.evaluate_all(driver, conditions, target);
        let failed = failing_kinds(&outcomes);
        if action.assertions.is_empty() {
            result.postconditions = outcomes;
        } else {
            result.assertions = outcomes;
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ExecutorError::new(
                ErrorCode::AssertionFailed,
                format!("{} assertion(s) failed", failed.len()),
            )
            .with_detail("failed", json!(failed)))
        }
    }

    fn upload(
        &self,
        driver: &mut dyn BrowserDriver,
        action: &ActionSpec,
        target: Option<&TargetSpec>,
        timeout: Duration,
    ) -> Result<(), ExecutorError> {
        let target = require_target(action, target)?;
        let handle = self.resolver.resolve_unique(&*driver, target, timeout)?;

        let tag = driver.tag_name(&handle)?;
        let input_type = driver.attribute(&handle, "type")?.unwrap_or_default();
        if tag != "input" || !input_type.eq_ignore_ascii_case("file") {
            return Err(ExecutorError::invalid_spec(format!(
                "upload target {target} is <{tag} type={input_type:?}>, not a file input"
            )));
        }
        if action.input.files.is_empty() {
            return Err(ExecutorError::invalid_spec(format!(
                "{} has no files to upload",
                action.id
            )));
        }
        if let Some(missing) = action.input.files.iter().find(|path| !path.is_file()) {
            return Err(ExecutorError::invalid_spec(format!(
                "upload file {} does not exist",
                missing.display()
            )));
        }

        driver
            .set_input_files(&handle, &action.input.files)
            .map_err(|err| {
                ExecutorError::new(ErrorCode::UploadFailed, err.to_string())
                    .with_detail("driver_error", err.kind())
            })
    }

    /// Literal or secret value; only the source label is recorded
    fn resolve_value(
        &self,
        action: &ActionSpec,
        result: &mut ActionResult,
    ) -> Result<String, ExecutorError> {
        let source = action
            .input
            .value
            .as_ref()
            .ok_or_else(|| ExecutorError::invalid_spec(format!("{} has no value", action.id)))?;
        result.input_source = Some(source.label());
        match source {
            ValueSource::Literal { value } => Ok(value.clone()),
            ValueSource::Secret { name } => self.secrets.resolve(name).ok_or_else(|| {
                ExecutorError::new(
                    ErrorCode::SecretUnavailable,
                    format!("secret '{name}' is not available"),
                )
                .with_detail("secret", name.clone())
            }),
        }
    }
}

fn require_target<'a>(
    action: &ActionSpec,
    target: Option<&'a TargetSpec>,
) -> Result<&'a TargetSpec, ExecutorError> {
    target.ok_or_else(|| {
        ExecutorError::invalid_spec(format!("{} ({}) requires a target", action.id, action.kind))
    })
}

fn navigation_error(err: DriverError, timeout: Duration) -> ExecutorError {
    if err.is_timeout() {
        ExecutorError::new(
            ErrorCode::NavigationTimeout,
            format!("navigation did not settle within {} ms", timeout.as_millis()),
        )
    } else {
        err.into()
    }
}
