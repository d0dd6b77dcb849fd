//! Stepwright: deterministic browser-automation execution engine
//!
//! The engine crates under `crates/` do the work; this crate wires them
//! together from an [`EngineConfig`] and adds the edges around a run:
//! configuration loading, logging setup, the run lock, worker offload and
//! offline inspection of run directories.

pub mod config;
pub mod errors;
pub mod flow;
pub mod inspect;
pub mod lock;
pub mod telemetry;
pub mod worker;

use std::fs;
use std::sync::Arc;

use action_compiler::{ActionCompiler, ActionSpec, EnvSecretResolver, SecretResolver};
use action_flow::{RunReport, StepLoop};
use anyhow::{Context, Result};
use stepwright_core_types::RunId;
use stepwright_driver::BrowserDriver;
use stepwright_evidence_store::Observer;
use stepwright_privacy::Redactor;
use tracing::info;

pub use config::{load_config, EngineConfig, LoadOptions, LockConfig};
pub use errors::{ConfigError, LockError};
pub use inspect::{load_run, verify_evidence, RunSummary};
pub use lock::RunLock;

/// A configured step loop plus the run-directory guard around it
pub struct Engine {
    config: EngineConfig,
    step_loop: StepLoop,
}

impl Engine {
    /// Secrets come from `STEPWRIGHT_SECRET_*` variables
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_secrets(config, Arc::new(EnvSecretResolver::default()))
    }

    pub fn with_secrets(
        config: EngineConfig,
        secrets: Arc<dyn SecretResolver>,
    ) -> Result<Self, ConfigError> {
        let redactor = Redactor::new(&config.privacy)?;
        let observer = Observer::new(config.capture.clone(), redactor.clone());
        let compiler = ActionCompiler::new(config.compiler.clone()).with_secrets(secrets);
        let step_loop = StepLoop::new(
            &config.runs_root,
            config.policy.clone(),
            compiler,
            observer,
            redactor,
        );
        Ok(Self { config, step_loop })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn step_loop(&self) -> &StepLoop {
        &self.step_loop
    }

    /// Run `actions` while holding the lock for `run_id`
    pub fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        actions: &[ActionSpec],
        run_id: RunId,
    ) -> Result<RunReport> {
        let runs_root = &self.config.runs_root;
        fs::create_dir_all(runs_root)
            .with_context(|| format!("Failed to create runs root {}", runs_root.display()))?;
        let _lock = RunLock::acquire(
            runs_root.join(format!("{run_id}.lock")),
            self.config.lock.stale_after(),
        )?;
        let report = self
            .step_loop
            .run(driver, actions, run_id)
            .context("run aborted before its trace was complete")?;
        info!(run_id = %report.run_id, status = %report.status, run_dir = %report.run_dir.display(), "run recorded");
        Ok(report)
    }
}
