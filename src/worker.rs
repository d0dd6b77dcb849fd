//! Runs the synchronous engine off the async executor

use std::sync::Arc;

use action_compiler::ActionSpec;
use action_flow::RunReport;
use anyhow::{Context, Result};
use stepwright_core_types::RunId;
use stepwright_driver::BrowserDriver;
use tracing::debug;

use crate::Engine;

/// Execute a whole run on the blocking pool.
///
/// The driver is handed back so callers can keep using the session.
pub async fn run_blocking<D>(
    engine: Arc<Engine>,
    mut driver: D,
    actions: Vec<ActionSpec>,
    run_id: RunId,
) -> Result<(RunReport, D)>
where
    D: BrowserDriver + Send + 'static,
{
    debug!(%run_id, actions = actions.len(), "offloading run to blocking pool");
    tokio::task::spawn_blocking(move || {
        let report = engine.run(&mut driver, &actions, run_id)?;
        Ok((report, driver))
    })
    .await
    .context("run worker panicked")?
}
