//! Step-loop policy engine
//!
//! Runs an ordered list of [`action_compiler::ActionSpec`]s against one
//! browser session, one action at a time:
//!
//! ```text
//! INIT -> per action { COMPILING -> PRECHECK -> EXECUTING -> POSTCHECK
//!                      -> SUCCESS | RETRY | RECOVER | HALT } -> FINISHED
//! ```
//!
//! Failures are retried with backoff, then walk a budgeted recovery chain
//! (dismiss overlay, reload once, alternative target). Revisited states and
//! the attempt hard cap stop the run. Every transition is one line in
//! `trace.jsonl`.

pub mod config;
pub mod errors;
pub mod executor;
pub mod report;
pub mod state;
pub mod strategies;

pub use config::{PolicyConfig, RunMode};
pub use errors::FlowError;
pub use executor::StepLoop;
pub use report::{RunReport, RunStatus};
pub use state::PolicyState;
pub use strategies::{RecoveryOutcome, RecoveryStep};
