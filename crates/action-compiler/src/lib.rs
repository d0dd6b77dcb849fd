//! Action compiler - one declarative action, end to end
//!
//! [`ActionSpec`] describes a step (navigate, click, fill, wait_for, assert,
//! upload, noop) with the conditions guarding and verifying it.
//! [`ActionCompiler::execute`] runs the fixed pipeline:
//!
//! 1. static validation (critical actions need a strong postcondition)
//! 2. "before" observation
//! 3. preconditions
//! 4. dispatch by kind
//! 5. "after" observation, also on failure
//! 6. postconditions
//!
//! Failing or critical steps additionally get full HTML and a real screenshot.

pub mod compiler;
mod dispatch;
pub mod errors;
pub mod result;
pub mod secrets;
pub mod spec;

mod config;

pub use compiler::{ActionCompiler, StepContext};
pub use config::CompilerConfig;
pub use errors::SpecError;
pub use result::{ActionResult, ActionStatus};
pub use secrets::{EnvSecretResolver, SecretResolver, StaticSecrets};
pub use spec::{validate_flow, ActionInput, ActionKind, ActionSpec, Criticality, ValueSource};
