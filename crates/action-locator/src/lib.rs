//! Target resolution - declarative element targets to live handles
//!
//! This crate turns a [`TargetSpec`] into element handles:
//! - Primitive strategies (css, xpath, text, role, label, testid) map onto
//!   driver locators
//! - `frame` descends into nested documents, `nth` filters by index
//! - Resolution is lazy: [`resolve`] compiles a [`TargetPlan`] and the driver
//!   is only queried when the plan is evaluated
//! - [`TargetResolver::resolve_unique`] waits for attachment and enforces
//!   exactly one match

pub mod errors;
pub mod resolver;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use types::*;
