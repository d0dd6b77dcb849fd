//! Condition gate - observable predicates over browser state
//!
//! This crate implements the condition side of every action:
//! - [`ConditionSpec`]: one predicate from a closed vocabulary plus a severity
//! - [`ConditionEvaluator`]: read-only evaluation against a driver, returning
//!   a structured [`ConditionOutcome`] instead of failing
//! - Strong-postcondition classification used by critical-action validation
//!
//! Whether a failed outcome blocks is the caller's decision; see
//! [`ConditionOutcome::is_blocking`].

pub mod conditions;
pub mod errors;
pub mod types;
pub mod validator;

pub use conditions::*;
pub use errors::*;
pub use types::*;
pub use validator::*;
