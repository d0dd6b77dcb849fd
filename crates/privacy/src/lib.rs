//! Redaction engine.
//!
//! Everything the engine persists passes through a [`Redactor`] first:
//! DOM snapshots and trace payloads as JSON, full-page captures as HTML.
//! Replacements read `[REDACTED:<category>]` and every replacement is counted
//! in a [`RedactionReport`].

pub mod apply;
pub mod errors;
pub mod policy;
pub mod report;
pub mod text;
pub mod url;

pub use errors::{PrivacyError, PrivacyResult};
pub use policy::{PiiRule, PrivacyConfig};
pub use report::{RedactCategory, RedactionReport};
pub use text::Redactor;
