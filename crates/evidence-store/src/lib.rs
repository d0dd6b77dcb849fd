//! Observation & evidence capture.
//!
//! One run owns one directory:
//!
//! ```text
//! <runs_root>/<run_id>/
//!   trace.jsonl
//!   evidence_manifest.json
//!   evidence/dom/<step>_<phase>.json
//!   evidence/shots/<step>_<phase>.sha256
//!   evidence/shots/<step>_<phase>.png      (failing or critical steps)
//!   evidence/html/<step>_<phase>.html      (failing or critical steps)
//! ```
//!
//! Everything is redacted before it is written. The manifest is rewritten
//! atomically after every capture; the trace is append-only.

pub mod capture;
pub mod errors;
pub mod hash;
pub mod layout;
pub mod model;
pub mod reader;
pub mod trace;
pub mod writer;

pub use capture::{CaptureConfig, Observation, Observer};
pub use errors::{EvidenceError, EvidenceResult};
pub use hash::{sha256_hex, StateSignature};
pub use layout::{step_label, RunLayout};
pub use model::{EvidenceItem, EvidenceKind, EvidenceManifest, Phase};
pub use reader::{load_manifest, read_trace, verify_manifest, IntegrityIssue};
pub use trace::{TraceEvent, TraceRecord, TraceWriter};
pub use writer::{write_atomic, EvidenceStore};
