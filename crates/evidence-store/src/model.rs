use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stepwright_core_types::RunId;
use stepwright_privacy::RedactionReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Before,
    After,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    DomSnapshot,
    ScreenshotHash,
    Screenshot,
    HtmlFull,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::DomSnapshot => "dom_snapshot",
            EvidenceKind::ScreenshotHash => "screenshot_hash",
            EvidenceKind::Screenshot => "screenshot",
            EvidenceKind::HtmlFull => "html_full",
        }
    }

    /// Artifacts only captured for failing or critical steps
    pub fn is_full(&self) -> bool {
        matches!(self, EvidenceKind::Screenshot | EvidenceKind::HtmlFull)
    }
}

/// One persisted artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub kind: EvidenceKind,
    /// Relative to the run directory, `/`-separated
    pub path: String,
    /// Hex sha256 of the bytes at `path`
    pub sha256: String,
    pub size: u64,
    pub redacted: bool,
    pub step: String,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceManifest {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub finalized: bool,
    #[serde(default)]
    pub items: Vec<EvidenceItem>,
    #[serde(default)]
    pub redaction: RedactionReport,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl EvidenceManifest {
    pub fn new(run_id: RunId) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            created_at: now,
            updated_at: now,
            finalized: false,
            items: Vec::new(),
            redaction: RedactionReport::default(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn items_for_step<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a EvidenceItem> {
        self.items.iter().filter(move |item| item.step == step)
    }
}
