use std::path::{Path, PathBuf};

use stepwright_core_types::RunId;

use crate::model::Phase;

pub const TRACE_FILE: &str = "trace.jsonl";
pub const MANIFEST_FILE: &str = "evidence_manifest.json";

/// Step label used in evidence file names: `003-a1` is the first attempt of the
/// fourth action.
pub fn step_label(index: usize, attempt: u32) -> String {
    format!("{index:03}-a{attempt}")
}

/// Paths inside one run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(runs_root: &Path, run_id: &RunId) -> Self {
        Self {
            root: runs_root.join(run_id.as_str()),
        }
    }

    /// Layout over an existing run directory
    pub fn at(run_dir: &Path) -> Self {
        Self {
            root: run_dir.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trace_path(&self) -> PathBuf {
        self.root.join(TRACE_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn dom_rel(step: &str, phase: Phase) -> String {
        format!("evidence/dom/{step}_{phase}.json")
    }

    pub fn shot_hash_rel(step: &str, phase: Phase) -> String {
        format!("evidence/shots/{step}_{phase}.sha256")
    }

    pub fn shot_png_rel(step: &str, phase: Phase) -> String {
        format!("evidence/shots/{step}_{phase}.png")
    }

    pub fn html_rel(step: &str, phase: Phase) -> String {
        format!("evidence/html/{step}_{phase}.html")
    }

    /// Absolute path of a `/`-separated relative path
    pub fn resolve(&self, rel: &str) -> PathBuf {
        rel.split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}
