use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use stepwright_core_types::RunId;
use stepwright_privacy::RedactionReport;
use tracing::debug;

use crate::errors::{EvidenceError, EvidenceResult};
use crate::hash::sha256_hex;
use crate::layout::RunLayout;
use crate::model::{EvidenceItem, EvidenceKind, EvidenceManifest, Phase};

/// Write through a temp file and rename, so readers never see a torn file
pub fn write_atomic(path: &Path, data: &[u8]) -> EvidenceResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| EvidenceError::io(parent, err))?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .map_err(|err| EvidenceError::io(&tmp, err))?;
    file.write_all(data)
        .and_then(|_| file.sync_all())
        .map_err(|err| EvidenceError::io(&tmp, err))?;
    fs::rename(&tmp, path).map_err(|err| EvidenceError::io(path, err))?;
    Ok(())
}

/// Run-scoped evidence accumulator.
///
/// Items are only ever appended; the manifest is rewritten after each one.
#[derive(Debug)]
pub struct EvidenceStore {
    layout: RunLayout,
    manifest: EvidenceManifest,
}

impl EvidenceStore {
    /// Create a fresh run directory and an initial manifest.
    ///
    /// A run id names exactly one run: an existing directory is refused.
    pub fn create(runs_root: &Path, run_id: &RunId) -> EvidenceResult<Self> {
        let layout = RunLayout::new(runs_root, run_id);
        fs::create_dir_all(runs_root).map_err(|err| EvidenceError::io(runs_root, err))?;
        fs::create_dir(layout.root()).map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => EvidenceError::RunExists {
                path: layout.root().to_path_buf(),
            },
            _ => EvidenceError::io(layout.root(), err),
        })?;
        let store = Self {
            layout,
            manifest: EvidenceManifest::new(run_id.clone()),
        };
        store.write_manifest()?;
        Ok(store)
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn run_dir(&self) -> PathBuf {
        self.layout.root().to_path_buf()
    }

    pub fn manifest(&self) -> &EvidenceManifest {
        &self.manifest
    }

    /// Persist `bytes` at `rel` and register the item
    pub fn record(
        &mut self,
        kind: EvidenceKind,
        rel: String,
        bytes: &[u8],
        redacted: bool,
        step: &str,
        phase: Phase,
    ) -> EvidenceResult<EvidenceItem> {
        let path = self.layout.resolve(&rel);
        write_atomic(&path, bytes)?;
        let item = EvidenceItem {
            kind,
            path: rel,
            sha256: sha256_hex(bytes),
            size: bytes.len() as u64,
            redacted,
            step: step.to_string(),
            phase,
        };
        debug!(kind = kind.as_str(), path = %item.path, size = item.size, "evidence recorded");
        self.manifest.items.push(item.clone());
        self.persist()?;
        Ok(item)
    }

    pub fn merge_redactions(&mut self, report: &RedactionReport) {
        self.manifest.redaction.merge(report);
    }

    pub fn set_metadata(&mut self, key: &str, value: Value) {
        self.manifest.metadata.insert(key.to_string(), value);
    }

    /// Whether a full artifact (html or real screenshot) exists for `step`
    pub fn has_full_artifact(&self, step: &str) -> bool {
        self.manifest
            .items_for_step(step)
            .any(|item| item.kind.is_full())
    }

    pub fn persist(&mut self) -> EvidenceResult<()> {
        self.manifest.updated_at = Utc::now();
        self.write_manifest()
    }

    pub fn finalize(&mut self) -> EvidenceResult<()> {
        self.manifest.finalized = true;
        self.persist()
    }

    fn write_manifest(&self) -> EvidenceResult<()> {
        let data = serde_json::to_vec_pretty(&self.manifest)?;
        write_atomic(&self.layout.manifest_path(), &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::step_label;

    #[test]
    fn test_existing_run_directory_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = RunId::from("again");
        let first = EvidenceStore::create(dir.path(), &run_id).unwrap();
        let before = fs::read(first.layout().manifest_path()).unwrap();

        let err = EvidenceStore::create(dir.path(), &run_id).err().unwrap();
        assert!(matches!(err, EvidenceError::RunExists { .. }));
        assert!(!err.is_retryable());
        assert_eq!(fs::read(first.layout().manifest_path()).unwrap(), before);
    }

    #[test]
    fn test_records_items_and_rewrites_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = RunId::from("run-1");
        let mut store = EvidenceStore::create(dir.path(), &run_id).unwrap();
        let step = step_label(0, 1);
        let item = store
            .record(
                EvidenceKind::DomSnapshot,
                RunLayout::dom_rel(&step, Phase::Before),
                b"{}",
                true,
                &step,
                Phase::Before,
            )
            .unwrap();
        assert_eq!(item.sha256, sha256_hex(b"{}"));
        assert!(!store.has_full_artifact(&step));

        let mut report = RedactionReport::new();
        report.record("email", 2);
        store.merge_redactions(&report);
        store.finalize().unwrap();

        let raw = fs::read(store.layout().manifest_path()).unwrap();
        let manifest: EvidenceManifest = serde_json::from_slice(&raw).unwrap();
        assert!(manifest.finalized);
        assert_eq!(manifest.items, vec![item]);
        assert_eq!(manifest.redaction.count("email"), 2);
        assert!(dir
            .path()
            .join("run-1/evidence/dom/000-a1_before.json")
            .exists());
    }
}
