//! Reading a finished (or interrupted) run back from disk

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{EvidenceError, EvidenceResult};
use crate::hash::sha256_hex;
use crate::layout::RunLayout;
use crate::model::EvidenceManifest;
use crate::trace::TraceEvent;

pub fn load_manifest(run_dir: &Path) -> EvidenceResult<EvidenceManifest> {
    let path = RunLayout::at(run_dir).manifest_path();
    let raw = fs::read(&path).map_err(|err| EvidenceError::io(&path, err))?;
    serde_json::from_slice(&raw).map_err(|err| EvidenceError::Malformed {
        path,
        reason: err.to_string(),
    })
}

/// Parse every trace line and check that `seq` strictly increases
pub fn read_trace(run_dir: &Path) -> EvidenceResult<Vec<TraceEvent>> {
    let path = RunLayout::at(run_dir).trace_path();
    let raw = fs::read_to_string(&path).map_err(|err| EvidenceError::io(&path, err))?;
    let mut events: Vec<TraceEvent> = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: TraceEvent =
            serde_json::from_str(line).map_err(|err| EvidenceError::Malformed {
                path: path.clone(),
                reason: format!("line {}: {}", lineno + 1, err),
            })?;
        if let Some(prev) = events.last() {
            if event.seq <= prev.seq {
                return Err(EvidenceError::Malformed {
                    path,
                    reason: format!(
                        "line {}: seq {} does not follow {}",
                        lineno + 1,
                        event.seq,
                        prev.seq
                    ),
                });
            }
        }
        events.push(event);
    }
    Ok(events)
}

/// Integrity problem found for one manifest item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub path: String,
    pub problem: String,
}

/// Re-hash every manifest item against the bytes on disk
pub fn verify_manifest(run_dir: &Path, manifest: &EvidenceManifest) -> Vec<IntegrityIssue> {
    let layout = RunLayout::at(run_dir);
    manifest
        .items
        .iter()
        .filter_map(|item| {
            let problem = match fs::read(layout.resolve(&item.path)) {
                Err(err) => format!("unreadable: {err}"),
                Ok(bytes) if bytes.len() as u64 != item.size => {
                    format!("size {} != recorded {}", bytes.len(), item.size)
                }
                Ok(bytes) if sha256_hex(&bytes) != item.sha256 => "sha256 mismatch".to_string(),
                Ok(_) => return None,
            };
            Some(IntegrityIssue {
                path: item.path.clone(),
                problem,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvidenceKind, Phase};
    use crate::trace::{TraceRecord, TraceWriter};
    use crate::writer::EvidenceStore;
    use stepwright_core_types::RunId;
    use stepwright_privacy::Redactor;

    #[test]
    fn test_detects_tampered_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EvidenceStore::create(dir.path(), &RunId::from("r")).unwrap();
        let item = store
            .record(
                EvidenceKind::HtmlFull,
                RunLayout::html_rel("000-a1", Phase::After),
                b"<html></html>",
                true,
                "000-a1",
                Phase::After,
            )
            .unwrap();
        let run_dir = store.run_dir();
        let manifest = load_manifest(&run_dir).unwrap();
        assert!(verify_manifest(&run_dir, &manifest).is_empty());

        fs::write(store.layout().resolve(&item.path), b"<html>x</html>").unwrap();
        let issues = verify_manifest(&run_dir, &manifest);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, item.path);
    }

    #[test]
    fn test_reads_trace_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::at(dir.path());
        let mut writer =
            TraceWriter::create(&layout.trace_path(), RunId::from("r"), Redactor::default())
                .unwrap();
        writer.append(TraceRecord::new("run_started", "INIT")).unwrap();
        writer
            .append(TraceRecord::new("run_finished", "FINISHED"))
            .unwrap();
        let events = read_trace(dir.path()).unwrap();
        assert_eq!(
            events.iter().map(|e| e.seq).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
