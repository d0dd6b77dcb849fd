//! Append-only run trace (`trace.jsonl`)

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stepwright_core_types::RunId;
use stepwright_privacy::{RedactionReport, Redactor};

use crate::errors::{EvidenceError, EvidenceResult};

/// One line of the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub run_id: RunId,
    pub seq: u64,
    pub ts: String,
    pub event: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default)]
    pub payload: Value,
}

/// Event under construction; the writer assigns run id, sequence and time
#[derive(Debug, Clone)]
pub struct TraceRecord {
    event: String,
    state: String,
    step: Option<usize>,
    action_id: Option<String>,
    attempt: Option<u32>,
    payload: Value,
}

impl TraceRecord {
    pub fn new(event: &str, state: &str) -> Self {
        Self {
            event: event.to_string(),
            state: state.to_string(),
            step: None,
            action_id: None,
            attempt: None,
            payload: Value::Object(Map::new()),
        }
    }

    pub fn step(mut self, index: usize) -> Self {
        self.step = Some(index);
        self
    }

    pub fn action(mut self, action_id: &str) -> Self {
        self.action_id = Some(action_id.to_string());
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Appends redacted events with strictly increasing `seq`
#[derive(Debug)]
pub struct TraceWriter {
    path: PathBuf,
    file: File,
    run_id: RunId,
    seq: u64,
    redactor: Redactor,
    pending: RedactionReport,
}

impl TraceWriter {
    pub fn create(path: &Path, run_id: RunId, redactor: Redactor) -> EvidenceResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| EvidenceError::io(parent, err))?;
        }
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(path)
            .map_err(|err| EvidenceError::io(path, err))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            run_id,
            seq: 0,
            redactor,
            pending: RedactionReport::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Redact the payload and append one line; returns the event written
    pub fn append(&mut self, record: TraceRecord) -> EvidenceResult<TraceEvent> {
        let mut payload = record.payload;
        self.redactor.redact_json(&mut payload, &mut self.pending);
        let event = TraceEvent {
            run_id: self.run_id.clone(),
            seq: self.seq + 1,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event: record.event,
            state: record.state,
            step: record.step,
            action_id: record.action_id,
            attempt: record.attempt,
            payload,
        };
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .and_then(|_| self.file.flush())
            .map_err(|err| EvidenceError::io(&self.path, err))?;
        self.seq = event.seq;
        Ok(event)
    }

    /// Redactions applied since the last call
    pub fn take_redactions(&mut self) -> RedactionReport {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequences_and_redacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let mut writer =
            TraceWriter::create(&path, RunId::from("r"), Redactor::builtin().clone()).unwrap();
        writer
            .append(TraceRecord::new("run_started", "INIT").payload(json!({ "actions": 2 })))
            .unwrap();
        let second = writer
            .append(
                TraceRecord::new("action_compiled", "SUCCESS")
                    .step(0)
                    .action("fill")
                    .attempt(1)
                    .payload(json!({ "note": "sent to foo@example.com" })),
            )
            .unwrap();
        assert_eq!(second.seq, 2);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("foo@example.com"));
        let lines: Vec<TraceEvent> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].seq, 1);
        assert_eq!(lines[1].action_id.as_deref(), Some("fill"));
        assert_eq!(writer.take_redactions().count("email"), 1);
        assert!(writer.take_redactions().is_empty());
    }
}
