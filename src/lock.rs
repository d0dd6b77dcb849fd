//! Advisory lock on a run directory

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::LockError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

/// Held until dropped; the lock file is removed on drop
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    record: LockRecord,
}

impl RunLock {
    /// Create `path` exclusively. An existing lock older than `stale_after`
    /// (or unreadable) is taken over.
    pub fn acquire(path: impl Into<PathBuf>, stale_after: Duration) -> Result<Self, LockError> {
        let path = path.into();
        let mut took_over = false;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let record = LockRecord {
                        pid: process::id(),
                        acquired_at: Utc::now(),
                    };
                    let body = serde_json::to_vec(&record).map_err(|err| LockError::Io {
                        path: path.clone(),
                        source: err.into(),
                    })?;
                    file.write_all(&body)
                        .and_then(|_| file.sync_all())
                        .map_err(|source| LockError::Io {
                            path: path.clone(),
                            source,
                        })?;
                    debug!(path = %path.display(), "run lock acquired");
                    return Ok(Self { path, record });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    let existing = read_record(&path);
                    if let Some(record) = existing.as_ref().filter(|r| !is_stale(r, stale_after)) {
                        return Err(LockError::Held {
                            path,
                            pid: record.pid,
                            since: record.acquired_at,
                        });
                    }
                    if took_over {
                        // someone else replaced the stale lock first
                        let (pid, since) = existing
                            .map(|r| (r.pid, r.acquired_at))
                            .unwrap_or((0, Utc::now()));
                        return Err(LockError::Held { path, pid, since });
                    }
                    warn!(path = %path.display(), "overriding stale run lock");
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(err) if err.kind() == ErrorKind::NotFound => {}
                        Err(source) => return Err(LockError::Io { path, source }),
                    }
                    took_over = true;
                }
                Err(source) => return Err(LockError::Io { path, source }),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &LockRecord {
        &self.record
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "run lock released"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "failed to release run lock"),
        }
    }
}

fn read_record(path: &Path) -> Option<LockRecord> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn is_stale(record: &LockRecord, stale_after: Duration) -> bool {
    let age = Utc::now().signed_duration_since(record.acquired_at);
    match chrono::Duration::from_std(stale_after) {
        Ok(limit) => age > limit,
        Err(_) => false,
    }
}
