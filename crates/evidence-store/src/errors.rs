use std::io;
use std::path::PathBuf;

use stepwright_driver::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("capture failed: {0}")]
    Driver(#[from] DriverError),

    #[error("run directory already exists: {path}")]
    RunExists { path: PathBuf },

    #[error("malformed run artifact {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl EvidenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EvidenceError::Io {
            path: path.into(),
            source,
        }
    }

    /// Storage failures may succeed on a later capture; driver failures follow the driver
    pub fn is_retryable(&self) -> bool {
        match self {
            EvidenceError::Io { .. } => true,
            EvidenceError::Driver(err) => err.is_retryable(),
            EvidenceError::Serialize(_)
            | EvidenceError::RunExists { .. }
            | EvidenceError::Malformed { .. } => false,
        }
    }
}

pub type EvidenceResult<T> = Result<T, EvidenceError>;
