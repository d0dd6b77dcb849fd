//! Errors raised outside the engine proper: configuration, flow files and run locks

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use stepwright_privacy::PrivacyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unsupported configuration path: {0}")]
    UnsupportedPath(String),

    #[error(transparent)]
    Privacy(#[from] PrivacyError),
}

impl ConfigError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConfigError::Io { .. })
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("run lock {path} held by pid {pid} since {since}")]
    Held {
        path: PathBuf,
        pid: u32,
        since: DateTime<Utc>,
    },

    #[error("io error on run lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// A held lock may be released by its owner later
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Held { .. })
    }
}
