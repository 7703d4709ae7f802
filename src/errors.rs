//! Typed error definitions for usr_merge.
//! Provides a small set of well-known failure modes for better logs and tests.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UsrMergeError {
    #[error("Root path does not exist or is not a directory: {0}")]
    RootInvalid(PathBuf),

    #[error("Merge base (root + prefix) does not exist or is not a directory: {0}")]
    BaseInvalid(PathBuf),

    #[error("Invalid directory mapping '{from}' -> '{to}': {reason}")]
    InvalidMapping {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Invalid prefix '{0}': must be a relative path without '..'")]
    InvalidPrefix(PathBuf),

    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cannot read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("Another merge already holds the lock on {0}")]
    Locked(PathBuf),

    #[error("Special files are not supported: {0}")]
    UnsupportedEntry(PathBuf),
}

impl UsrMergeError {
    /// Stable numeric code, emitted as a structured log field.
    pub fn code(&self) -> u16 {
        match self {
            UsrMergeError::RootInvalid(_) => 10,
            UsrMergeError::BaseInvalid(_) => 11,
            UsrMergeError::InvalidMapping { .. } => 12,
            UsrMergeError::InvalidPrefix(_) => 13,
            UsrMergeError::InvalidPattern { .. } => 14,
            UsrMergeError::ConfigRead { .. } => 20,
            UsrMergeError::ConfigParse { .. } => 21,
            UsrMergeError::Locked(_) => 30,
            UsrMergeError::UnsupportedEntry(_) => 40,
        }
    }
}
