//! Storage error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing checkpoints.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record already exists for the key. The write-once contract makes
    /// this the expected outcome for the loser of a same-key race.
    #[error("record already exists: {0}")]
    AlreadyExists(PathBuf),

    /// The record file is present but unreadable as a record. Fatal for the
    /// unit: silently recomputing would violate write-once.
    #[error("corrupt checkpoint record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}
