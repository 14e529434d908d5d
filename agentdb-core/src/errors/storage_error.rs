//! Durable-storage errors: SQLite, snapshot codecs, filesystem, locking.

use std::path::PathBuf;

/// Errors from the persistence layers. Transient variants are retried via
/// the shared retry helper before being surfaced.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported snapshot version {version}")]
    UnsupportedSnapshotVersion { version: u32 },

    #[error("snapshot dimension mismatch: expected {expected}, got {actual}")]
    SnapshotDimensionMismatch { expected: usize, actual: usize },

    #[error("snapshot corrupt: {reason}")]
    SnapshotCorrupt { reason: String },

    #[error("persistence directory is locked by another process: {path}")]
    LockHeld { path: PathBuf },

    #[error("{component} lock poisoned by an earlier panic")]
    LockPoisoned { component: &'static str },
}

impl StorageError {
    /// Helper to wrap a rusqlite failure message.
    pub fn sqlite(message: impl Into<String>) -> Self {
        Self::Sqlite {
            message: message.into(),
        }
    }
}
