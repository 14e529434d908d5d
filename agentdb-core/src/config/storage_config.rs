//! Persistence-directory configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory holding graphs/, vectors.bin, episodes.db,
    /// episode-vectors.bin and time-index.bin.
    pub base_dir: PathBuf,
    /// Save after every mutation (through the retry helper).
    pub auto_save: bool,
    /// How long to wait for the advisory directory lock before failing
    /// fast with `LockHeld`.
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".agentdb"),
            auto_save: true,
            lock_timeout_ms: 5_000,
        }
    }
}

impl StorageConfig {
    pub fn graphs_dir(&self) -> PathBuf {
        self.base_dir.join("graphs")
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.base_dir.join("vectors.bin")
    }

    pub fn episodes_db_path(&self) -> PathBuf {
        self.base_dir.join("episodes.db")
    }

    pub fn episode_vectors_path(&self) -> PathBuf {
        self.base_dir.join("episode-vectors.bin")
    }

    pub fn time_index_path(&self) -> PathBuf {
        self.base_dir.join("time-index.bin")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }
}
