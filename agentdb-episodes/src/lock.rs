//! Advisory lock on the persistence directory.
//!
//! One process owns a base directory at a time; a second process must
//! fail fast rather than interleave writes.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use agentdb_core::errors::StorageError;

/// Holds the exclusive lock for as long as it lives; the lock releases
/// on drop.
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Single non-blocking attempt. `Ok(None)` means another process
    /// holds the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".lock");

        let first = DirectoryLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(DirectoryLock::try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(DirectoryLock::try_acquire(&path).unwrap().is_some());
    }
}
