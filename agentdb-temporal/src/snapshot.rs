//! Time-index snapshot codec.
//!
//! Little-endian binary layout:
//!
//! ```text
//! u32 version (currently 1)
//! u32 order
//! u64 size (total (timestamp, id) entries)
//! u32 group count
//! group x { i64 timestamp, u16 id count, ids x { u16 len, utf-8 bytes } }
//! ```
//!
//! Groups are written in leaf-chain order; the tree and its leaf links
//! are reconstructed by re-insertion on load.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use agentdb_core::errors::StorageError;

use crate::btree::TimeIndex;

pub const TIME_INDEX_VERSION: u32 = 1;

fn corrupt(reason: impl Into<String>) -> StorageError {
    StorageError::SnapshotCorrupt {
        reason: reason.into(),
    }
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8], what: &str) -> Result<(), StorageError> {
    reader
        .read_exact(buf)
        .map_err(|_| corrupt(format!("truncated while reading {what}")))
}

macro_rules! read_le {
    ($fn_name:ident, $ty:ty) => {
        fn $fn_name(reader: &mut impl Read, what: &str) -> Result<$ty, StorageError> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            read_exact(reader, &mut buf, what)?;
            Ok(<$ty>::from_le_bytes(buf))
        }
    };
}

read_le!(read_u16, u16);
read_le!(read_u32, u32);
read_le!(read_u64, u64);
read_le!(read_i64, i64);

/// Writes the index to `path` atomically.
pub fn persist(index: &TimeIndex, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("bin.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        let groups = index.dump();
        writer.write_all(&TIME_INDEX_VERSION.to_le_bytes())?;
        writer.write_all(&(index.stats().order as u32).to_le_bytes())?;
        writer.write_all(&(index.len() as u64).to_le_bytes())?;
        writer.write_all(&(groups.len() as u32).to_le_bytes())?;
        for (timestamp, ids) in groups {
            writer.write_all(&timestamp.to_le_bytes())?;
            writer.write_all(&(ids.len() as u16).to_le_bytes())?;
            for id in ids {
                let bytes = id.as_bytes();
                writer.write_all(&(bytes.len() as u16).to_le_bytes())?;
                writer.write_all(bytes)?;
            }
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a snapshot back into a fresh index. `Ok(None)` when the file
/// does not exist.
pub fn restore(path: &Path) -> Result<Option<TimeIndex>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = BufReader::new(File::open(path)?);

    let version = read_u32(&mut reader, "version")?;
    if version != TIME_INDEX_VERSION {
        return Err(StorageError::UnsupportedSnapshotVersion { version });
    }
    let order = read_u32(&mut reader, "order")? as usize;
    let size = read_u64(&mut reader, "size")? as usize;
    let groups = read_u32(&mut reader, "group count")? as usize;

    let mut index = TimeIndex::with_order(order);
    for group in 0..groups {
        let timestamp = read_i64(&mut reader, "timestamp")?;
        let id_count = read_u16(&mut reader, "id count")? as usize;
        for _ in 0..id_count {
            let len = read_u16(&mut reader, "id length")? as usize;
            let mut bytes = vec![0u8; len];
            read_exact(&mut reader, &mut bytes, "id bytes")?;
            let id = String::from_utf8(bytes)
                .map_err(|_| corrupt(format!("group {group}: id is not utf-8")))?;
            index.insert(timestamp, &id);
        }
    }
    if index.len() != size {
        return Err(corrupt(format!(
            "header claims {size} entries, file held {}",
            index.len()
        )));
    }
    Ok(Some(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> TimeIndex {
        let mut index = TimeIndex::new();
        for i in 0..500i64 {
            index.insert(i % 97, &format!("ep-{i}"));
        }
        index
    }

    #[test]
    fn roundtrip_preserves_entries_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time-index.bin");
        let index = populated();
        persist(&index, &path).unwrap();

        let restored = restore(&path).unwrap().unwrap();
        assert_eq!(restored.len(), index.len());
        assert_eq!(restored.dump(), index.dump());
        assert_eq!(
            restored.ids_in_range(10, 20),
            index.ids_in_range(10, 20)
        );
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(restore(&dir.path().join("absent.bin")).unwrap().is_none());
    }

    #[test]
    fn truncated_file_is_an_explicit_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time-index.bin");
        persist(&populated(), &path).unwrap();
        let raw = fs::read(&path).unwrap();
        fs::write(&path, &raw[..raw.len() / 2]).unwrap();
        assert!(matches!(
            restore(&path),
            Err(StorageError::SnapshotCorrupt { .. })
        ));
    }

    #[test]
    fn foreign_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time-index.bin");
        persist(&populated(), &path).unwrap();
        let mut raw = fs::read(&path).unwrap();
        raw[0..4].copy_from_slice(&7u32.to_le_bytes());
        fs::write(&path, raw).unwrap();
        assert!(matches!(
            restore(&path),
            Err(StorageError::UnsupportedSnapshotVersion { version: 7 })
        ));
    }

    #[test]
    fn empty_index_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time-index.bin");
        persist(&TimeIndex::new(), &path).unwrap();
        let restored = restore(&path).unwrap().unwrap();
        assert!(restored.is_empty());
    }
}
