//! Durable snapshot codec for identified vectors.
//!
//! Little-endian binary layout:
//!
//! ```text
//! u32 version (currently 1)
//! u32 dimension
//! u32 count
//! count x { u16 id_len, id bytes (utf-8), dimension x f32 }
//! ```
//!
//! Loads reject unknown versions and foreign dimensions; a truncated file
//! is an explicit decode error, never a silent partial load. Writes go to
//! a sibling temp file first and rename into place.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use agentdb_core::errors::StorageError;

pub const SNAPSHOT_VERSION: u32 = 1;

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

fn read_u16(reader: &mut impl Read, what: &str) -> Result<u16, StorageError> {
    let mut buf = [0u8; 2];
    read_exact(reader, &mut buf, what)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(reader: &mut impl Read, what: &str) -> Result<u32, StorageError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

/// Writes all entries to `path`. Entries must share `dimension`.
pub fn write_snapshot(
    path: &Path,
    dimension: usize,
    entries: &[(String, Vec<f32>)],
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("bin.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        writer.write_all(&(dimension as u32).to_le_bytes())?;
        writer.write_all(&(entries.len() as u32).to_le_bytes())?;
        for (id, vector) in entries {
            let id_bytes = id.as_bytes();
            writer.write_all(&(id_bytes.len() as u16).to_le_bytes())?;
            writer.write_all(id_bytes)?;
            for value in vector {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a snapshot. `Ok(None)` when the file does not exist.
pub fn read_snapshot(
    path: &Path,
    expected_dimension: usize,
) -> Result<Option<Vec<(String, Vec<f32>)>>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = BufReader::new(File::open(path)?);

    let version = read_u32(&mut reader, "version")?;
    if version != SNAPSHOT_VERSION {
        return Err(StorageError::UnsupportedSnapshotVersion { version });
    }
    let dimension = read_u32(&mut reader, "dimension")? as usize;
    if dimension != expected_dimension {
        return Err(StorageError::SnapshotDimensionMismatch {
            expected: expected_dimension,
            actual: dimension,
        });
    }
    let count = read_u32(&mut reader, "count")? as usize;

    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        let id_len = read_u16(&mut reader, "id length")? as usize;
        let mut id_bytes = vec![0u8; id_len];
        read_exact(&mut reader, &mut id_bytes, "id bytes")?;
        let id = String::from_utf8(id_bytes)
            .map_err(|_| corrupt(format!("record {index}: id is not utf-8")))?;

        let mut vector = Vec::with_capacity(dimension);
        let mut value = [0u8; 4];
        for _ in 0..dimension {
            read_exact(&mut reader, &mut value, "vector data")?;
            vector.push(f32::from_le_bytes(value));
        }
        entries.push((id, vector));
    }
    Ok(Some(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dim: usize) -> Vec<(String, Vec<f32>)> {
        (0..5u32)
            .map(|i| {
                let v: Vec<f32> = (0..dim).map(|j| (i * 10 + j as u32) as f32 * 0.25).collect();
                (format!("id-{i}"), v)
            })
            .collect()
    }

    #[test]
    fn roundtrip_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        let original = entries(8);
        write_snapshot(&path, 8, &original).unwrap();

        let loaded = read_snapshot(&path, 8).unwrap().unwrap();
        assert_eq!(loaded.len(), original.len());
        for (id, vector) in &original {
            let found = loaded.iter().find(|(lid, _)| lid == id).unwrap();
            assert_eq!(&found.1, vector);
        }
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_snapshot(&dir.path().join("absent.bin"), 8)
            .unwrap()
            .is_none());
    }

    #[test]
    fn wrong_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        write_snapshot(&path, 4, &entries(4)).unwrap();

        let mut raw = fs::read(&path).unwrap();
        raw[0..4].copy_from_slice(&99u32.to_le_bytes());
        fs::write(&path, raw).unwrap();
        assert!(matches!(
            read_snapshot(&path, 4),
            Err(StorageError::UnsupportedSnapshotVersion { version: 99 })
        ));
    }

    #[test]
    fn wrong_dimension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        write_snapshot(&path, 4, &entries(4)).unwrap();
        assert!(matches!(
            read_snapshot(&path, 8),
            Err(StorageError::SnapshotDimensionMismatch {
                expected: 8,
                actual: 4
            })
        ));
    }

    #[test]
    fn truncated_file_is_an_explicit_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        write_snapshot(&path, 4, &entries(4)).unwrap();

        let raw = fs::read(&path).unwrap();
        fs::write(&path, &raw[..raw.len() - 7]).unwrap();
        assert!(matches!(
            read_snapshot(&path, 4),
            Err(StorageError::SnapshotCorrupt { .. })
        ));
    }

    #[test]
    fn empty_snapshot_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        write_snapshot(&path, 1536, &[]).unwrap();
        let loaded = read_snapshot(&path, 1536).unwrap().unwrap();
        assert!(loaded.is_empty());
    }
}
