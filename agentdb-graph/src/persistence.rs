//! One JSON document per graph under `graphs/`, written atomically.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use agentdb_core::errors::StorageError;
use agentdb_core::models::{Edge, Hyperedge, Node};

pub(crate) const GRAPH_DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GraphDocument {
    pub version: u32,
    pub saved_at: i64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub hyperedges: Vec<Hyperedge>,
}

pub(crate) fn write_graph(path: &Path, document: &GraphDocument) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let encoded = serde_json::to_vec_pretty(document)?;
    fs::write(&tmp, encoded)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn read_graph(path: &Path) -> Result<Option<GraphDocument>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read(path)?;
    let document: GraphDocument = serde_json::from_slice(&raw)?;
    if document.version != GRAPH_DOCUMENT_VERSION {
        return Err(StorageError::UnsupportedSnapshotVersion {
            version: document.version,
        });
    }
    Ok(Some(document))
}
