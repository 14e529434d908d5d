//! Query inputs and outputs for the hypergraph store.

use serde::{Deserialize, Serialize};

use agentdb_core::models::Hyperedge;

/// Filter for [`crate::HypergraphStore::query_nodes`]. All criteria are
/// conjunctive; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    /// Match nodes whose `key` namespace equals this.
    pub namespace: Option<String>,
    /// Regex over the whole `key` property.
    pub key_pattern: Option<String>,
    /// Millisecond bounds on `created_at`.
    pub created_after: Option<i64>,
    pub created_before: Option<i64>,
    /// Only nodes with (true) or without (false) an embedding.
    pub has_embedding: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Standard list-shaped result: the rows, their count, and how long the
/// query took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutput<T> {
    pub data: Vec<T>,
    pub count: usize,
    pub execution_time_ms: f64,
}

impl<T> QueryOutput<T> {
    pub fn new(data: Vec<T>, execution_time_ms: f64) -> Self {
        let count = data.len();
        Self {
            data,
            count,
            execution_time_ms,
        }
    }
}

/// Result of a hop traversal. `cancelled` is set when the cancellation
/// token fired and `data` holds the partial frontier visited so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalOutput {
    pub data: Vec<String>,
    pub count: usize,
    pub execution_time_ms: f64,
    pub cancelled: bool,
}

/// A hyperedge as handed to callers: the stored fields plus `is_expired`
/// re-derived from the clock at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperedgeRecord {
    #[serde(flatten)]
    pub hyperedge: Hyperedge,
    pub is_expired: bool,
}

impl HyperedgeRecord {
    pub fn at(hyperedge: Hyperedge, now: i64) -> Self {
        let is_expired = hyperedge.is_expired_at(now);
        Self {
            hyperedge,
            is_expired,
        }
    }
}
