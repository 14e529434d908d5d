//! Graph-wide invariant snapshot.

use serde::{Deserialize, Serialize};

use agentdb_core::models::MIN_HYPEREDGE_NODES;

use crate::store::GraphInner;

/// Result of [`crate::HypergraphStore::validate_integrity`]: a snapshot
/// read of the graph against its invariants. Expired temporal hyperedges
/// are reported but do not make the graph invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_hyperedges: usize,
    pub orphan_nodes: Vec<String>,
    pub invalid_hyperedges: Vec<String>,
    pub expired_temporal_hyperedges: Vec<String>,
    pub dimension_mismatches: Vec<String>,
    pub is_valid: bool,
    pub timestamp: i64,
}

pub(crate) fn build_report(inner: &GraphInner, dimension: usize, now: i64) -> IntegrityReport {
    let total_nodes = inner.nodes.len();

    // A node is orphaned only once the graph has company: a single node
    // cannot be expected to link anywhere.
    let mut orphan_nodes: Vec<String> = if total_nodes > 1 {
        inner
            .nodes
            .keys()
            .filter(|id| {
                inner
                    .incident_edges
                    .get(*id)
                    .map(|edges| edges.is_empty())
                    .unwrap_or(true)
                    && inner
                        .node_hyperedges
                        .get(*id)
                        .map(|h| h.is_empty())
                        .unwrap_or(true)
            })
            .cloned()
            .collect()
    } else {
        Vec::new()
    };
    orphan_nodes.sort();

    let mut invalid_hyperedges: Vec<String> = inner
        .hyperedges
        .values()
        .filter(|h| h.nodes.len() < MIN_HYPEREDGE_NODES)
        .map(|h| h.id.clone())
        .collect();
    invalid_hyperedges.sort();

    let mut expired_temporal_hyperedges: Vec<String> = inner
        .hyperedges
        .values()
        .filter(|h| h.is_expired_at(now))
        .map(|h| h.id.clone())
        .collect();
    expired_temporal_hyperedges.sort();

    let mut dimension_mismatches: Vec<String> = inner
        .nodes
        .values()
        .filter(|n| {
            n.embedding
                .as_ref()
                .map(|e| e.dimension() != dimension)
                .unwrap_or(false)
        })
        .map(|n| n.id.clone())
        .collect();
    dimension_mismatches.sort();

    let is_valid = orphan_nodes.is_empty()
        && invalid_hyperedges.is_empty()
        && dimension_mismatches.is_empty();

    IntegrityReport {
        total_nodes,
        total_edges: inner.edges.len(),
        total_hyperedges: inner.hyperedges.len(),
        orphan_nodes,
        invalid_hyperedges,
        expired_temporal_hyperedges,
        dimension_mismatches,
        is_valid,
        timestamp: now,
    }
}
