//! Hypergraph store errors.

/// Errors raised by the hypergraph store. Lookup misses fail so the
/// caller decides; structural violations fail at create time.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {id}")]
    NodeNotFound { id: String },

    #[error("edge not found: {id}")]
    EdgeNotFound { id: String },

    #[error("hyperedge not found: {id}")]
    HyperedgeNotFound { id: String },

    #[error("hyperedge requires at least 3 nodes, got {count}")]
    InvalidHyperedge { count: usize },

    #[error("node would be orphaned: no link_to and no auto-link target for key {key:?}")]
    OrphanNode { key: Option<String> },
}
