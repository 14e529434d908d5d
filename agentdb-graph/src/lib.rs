//! # agentdb-graph
//!
//! The typed property hypergraph of the engine: nodes with optional
//! validated embeddings, directed binary edges, n-ary (n >= 3)
//! hyperedges with optional expiry, orphan prevention anchored on a
//! synthetic `graph:root`, multi-hop traversal, an integrity report, and
//! JSON persistence under `graphs/`.

pub mod integrity;
pub mod persistence;
pub mod query;
pub mod store;
pub mod traversal;

pub use integrity::IntegrityReport;
pub use query::{HyperedgeRecord, NodeFilter, QueryOutput, TraversalOutput};
pub use store::{CreateEdge, CreateHyperedge, CreateNode, HypergraphStore};
