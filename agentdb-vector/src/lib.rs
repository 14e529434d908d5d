//! # agentdb-vector
//!
//! The k-nearest-neighbour half of the engine: distance kernels, a narrow
//! backend trait with an HNSW graph implementation and an exact
//! linear-scan fallback, the durable binary snapshot format, and the
//! identified [`VectorStore`] that enforces the embedding contract at
//! every boundary.

pub mod backend;
pub mod distance;
pub mod snapshot;
pub mod store;

pub use agentdb_core::config::{BackendMode, DistanceMetric, VectorConfig};
pub use backend::{create_backend, VectorBackend};
pub use store::{SearchOptions, SearchResult, VectorStore};
