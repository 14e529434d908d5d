//! Pluggable ANN backend.
//!
//! The trait is deliberately narrow: a linear scan must be able to
//! satisfy it for correctness, and the HNSW graph plugs in for
//! performance. Vectors reaching a backend have already passed the
//! boundary validation.

pub mod hnsw;
pub mod linear;

use agentdb_core::config::{BackendMode, VectorConfig};

pub use hnsw::HnswBackend;
pub use linear::LinearBackend;

/// Storage + search contract shared by all backends.
///
/// `search` returns `(id, score)` pairs ordered best-first under the
/// backend's configured metric. `get` and `entries` hand out copies,
/// never aliases into backend storage.
pub trait VectorBackend: Send + Sync {
    /// Inserts or replaces the vector stored under `id`.
    fn insert(&mut self, id: &str, vector: &[f32]);

    /// Removes `id`. Returns whether it was present.
    fn remove(&mut self, id: &str) -> bool;

    fn get(&self, id: &str) -> Option<Vec<f32>>;

    fn contains(&self, id: &str) -> bool;

    fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)>;

    /// Live vector count.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// All live `(id, vector)` pairs, for snapshotting. Order unspecified.
    fn entries(&self) -> Vec<(String, Vec<f32>)>;
}

/// Builds the backend selected by the config. `Auto` prefers HNSW.
pub fn create_backend(config: &VectorConfig) -> Box<dyn VectorBackend> {
    match config.backend {
        BackendMode::Auto | BackendMode::Hnsw => Box::new(HnswBackend::new(config)),
        BackendMode::Linear => Box::new(LinearBackend::new(config.metric)),
    }
}
