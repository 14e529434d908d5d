//! Vector index configuration: distance semantics, backend selection and
//! HNSW tuning parameters.

use serde::{Deserialize, Serialize};

/// Distance function used for similarity search.
///
/// For Cosine and DotProduct higher scores are better; for Euclidean and
/// Manhattan lower scores are better. Top-k ordering reverses accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
    Manhattan,
}

impl DistanceMetric {
    /// True when larger scores mean closer vectors.
    pub fn is_similarity_metric(&self) -> bool {
        matches!(self, DistanceMetric::Cosine | DistanceMetric::DotProduct)
    }
}

/// Which ANN backend to use. `Auto` prefers the HNSW graph; `Linear` is
/// the exact-scan fallback that honours the same contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    #[default]
    Auto,
    Hnsw,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub backend: BackendMode,
    /// HNSW max connections per node.
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Sizing hint for the HNSW layer structure.
    pub capacity: usize,
    pub max_layer: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            dimension: crate::validation::EMBEDDING_DIMENSION,
            metric: DistanceMetric::Cosine,
            backend: BackendMode::Auto,
            m: 32,
            ef_construction: 200,
            ef_search: 50,
            capacity: 100_000,
            max_layer: 16,
        }
    }
}
