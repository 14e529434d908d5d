//! Episode store and context-retrieval configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Upper bound on `episode_context` wall time.
    pub context_timeout_ms: u64,
    /// Same-task episodes returned by the direct sub-query.
    pub direct_limit: usize,
    /// Recent episodes returned by the temporal sub-query.
    pub temporal_limit: usize,
    /// Window of the temporal sub-query, in milliseconds.
    pub temporal_window_ms: i64,
    /// Similar episodes returned by the semantic sub-query.
    pub semantic_limit: usize,
    /// Similarity floor for the semantic sub-query.
    pub min_similarity: f32,
    /// SQLite busy timeout.
    pub busy_timeout_ms: u64,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            context_timeout_ms: 5_000,
            direct_limit: 50,
            temporal_limit: 20,
            temporal_window_ms: crate::time::HOUR_MS,
            semantic_limit: 10,
            min_similarity: 0.7,
            busy_timeout_ms: 5_000,
        }
    }
}
