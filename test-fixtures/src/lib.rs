//! Shared fixtures for the workspace test suites.

use std::path::Path;

use agentdb_core::config::AgentDbConfig;
use agentdb_core::validation::{l2_normalize, EMBEDDING_DIMENSION};
use agentdb_observability::{EventBus, MetricsRegistry};

/// A 1536-dimensional unit vector along `axis`.
pub fn unit_embedding(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; EMBEDDING_DIMENSION];
    v[axis % EMBEDDING_DIMENSION] = 1.0;
    v
}

/// Deterministic L2-normalised embedding; close seeds yield similar
/// vectors, distant seeds diverge.
pub fn seeded_embedding(seed: u64) -> Vec<f32> {
    let raw: Vec<f32> = (0..EMBEDDING_DIMENSION)
        .map(|i| (seed as f32 * 0.05 + i as f32 * 0.01).sin())
        .collect();
    l2_normalize(&raw, "fixture").unwrap()
}

/// A slight rotation of `base`, cosine-close to it.
pub fn nearby_embedding(base: &[f32]) -> Vec<f32> {
    let mut raw = base.to_vec();
    for v in raw.iter_mut().take(32) {
        *v += 0.01;
    }
    l2_normalize(&raw, "fixture").unwrap()
}

/// Engine config rooted in `dir`.
pub fn config_in(dir: &Path) -> AgentDbConfig {
    let mut config = AgentDbConfig::default();
    config.storage.base_dir = dir.to_path_buf();
    config
}

/// Hermetic observability pair for tests.
pub fn observability() -> (EventBus, MetricsRegistry) {
    (EventBus::disabled(), MetricsRegistry::new())
}

/// Deterministic xorshift for tests that need bulk data without a seed
/// source.
pub struct Rng(pub u64);

impl Rng {
    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}
