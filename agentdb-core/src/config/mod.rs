pub mod episode_config;
pub mod observability_config;
pub mod storage_config;
pub mod vector_config;

use serde::{Deserialize, Serialize};

use crate::errors::{AgentDbError, AgentDbResult};
use crate::retry::RetryPolicy;

pub use episode_config::EpisodeConfig;
pub use observability_config::ObservabilityConfig;
pub use storage_config::StorageConfig;
pub use vector_config::{BackendMode, DistanceMetric, VectorConfig};

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentDbConfig {
    pub storage: StorageConfig,
    pub vector: VectorConfig,
    pub observability: ObservabilityConfig,
    pub episode: EpisodeConfig,
    pub retry: RetryPolicy,
}

impl AgentDbConfig {
    /// Load config from a TOML string, falling back to defaults for
    /// missing fields.
    pub fn from_toml(toml_str: &str) -> AgentDbResult<Self> {
        toml::from_str(toml_str).map_err(|e| AgentDbError::Config {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = AgentDbConfig::default();
        assert_eq!(config.vector.dimension, 1536);
        assert_eq!(config.vector.m, 32);
        assert_eq!(config.vector.ef_construction, 200);
        assert_eq!(config.vector.ef_search, 50);
        assert_eq!(config.observability.queue_capacity, 10_000);
        assert_eq!(config.storage.lock_timeout_ms, 5_000);
        assert_eq!(config.episode.context_timeout_ms, 5_000);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = AgentDbConfig::from_toml(
            r#"
            [storage]
            base_dir = "/tmp/agentdb-test"

            [vector]
            ef_search = 128
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.base_dir.to_str().unwrap(), "/tmp/agentdb-test");
        assert_eq!(config.vector.ef_search, 128);
        assert_eq!(config.vector.m, 32);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            AgentDbConfig::from_toml("vector = 3"),
            Err(AgentDbError::Config { .. })
        ));
    }
}
