//! Event-bus configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Bounded event queue; when full the oldest event is dropped.
    pub queue_capacity: usize,
    /// Overrides the daemon socket path. When unset the bus prefers
    /// `$HOME/.god-agent/daemon.sock` and falls back to
    /// `/tmp/god-agent.sock`.
    pub socket_path: Option<PathBuf>,
    /// Poll interval while the daemon socket is absent.
    pub reconnect_interval_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            socket_path: None,
            reconnect_interval_ms: 5_000,
        }
    }
}
