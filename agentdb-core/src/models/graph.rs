//! Hypergraph domain models: nodes, binary edges, n-ary hyperedges and
//! temporal hyperedges with derived expiry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::time::now_ms;
use crate::validation::Embedding;

use super::property::Properties;

/// A typed property node, optionally carrying a validated embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Node {
    pub fn new(node_type: impl Into<String>, properties: Properties, embedding: Option<Embedding>) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4().to_string(),
            node_type: node_type.into(),
            properties,
            embedding,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A directed binary edge. Both endpoints must exist when it is created;
/// node deletion cascades over incident edges at the graph layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    pub created_at: i64,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            target: target.into(),
            edge_type: edge_type.into(),
            metadata,
            created_at: now_ms(),
        }
    }
}

/// Direction filter for incident-edge queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    Incoming,
    Outgoing,
    #[default]
    Both,
}

/// Expiry bucket of a temporal hyperedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalGranularity {
    Hourly,
    Daily,
    Monthly,
}

/// Expiry metadata carried by temporal hyperedges. Whether the edge is
/// expired is derived against the clock on every read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalBounds {
    pub expires_at: i64,
    pub granularity: TemporalGranularity,
}

/// An n-ary (n >= 3) typed relation over nodes. The member list is
/// ordered and may contain duplicates; callers decide what repeats mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperedge {
    pub id: String,
    pub nodes: Vec<String>,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalBounds>,
}

/// Minimum member count of a hyperedge.
pub const MIN_HYPEREDGE_NODES: usize = 3;

impl Hyperedge {
    pub fn new(nodes: Vec<String>, edge_type: impl Into<String>, metadata: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            nodes,
            edge_type: edge_type.into(),
            metadata,
            created_at: now_ms(),
            temporal: None,
        }
    }

    /// True when the hyperedge carries temporal bounds and the clock has
    /// crossed `expires_at`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.temporal.map(|t| t.expires_at <= now).unwrap_or(false)
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n == node_id)
    }
}
