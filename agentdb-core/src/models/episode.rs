//! Episode domain models: time-bounded task executions with embeddings,
//! required metadata, and the typed link vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::EpisodeError;
use crate::validation::Embedding;

/// Hard cap on links per episode.
pub const MAX_EPISODE_LINKS: usize = 100;

/// Hard cap on serialised metadata, in bytes.
pub const MAX_METADATA_BYTES: usize = 100 * 1024;

/// Outcome label of a finished task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeOutcome {
    Success,
    Failure,
    Partial,
}

/// Episode metadata. `agent_type` and `task_description` are required;
/// anything else rides along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub agent_type: String,
    pub task_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<EpisodeOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EpisodeMetadata {
    pub fn new(agent_type: impl Into<String>, task_description: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            task_description: task_description.into(),
            outcome: None,
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Enforces the required fields and the serialised-size cap.
    pub fn validate(&self) -> Result<(), EpisodeError> {
        if self.agent_type.trim().is_empty() {
            return Err(EpisodeError::MissingMetadata {
                field: "agent_type".into(),
            });
        }
        if self.task_description.trim().is_empty() {
            return Err(EpisodeError::MissingMetadata {
                field: "task_description".into(),
            });
        }
        let size = serde_json::to_vec(self)
            .map(|b| b.len())
            .unwrap_or(usize::MAX);
        if size > MAX_METADATA_BYTES {
            return Err(EpisodeError::MetadataTooLarge {
                size,
                limit: MAX_METADATA_BYTES,
            });
        }
        Ok(())
    }
}

/// A time-bounded record of one agent task execution. `end_time = None`
/// means the episode is still ongoing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub task_id: String,
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub embedding: Embedding,
    pub metadata: EpisodeMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_episodes: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Episode {
    /// Enforces the episode invariants: time ordering, metadata rules and
    /// the link cap.
    pub fn validate(&self) -> Result<(), EpisodeError> {
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(EpisodeError::InvalidTimeRange {
                    start: self.start_time,
                    end,
                });
            }
        }
        self.metadata.validate()?;
        if self.linked_episodes.len() > MAX_EPISODE_LINKS {
            return Err(EpisodeError::TooManyLinks {
                id: self.id.clone(),
                count: self.linked_episodes.len(),
                limit: MAX_EPISODE_LINKS,
            });
        }
        Ok(())
    }

    pub fn is_ongoing(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Typed relation between two episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Sequence,
    Reference,
    Continuation,
    Causal,
    Temporal,
    Semantic,
    Dependency,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Sequence => "sequence",
            LinkType::Reference => "reference",
            LinkType::Continuation => "continuation",
            LinkType::Causal => "causal",
            LinkType::Temporal => "temporal",
            LinkType::Semantic => "semantic",
            LinkType::Dependency => "dependency",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequence" => Some(LinkType::Sequence),
            "reference" => Some(LinkType::Reference),
            "continuation" => Some(LinkType::Continuation),
            "causal" => Some(LinkType::Causal),
            "temporal" => Some(LinkType::Temporal),
            "semantic" => Some(LinkType::Semantic),
            "dependency" => Some(LinkType::Dependency),
            _ => None,
        }
    }
}

/// A persisted episode link row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLink {
    pub source_id: String,
    pub target_id: String,
    pub link_type: LinkType,
    pub created_at: i64,
}
