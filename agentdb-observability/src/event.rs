//! Event schema for the observability bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentdb_core::time::now_ms;

/// Lifecycle status of an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Started,
    Completed,
    Failed,
}

/// What a component hands to [`crate::EventBus::emit`]. The bus fills in
/// the id and timestamp.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub component: &'static str,
    pub operation: String,
    pub status: EventStatus,
    pub duration_ms: Option<f64>,
    pub metadata: Option<Value>,
}

impl EventDraft {
    pub fn new(component: &'static str, operation: impl Into<String>, status: EventStatus) -> Self {
        Self {
            component,
            operation: operation.into(),
            status,
            duration_ms: None,
            metadata: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A fully formed event as written to the daemon socket, one JSON object
/// per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub id: String,
    pub timestamp: i64,
    pub component: String,
    pub operation: String,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl EngineEvent {
    /// Stamps a draft with `evt_{ts}_{rand}` and the current time.
    pub fn from_draft(draft: EventDraft) -> Self {
        let timestamp = now_ms();
        let suffix: u32 = rand::random();
        Self {
            id: format!("evt_{timestamp}_{suffix:08x}"),
            timestamp,
            component: draft.component.to_string(),
            operation: draft.operation,
            status: draft.status,
            duration_ms: draft.duration_ms,
            metadata: draft.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamped_events_have_unique_ids() {
        let a = EngineEvent::from_draft(EventDraft::new("vectordb", "insert", EventStatus::Started));
        let b = EngineEvent::from_draft(EventDraft::new("vectordb", "insert", EventStatus::Started));
        assert!(a.id.starts_with("evt_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn wire_format_is_flat_json() {
        let event = EngineEvent::from_draft(
            EventDraft::new("graphdb", "create_node", EventStatus::Completed)
                .with_duration_ms(1.25),
        );
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains("\"component\":\"graphdb\""));
        assert!(line.contains("\"status\":\"completed\""));
        assert!(!line.contains('\n'));
    }
}
