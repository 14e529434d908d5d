//! # agentdb-observability
//!
//! The in-process observability substrate the storage layers emit into:
//! a best-effort event bus draining to an optional UNIX-socket daemon,
//! and a Prometheus-shaped metrics registry.
//!
//! Nothing in this crate may surface an error to a storage caller. The
//! bus degrades to a bounded in-memory queue with FIFO eviction; the
//! registry only errors at registration and label-lookup time, never on
//! the hot recording path.

pub mod bus;
pub mod event;
pub mod metrics;

pub use bus::EventBus;
pub use event::{EngineEvent, EventDraft, EventStatus};
pub use metrics::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec, MetricsError, MetricsRegistry,
    Summary, SummaryVec,
};
