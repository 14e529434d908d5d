//! Prometheus-shaped metrics registry.
//!
//! Four kinds: counters (monotonic), gauges, histograms (bucketed, with
//! window percentiles) and summaries (rolling window, arbitrary
//! quantiles). Metrics are registered once with a label schema; recording
//! against the wrong number of label values is an error at the call site,
//! never a panic.

pub mod atomic;
pub mod export;
pub mod kinds;

use std::sync::Arc;

use dashmap::DashMap;

use atomic::AtomicF64;
use kinds::{default_latency_buckets, HistogramCore, SummaryCore, DEFAULT_SAMPLE_CAP};

pub use export::{ChildSnapshot, ChildValue, MetricSnapshot, MetricsSnapshot};

/// Registration and lookup failures. The recording paths themselves are
/// infallible once a child handle exists.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetricsError {
    #[error("metric {name} already registered as {existing}")]
    AlreadyRegistered { name: String, existing: &'static str },

    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelMismatch {
        metric: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid metric name: {name}")]
    InvalidName { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }
}

#[derive(Debug)]
pub(crate) enum Child {
    Counter(AtomicF64),
    Gauge(AtomicF64),
    Histogram(HistogramCore),
    Summary(SummaryCore),
}

#[derive(Debug)]
pub(crate) struct Family {
    pub(crate) name: String,
    pub(crate) help: String,
    pub(crate) kind: MetricKind,
    pub(crate) label_names: Vec<String>,
    pub(crate) children: DashMap<Vec<String>, Arc<Child>>,
    buckets: Vec<f64>,
    sample_cap: usize,
}

impl Family {
    fn child(&self, label_values: &[&str]) -> Result<Arc<Child>, MetricsError> {
        if label_values.len() != self.label_names.len() {
            return Err(MetricsError::LabelMismatch {
                metric: self.name.clone(),
                expected: self.label_names.len(),
                got: label_values.len(),
            });
        }
        let key: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        let child = self
            .children
            .entry(key)
            .or_insert_with(|| {
                Arc::new(match self.kind {
                    MetricKind::Counter => Child::Counter(AtomicF64::new(0.0)),
                    MetricKind::Gauge => Child::Gauge(AtomicF64::new(0.0)),
                    MetricKind::Histogram => {
                        Child::Histogram(HistogramCore::new(self.buckets.clone(), self.sample_cap))
                    }
                    MetricKind::Summary => Child::Summary(SummaryCore::new(self.sample_cap)),
                })
            })
            .value()
            .clone();
        Ok(child)
    }
}

fn valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Concurrent registry of metric families.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    families: Arc<DashMap<String, Arc<Family>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(
        &self,
        name: &str,
        help: &str,
        kind: MetricKind,
        label_names: &[&str],
        buckets: Vec<f64>,
        sample_cap: usize,
    ) -> Result<Arc<Family>, MetricsError> {
        if !valid_metric_name(name) {
            return Err(MetricsError::InvalidName {
                name: name.to_string(),
            });
        }
        if let Some(existing) = self.families.get(name) {
            if existing.kind == kind && existing.label_names == label_names {
                return Ok(existing.value().clone());
            }
            return Err(MetricsError::AlreadyRegistered {
                name: name.to_string(),
                existing: existing.kind.as_str(),
            });
        }
        let family = Arc::new(Family {
            name: name.to_string(),
            help: help.to_string(),
            kind,
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
            children: DashMap::new(),
            buckets,
            sample_cap,
        });
        self.families.insert(name.to_string(), family.clone());
        Ok(family)
    }

    pub fn counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<CounterVec, MetricsError> {
        self.register(name, help, MetricKind::Counter, label_names, vec![], 0)
            .map(|family| CounterVec { family })
    }

    pub fn gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<GaugeVec, MetricsError> {
        self.register(name, help, MetricKind::Gauge, label_names, vec![], 0)
            .map(|family| GaugeVec { family })
    }

    /// `buckets = None` uses the default latency buckets (milliseconds).
    pub fn histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Option<Vec<f64>>,
    ) -> Result<HistogramVec, MetricsError> {
        self.register(
            name,
            help,
            MetricKind::Histogram,
            label_names,
            buckets.unwrap_or_else(default_latency_buckets),
            DEFAULT_SAMPLE_CAP,
        )
        .map(|family| HistogramVec { family })
    }

    /// `sample_cap = None` retains the default 10 000 samples.
    pub fn summary(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        sample_cap: Option<usize>,
    ) -> Result<SummaryVec, MetricsError> {
        self.register(
            name,
            help,
            MetricKind::Summary,
            label_names,
            vec![],
            sample_cap.unwrap_or(DEFAULT_SAMPLE_CAP),
        )
        .map(|family| SummaryVec { family })
    }

    /// Prometheus text exposition of every family.
    pub fn export(&self) -> String {
        export::render_text(&self.families)
    }

    /// Structured snapshot for programmatic consumption.
    pub fn snapshot(&self) -> MetricsSnapshot {
        export::render_snapshot(&self.families)
    }
}

/// Counter family handle.
#[derive(Clone)]
pub struct CounterVec {
    family: Arc<Family>,
}

impl CounterVec {
    pub fn with_label_values(&self, values: &[&str]) -> Result<Counter, MetricsError> {
        self.family.child(values).map(Counter)
    }
}

/// A single counter child. Monotonically non-decreasing.
#[derive(Clone)]
pub struct Counter(Arc<Child>);

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1.0);
    }

    /// Negative deltas violate monotonicity and are ignored.
    pub fn inc_by(&self, delta: f64) {
        if delta < 0.0 || !delta.is_finite() {
            return;
        }
        if let Child::Counter(cell) = &*self.0 {
            cell.add(delta);
        }
    }

    pub fn value(&self) -> f64 {
        match &*self.0 {
            Child::Counter(cell) => cell.get(),
            _ => 0.0,
        }
    }
}

/// Gauge family handle.
#[derive(Clone)]
pub struct GaugeVec {
    family: Arc<Family>,
}

impl GaugeVec {
    pub fn with_label_values(&self, values: &[&str]) -> Result<Gauge, MetricsError> {
        self.family.child(values).map(Gauge)
    }
}

#[derive(Clone)]
pub struct Gauge(Arc<Child>);

impl Gauge {
    pub fn set(&self, value: f64) {
        if let Child::Gauge(cell) = &*self.0 {
            cell.set(value);
        }
    }

    pub fn inc(&self) {
        self.add(1.0);
    }

    pub fn dec(&self) {
        self.add(-1.0);
    }

    pub fn add(&self, delta: f64) {
        if let Child::Gauge(cell) = &*self.0 {
            cell.add(delta);
        }
    }

    pub fn value(&self) -> f64 {
        match &*self.0 {
            Child::Gauge(cell) => cell.get(),
            _ => 0.0,
        }
    }
}

/// Histogram family handle.
#[derive(Clone)]
pub struct HistogramVec {
    family: Arc<Family>,
}

impl HistogramVec {
    pub fn with_label_values(&self, values: &[&str]) -> Result<Histogram, MetricsError> {
        self.family.child(values).map(Histogram)
    }
}

#[derive(Clone)]
pub struct Histogram(Arc<Child>);

impl Histogram {
    pub fn observe(&self, value: f64) {
        if let Child::Histogram(core) = &*self.0 {
            core.observe(value);
        }
    }

    /// `[p50, p90, p95, p99]` over the retained sample window.
    pub fn percentiles(&self) -> [f64; 4] {
        match &*self.0 {
            Child::Histogram(core) => core.percentiles(),
            _ => [0.0; 4],
        }
    }

    pub fn count(&self) -> u64 {
        match &*self.0 {
            Child::Histogram(core) => core.count(),
            _ => 0,
        }
    }
}

/// Summary family handle.
#[derive(Clone)]
pub struct SummaryVec {
    family: Arc<Family>,
}

impl SummaryVec {
    pub fn with_label_values(&self, values: &[&str]) -> Result<Summary, MetricsError> {
        self.family.child(values).map(Summary)
    }
}

#[derive(Clone)]
pub struct Summary(Arc<Child>);

impl Summary {
    pub fn observe(&self, value: f64) {
        if let Child::Summary(core) = &*self.0 {
            core.observe(value);
        }
    }

    pub fn quantile(&self, q: f64) -> f64 {
        match &*self.0 {
            Child::Summary(core) => core.quantile(q),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_monotonic() {
        let registry = MetricsRegistry::new();
        let counter = registry
            .counter("agentdb_inserts_total", "Total inserts", &["store"])
            .unwrap()
            .with_label_values(&["vector"])
            .unwrap();
        counter.inc();
        counter.inc_by(2.0);
        counter.inc_by(-5.0);
        assert_eq!(counter.value(), 3.0);
    }

    #[test]
    fn label_arity_is_enforced() {
        let registry = MetricsRegistry::new();
        let vec = registry
            .counter("agentdb_ops_total", "Ops", &["component", "op"])
            .unwrap();
        assert!(matches!(
            vec.with_label_values(&["vector"]),
            Err(MetricsError::LabelMismatch { expected: 2, got: 1, .. })
        ));
        assert!(vec.with_label_values(&["vector", "insert"]).is_ok());
    }

    #[test]
    fn re_registration_same_shape_is_idempotent() {
        let registry = MetricsRegistry::new();
        let a = registry.gauge("agentdb_nodes", "Nodes", &[]).unwrap();
        let b = registry.gauge("agentdb_nodes", "Nodes", &[]).unwrap();
        a.with_label_values(&[]).unwrap().set(7.0);
        assert_eq!(b.with_label_values(&[]).unwrap().value(), 7.0);
        assert!(matches!(
            registry.counter("agentdb_nodes", "Nodes", &[]),
            Err(MetricsError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn invalid_names_rejected() {
        let registry = MetricsRegistry::new();
        assert!(matches!(
            registry.counter("9starts_with_digit", "bad", &[]),
            Err(MetricsError::InvalidName { .. })
        ));
        assert!(matches!(
            registry.counter("has space", "bad", &[]),
            Err(MetricsError::InvalidName { .. })
        ));
    }
}
