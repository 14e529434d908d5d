//! Prometheus text exposition and the structured snapshot.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use agentdb_core::time::now_ms;

use super::{Child, Family};

/// Structured view of the whole registry at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generated_at: i64,
    pub metrics: Vec<MetricSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub name: String,
    pub help: String,
    pub kind: String,
    pub children: Vec<ChildSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSnapshot {
    pub labels: BTreeMap<String, String>,
    pub value: ChildValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChildValue {
    Counter {
        value: f64,
    },
    Gauge {
        value: f64,
    },
    Histogram {
        count: u64,
        sum: f64,
        buckets: Vec<BucketSnapshot>,
        p50: f64,
        p90: f64,
        p95: f64,
        p99: f64,
    },
    Summary {
        count: u64,
        sum: f64,
        p50: f64,
        p90: f64,
        p99: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSnapshot {
    pub le: f64,
    pub count: u64,
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn label_pairs(names: &[String], values: &[String]) -> String {
    names
        .iter()
        .zip(values.iter())
        .map(|(n, v)| format!("{n}=\"{}\"", escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `{a="x",b="y"}` or the empty string for label-less children.
fn label_block(names: &[String], values: &[String]) -> String {
    let pairs = label_pairs(names, values);
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{pairs}}}")
    }
}

/// Same, but with one extra pair appended (`le`/`quantile` samples).
fn label_block_with(names: &[String], values: &[String], extra: &str) -> String {
    let pairs = label_pairs(names, values);
    if pairs.is_empty() {
        format!("{{{extra}}}")
    } else {
        format!("{{{pairs},{extra}}}")
    }
}

fn fmt_le(bound: f64) -> String {
    if bound.is_infinite() {
        "+Inf".to_string()
    } else {
        format!("{bound}")
    }
}

pub(crate) fn render_text(families: &DashMap<String, Arc<Family>>) -> String {
    let mut names: Vec<String> = families.iter().map(|f| f.key().clone()).collect();
    names.sort();

    let mut out = String::new();
    for name in names {
        let Some(family) = families.get(&name).map(|f| f.value().clone()) else {
            continue;
        };
        let _ = writeln!(out, "# HELP {} {}", family.name, family.help);
        let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind.as_str());

        let mut children: Vec<(Vec<String>, Arc<Child>)> = family
            .children
            .iter()
            .map(|c| (c.key().clone(), c.value().clone()))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (label_values, child) in children {
            match &*child {
                Child::Counter(cell) => {
                    let _ = writeln!(
                        out,
                        "{}{} {}",
                        family.name,
                        label_block(&family.label_names, &label_values),
                        cell.get()
                    );
                }
                Child::Gauge(cell) => {
                    let _ = writeln!(
                        out,
                        "{}{} {}",
                        family.name,
                        label_block(&family.label_names, &label_values),
                        cell.get()
                    );
                }
                Child::Histogram(core) => {
                    for (bound, count) in core.cumulative_buckets() {
                        let extra = format!("le=\"{}\"", fmt_le(bound));
                        let _ = writeln!(
                            out,
                            "{}_bucket{} {}",
                            family.name,
                            label_block_with(&family.label_names, &label_values, &extra),
                            count
                        );
                    }
                    let block = label_block(&family.label_names, &label_values);
                    let _ = writeln!(out, "{}_sum{} {}", family.name, block, core.sum());
                    let _ = writeln!(out, "{}_count{} {}", family.name, block, core.count());
                }
                Child::Summary(core) => {
                    for q in [0.5, 0.9, 0.99] {
                        let extra = format!("quantile=\"{q}\"");
                        let _ = writeln!(
                            out,
                            "{}{} {}",
                            family.name,
                            label_block_with(&family.label_names, &label_values, &extra),
                            core.quantile(q)
                        );
                    }
                    let block = label_block(&family.label_names, &label_values);
                    let _ = writeln!(out, "{}_sum{} {}", family.name, block, core.sum());
                    let _ = writeln!(out, "{}_count{} {}", family.name, block, core.count());
                }
            }
        }
    }
    out
}

pub(crate) fn render_snapshot(families: &DashMap<String, Arc<Family>>) -> MetricsSnapshot {
    let mut names: Vec<String> = families.iter().map(|f| f.key().clone()).collect();
    names.sort();

    let mut metrics = Vec::with_capacity(names.len());
    for name in names {
        let Some(family) = families.get(&name).map(|f| f.value().clone()) else {
            continue;
        };
        let mut children = Vec::new();
        for entry in family.children.iter() {
            let labels: BTreeMap<String, String> = family
                .label_names
                .iter()
                .cloned()
                .zip(entry.key().iter().cloned())
                .collect();
            let value = match &**entry.value() {
                Child::Counter(cell) => ChildValue::Counter { value: cell.get() },
                Child::Gauge(cell) => ChildValue::Gauge { value: cell.get() },
                Child::Histogram(core) => {
                    let [p50, p90, p95, p99] = core.percentiles();
                    ChildValue::Histogram {
                        count: core.count(),
                        sum: core.sum(),
                        buckets: core
                            .cumulative_buckets()
                            .into_iter()
                            .map(|(le, count)| BucketSnapshot { le, count })
                            .collect(),
                        p50,
                        p90,
                        p95,
                        p99,
                    }
                }
                Child::Summary(core) => ChildValue::Summary {
                    count: core.count(),
                    sum: core.sum(),
                    p50: core.quantile(0.5),
                    p90: core.quantile(0.9),
                    p99: core.quantile(0.99),
                },
            };
            children.push(ChildSnapshot { labels, value });
        }
        children.sort_by(|a, b| a.labels.cmp(&b.labels));
        metrics.push(MetricSnapshot {
            name: family.name.clone(),
            help: family.help.clone(),
            kind: family.kind.as_str().to_string(),
            children,
        });
    }

    MetricsSnapshot {
        generated_at: now_ms(),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use crate::metrics::MetricsRegistry;

    #[test]
    fn text_exposition_shape() {
        let registry = MetricsRegistry::new();
        registry
            .counter("agentdb_requests_total", "Total requests", &["op"])
            .unwrap()
            .with_label_values(&["insert"])
            .unwrap()
            .inc_by(3.0);
        registry
            .histogram("agentdb_latency_ms", "Latency", &[], Some(vec![1.0, 10.0]))
            .unwrap()
            .with_label_values(&[])
            .unwrap()
            .observe(5.0);

        let text = registry.export();
        assert!(text.contains("# HELP agentdb_requests_total Total requests"));
        assert!(text.contains("# TYPE agentdb_requests_total counter"));
        assert!(text.contains("agentdb_requests_total{op=\"insert\"} 3"));
        assert!(text.contains("# TYPE agentdb_latency_ms histogram"));
        assert!(text.contains("agentdb_latency_ms_bucket{le=\"1\"} 0"));
        assert!(text.contains("agentdb_latency_ms_bucket{le=\"10\"} 1"));
        assert!(text.contains("agentdb_latency_ms_bucket{le=\"+Inf\"} 1"));
        assert!(text.contains("agentdb_latency_ms_sum 5"));
        assert!(text.contains("agentdb_latency_ms_count 1"));
    }

    #[test]
    fn snapshot_is_serialisable() {
        let registry = MetricsRegistry::new();
        registry
            .summary("agentdb_batch_sizes", "Batch sizes", &[], Some(100))
            .unwrap()
            .with_label_values(&[])
            .unwrap()
            .observe(12.0);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.metrics.len(), 1);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("agentdb_batch_sizes"));
        assert!(json.contains("\"kind\":\"summary\""));
    }

    #[test]
    fn label_values_are_escaped() {
        let registry = MetricsRegistry::new();
        registry
            .gauge("agentdb_paths", "Paths", &["path"])
            .unwrap()
            .with_label_values(&["a\"b\\c"])
            .unwrap()
            .set(1.0);
        let text = registry.export();
        assert!(text.contains(r#"path="a\"b\\c""#));
    }
}
