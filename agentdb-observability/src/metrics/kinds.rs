//! Histogram and summary cores.
//!
//! Both keep a bounded FIFO window of raw observations so percentiles are
//! computed from what actually happened recently, not from bucket
//! interpolation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::atomic::AtomicF64;

/// Default cap on retained raw samples.
pub const DEFAULT_SAMPLE_CAP: usize = 10_000;

/// Latency buckets in milliseconds, used when a histogram is registered
/// without explicit bounds.
pub fn default_latency_buckets() -> Vec<f64> {
    vec![
        0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0,
    ]
}

fn quantile_of(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let rank = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Bucketed observations plus a bounded sample window for percentiles.
#[derive(Debug)]
pub struct HistogramCore {
    /// Upper bounds, ascending. The implicit +Inf bucket is `overflow`.
    bounds: Vec<f64>,
    bucket_counts: Vec<AtomicU64>,
    overflow: AtomicU64,
    sum: AtomicF64,
    count: AtomicU64,
    samples: Mutex<VecDeque<f64>>,
    sample_cap: usize,
}

impl HistogramCore {
    pub fn new(mut bounds: Vec<f64>, sample_cap: usize) -> Self {
        bounds.sort_by(|a, b| a.total_cmp(b));
        bounds.dedup();
        let bucket_counts = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            bucket_counts,
            overflow: AtomicU64::new(0),
            sum: AtomicF64::new(0.0),
            count: AtomicU64::new(0),
            samples: Mutex::new(VecDeque::new()),
            sample_cap: sample_cap.max(1),
        }
    }

    pub fn observe(&self, value: f64) {
        match self.bounds.iter().position(|b| value <= *b) {
            Some(i) => self.bucket_counts[i].fetch_add(1, Ordering::Relaxed),
            None => self.overflow.fetch_add(1, Ordering::Relaxed),
        };
        self.sum.add(value);
        self.count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut samples) = self.samples.lock() {
            if samples.len() == self.sample_cap {
                samples.pop_front();
            }
            samples.push_back(value);
        }
    }

    pub fn sum(&self) -> f64 {
        self.sum.get()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Cumulative counts per bound, Prometheus `le` semantics; the final
    /// entry is the +Inf count (= total).
    pub fn cumulative_buckets(&self) -> Vec<(f64, u64)> {
        let mut running = 0u64;
        let mut out = Vec::with_capacity(self.bounds.len() + 1);
        for (bound, count) in self.bounds.iter().zip(self.bucket_counts.iter()) {
            running += count.load(Ordering::Relaxed);
            out.push((*bound, running));
        }
        running += self.overflow.load(Ordering::Relaxed);
        out.push((f64::INFINITY, running));
        out
    }

    /// p50/p90/p95/p99 over the retained sample window.
    pub fn percentiles(&self) -> [f64; 4] {
        let mut sorted: Vec<f64> = self
            .samples
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        sorted.sort_by(|a, b| a.total_cmp(b));
        [
            quantile_of(&sorted, 0.50),
            quantile_of(&sorted, 0.90),
            quantile_of(&sorted, 0.95),
            quantile_of(&sorted, 0.99),
        ]
    }
}

/// Rolling sample window supporting arbitrary quantiles.
#[derive(Debug)]
pub struct SummaryCore {
    samples: Mutex<VecDeque<f64>>,
    sample_cap: usize,
    sum: AtomicF64,
    count: AtomicU64,
}

impl SummaryCore {
    pub fn new(sample_cap: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            sample_cap: sample_cap.max(1),
            sum: AtomicF64::new(0.0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.sum.add(value);
        self.count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut samples) = self.samples.lock() {
            if samples.len() == self.sample_cap {
                samples.pop_front();
            }
            samples.push_back(value);
        }
    }

    pub fn quantile(&self, q: f64) -> f64 {
        let mut sorted: Vec<f64> = self
            .samples
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        sorted.sort_by(|a, b| a.total_cmp(b));
        quantile_of(&sorted, q)
    }

    pub fn sum(&self) -> f64 {
        self.sum.get()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
