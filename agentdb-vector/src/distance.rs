//! Distance kernels over validated vectors.
//!
//! Operands are assumed equal-length and finite; the stores validate at
//! their boundaries. For similarity metrics (cosine, dot) higher scores
//! are better; for distances (euclidean, manhattan) lower is better.

use agentdb_core::config::DistanceMetric;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum::<f64>() as f32
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        na += *x as f64 * *x as f64;
        nb += *y as f64 * *y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())) as f32
}

pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

pub fn manhattan(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64 - *y as f64).abs())
        .sum::<f64>() as f32
}

/// Score of `b` against `a` under `metric`.
pub fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine(a, b),
        DistanceMetric::DotProduct => dot(a, b),
        DistanceMetric::Euclidean => euclidean(a, b),
        DistanceMetric::Manhattan => manhattan(a, b),
    }
}

/// True when `candidate` is a better score than `incumbent` under the
/// metric's direction.
pub fn is_better(metric: DistanceMetric, candidate: f32, incumbent: f32) -> bool {
    if metric.is_similarity_metric() {
        candidate > incumbent
    } else {
        candidate < incumbent
    }
}

/// Sorts `(id, score)` pairs best-first for the metric.
pub fn sort_best_first(metric: DistanceMetric, results: &mut [(String, f32)]) {
    if metric.is_similarity_metric() {
        results.sort_by(|a, b| b.1.total_cmp(&a.1));
    } else {
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
    }
}

/// True when `score` passes a caller-supplied floor, honouring direction:
/// a floor keeps scores at least as good as the threshold.
pub fn passes_floor(metric: DistanceMetric, score: f32, floor: f32) -> bool {
    if metric.is_similarity_metric() {
        score >= floor
    } else {
        score <= floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: [f32; 3] = [1.0, 0.0, 0.0];
    const B: [f32; 3] = [0.0, 1.0, 0.0];

    #[test]
    fn kernels_on_unit_axes() {
        assert_eq!(dot(&A, &B), 0.0);
        assert_eq!(cosine(&A, &A), 1.0);
        assert!((euclidean(&A, &B) - 2.0f32.sqrt()).abs() < 1e-6);
        assert_eq!(manhattan(&A, &B), 2.0);
    }

    #[test]
    fn ordering_respects_metric_direction() {
        let mut sims = vec![("a".to_string(), 0.1), ("b".to_string(), 0.9)];
        sort_best_first(DistanceMetric::Cosine, &mut sims);
        assert_eq!(sims[0].0, "b");

        let mut dists = vec![("a".to_string(), 0.1), ("b".to_string(), 0.9)];
        sort_best_first(DistanceMetric::Euclidean, &mut dists);
        assert_eq!(dists[0].0, "a");

        assert!(is_better(DistanceMetric::Cosine, 0.9, 0.1));
        assert!(is_better(DistanceMetric::Manhattan, 0.1, 0.9));
    }

    #[test]
    fn floor_direction() {
        assert!(passes_floor(DistanceMetric::Cosine, 0.8, 0.7));
        assert!(!passes_floor(DistanceMetric::Cosine, 0.6, 0.7));
        assert!(passes_floor(DistanceMetric::Euclidean, 0.5, 1.0));
        assert!(!passes_floor(DistanceMetric::Euclidean, 1.5, 1.0));
    }
}
