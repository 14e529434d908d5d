//! Exact linear-scan backend. The correctness baseline every other
//! backend is held to.

use std::collections::HashMap;

use agentdb_core::config::DistanceMetric;

use crate::distance;

use super::VectorBackend;

pub struct LinearBackend {
    vectors: HashMap<String, Vec<f32>>,
    metric: DistanceMetric,
}

impl LinearBackend {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            vectors: HashMap::new(),
            metric,
        }
    }
}

impl VectorBackend for LinearBackend {
    fn insert(&mut self, id: &str, vector: &[f32]) {
        self.vectors.insert(id.to_string(), vector.to_vec());
    }

    fn remove(&mut self, id: &str) -> bool {
        self.vectors.remove(id).is_some()
    }

    fn get(&self, id: &str) -> Option<Vec<f32>> {
        self.vectors.get(id).cloned()
    }

    fn contains(&self, id: &str) -> bool {
        self.vectors.contains_key(id)
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), distance::score(self.metric, query, v)))
            .collect();
        distance::sort_best_first(self.metric, &mut scored);
        scored.truncate(k);
        scored
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn clear(&mut self) {
        self.vectors.clear();
    }

    fn entries(&self) -> Vec<(String, Vec<f32>)> {
        self.vectors
            .iter()
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(axis: usize, dim: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn search_orders_by_similarity() {
        let mut backend = LinearBackend::new(DistanceMetric::Cosine);
        backend.insert("x", &unit(0, 4));
        backend.insert("y", &unit(1, 4));
        backend.insert("z", &[0.8, 0.6, 0.0, 0.0]);

        let results = backend.search(&unit(0, 4), 3);
        assert_eq!(results[0].0, "x");
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results[1].0, "z");
        assert_eq!(results[2].0, "y");
    }

    #[test]
    fn replace_and_remove() {
        let mut backend = LinearBackend::new(DistanceMetric::Cosine);
        backend.insert("a", &unit(0, 4));
        backend.insert("a", &unit(1, 4));
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get("a").unwrap(), unit(1, 4));
        assert!(backend.remove("a"));
        assert!(!backend.remove("a"));
        assert!(backend.is_empty());
    }

    #[test]
    fn euclidean_orders_ascending() {
        let mut backend = LinearBackend::new(DistanceMetric::Euclidean);
        backend.insert("near", &[0.9, 0.1, 0.0, 0.0]);
        backend.insert("far", &unit(1, 4));
        let results = backend.search(&unit(0, 4), 2);
        assert_eq!(results[0].0, "near");
        assert!(results[0].1 < results[1].1);
    }
}
