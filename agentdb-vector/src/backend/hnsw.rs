//! HNSW backend built on `hnsw_rs`.
//!
//! The graph does not support removal, so deletes are tombstones: the
//! internal id joins a deleted set and search results are filtered. The
//! id-keyed vector map stays authoritative; snapshots are written from it
//! and a load rebuilds the graph, which compacts tombstones away.

use std::collections::{HashMap, HashSet};

use anndists::dist::DistCosine;
use hnsw_rs::prelude::*;

use agentdb_core::config::{DistanceMetric, VectorConfig};

use crate::distance;

use super::VectorBackend;

pub struct HnswBackend {
    hnsw: Hnsw<'static, f32, DistCosine>,
    /// Authoritative id -> vector map; the graph is an index over it.
    vectors: HashMap<String, Vec<f32>>,
    id_to_internal: HashMap<String, usize>,
    internal_to_id: Vec<String>,
    deleted: HashSet<usize>,
    metric: DistanceMetric,
    m: usize,
    max_elements: usize,
    max_layer: usize,
    ef_construction: usize,
    ef_search: usize,
}

impl HnswBackend {
    pub fn new(config: &VectorConfig) -> Self {
        Self {
            hnsw: Self::empty_graph(config.m, config.capacity, config.max_layer, config.ef_construction),
            vectors: HashMap::new(),
            id_to_internal: HashMap::new(),
            internal_to_id: Vec::new(),
            deleted: HashSet::new(),
            metric: config.metric,
            m: config.m,
            max_elements: config.capacity,
            max_layer: config.max_layer,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
        }
    }

    fn empty_graph(
        m: usize,
        max_elements: usize,
        max_layer: usize,
        ef_construction: usize,
    ) -> Hnsw<'static, f32, DistCosine> {
        Hnsw::new(m, max_elements.max(1), max_layer.max(1), ef_construction, DistCosine)
    }

    fn tombstone(&mut self, id: &str) {
        if let Some(internal) = self.id_to_internal.remove(id) {
            self.deleted.insert(internal);
        }
    }
}

impl VectorBackend for HnswBackend {
    fn insert(&mut self, id: &str, vector: &[f32]) {
        // Replacement tombstones the previous graph entry.
        self.tombstone(id);

        let internal = self.internal_to_id.len();
        self.internal_to_id.push(id.to_string());
        self.id_to_internal.insert(id.to_string(), internal);
        self.vectors.insert(id.to_string(), vector.to_vec());
        self.hnsw.insert((vector, internal));
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.vectors.remove(id).is_none() {
            return false;
        }
        self.tombstone(id);
        true
    }

    fn get(&self, id: &str) -> Option<Vec<f32>> {
        self.vectors.get(id).cloned()
    }

    fn contains(&self, id: &str) -> bool {
        self.vectors.contains_key(id)
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        if self.vectors.is_empty() || k == 0 {
            return Vec::new();
        }
        // Over-fetch to survive tombstone filtering, then score exactly
        // under the configured metric.
        let want = (k + self.deleted.len()).min(self.internal_to_id.len());
        let ef = self.ef_search.max(want);
        let neighbours = self.hnsw.search(query, want, ef);

        let mut results: Vec<(String, f32)> = neighbours
            .into_iter()
            .filter(|n| !self.deleted.contains(&n.d_id))
            .filter_map(|n| {
                let id = self.internal_to_id.get(n.d_id)?;
                let vector = self.vectors.get(id)?;
                Some((id.clone(), distance::score(self.metric, query, vector)))
            })
            .collect();
        distance::sort_best_first(self.metric, &mut results);
        results.truncate(k);
        results
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn clear(&mut self) {
        self.hnsw = Self::empty_graph(self.m, self.max_elements, self.max_layer, self.ef_construction);
        self.vectors.clear();
        self.id_to_internal.clear();
        self.internal_to_id.clear();
        self.deleted.clear();
    }

    fn entries(&self) -> Vec<(String, Vec<f32>)> {
        self.vectors
            .iter()
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect()
    }
}
