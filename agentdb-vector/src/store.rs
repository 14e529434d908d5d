//! Identified vector store.
//!
//! Enforces the embedding contract at every boundary, assigns UUID ids,
//! and layers events, metrics, snapshot persistence and optional
//! save-after-mutation on top of the pluggable backend.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;

use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use agentdb_core::config::VectorConfig;
use agentdb_core::errors::{AgentDbResult, StorageError};
use agentdb_core::retry::{with_retry, RetryPolicy};
use agentdb_core::validation::assert_dimensions;
use agentdb_observability::{
    Counter, EventBus, EventDraft, EventStatus, Gauge, Histogram, MetricsRegistry, Summary,
};

use crate::backend::{create_backend, VectorBackend};
use crate::distance;
use crate::snapshot;

const COMPONENT: &str = "vectordb";

/// One search hit. `vector` is populated only when the caller asked for
/// vectors, and is always an independent copy.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub similarity: f32,
    pub vector: Option<Vec<f32>>,
}

/// Knobs for [`VectorStore::search_with_options`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub k: usize,
    pub include_vectors: bool,
    /// Score floor, honouring the metric's direction.
    pub min_score: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 10,
            include_vectors: false,
            min_score: None,
        }
    }
}

struct StoreMetrics {
    operations: Option<agentdb_observability::CounterVec>,
    latency: Option<agentdb_observability::HistogramVec>,
    vectors: Option<Gauge>,
    batch_size: Option<Summary>,
}

impl StoreMetrics {
    fn register(registry: &MetricsRegistry) -> Self {
        let operations = registry
            .counter(
                "agentdb_vectordb_operations_total",
                "Vector store operations",
                &["operation"],
            )
            .ok();
        let latency = registry
            .histogram(
                "agentdb_vectordb_latency_ms",
                "Vector store operation latency in milliseconds",
                &["operation"],
                None,
            )
            .ok();
        let vectors = registry
            .gauge("agentdb_vectordb_vectors", "Live vectors in the store", &[])
            .ok()
            .and_then(|g| g.with_label_values(&[]).ok());
        let batch_size = registry
            .summary(
                "agentdb_vectordb_batch_size",
                "Batch insert sizes",
                &[],
                None,
            )
            .ok()
            .and_then(|s| s.with_label_values(&[]).ok());
        Self {
            operations,
            latency,
            vectors,
            batch_size,
        }
    }

    fn counter(&self, operation: &str) -> Option<Counter> {
        self.operations
            .as_ref()
            .and_then(|c| c.with_label_values(&[operation]).ok())
    }

    fn histogram(&self, operation: &str) -> Option<Histogram> {
        self.latency
            .as_ref()
            .and_then(|h| h.with_label_values(&[operation]).ok())
    }

    fn record(&self, operation: &str, elapsed_ms: f64) {
        if let Some(counter) = self.counter(operation) {
            counter.inc();
        }
        if let Some(histogram) = self.histogram(operation) {
            histogram.observe(elapsed_ms);
        }
    }

    fn set_count(&self, count: usize) {
        if let Some(gauge) = &self.vectors {
            gauge.set(count as f64);
        }
    }
}

/// The vector DB of the engine: validated, identified vectors over a
/// pluggable ANN backend with a durable binary snapshot.
pub struct VectorStore {
    config: VectorConfig,
    backend: RwLock<Box<dyn VectorBackend>>,
    bus: EventBus,
    metrics: StoreMetrics,
    auto_save: Option<(PathBuf, RetryPolicy)>,
}

impl VectorStore {
    pub fn new(config: VectorConfig, bus: EventBus, registry: &MetricsRegistry) -> Self {
        let backend = RwLock::new(create_backend(&config));
        Self {
            config,
            backend,
            bus,
            metrics: StoreMetrics::register(registry),
            auto_save: None,
        }
    }

    /// Saves to `path` after every mutation, through the retry helper.
    pub fn with_auto_save(mut self, path: PathBuf, policy: RetryPolicy) -> Self {
        self.auto_save = Some((path, policy));
        self
    }

    pub fn metric(&self) -> agentdb_core::config::DistanceMetric {
        self.config.metric
    }

    fn emit(&self, operation: &str, status: EventStatus, duration_ms: Option<f64>) {
        let mut draft = EventDraft::new(COMPONENT, operation, status);
        draft.duration_ms = duration_ms;
        self.bus.emit(draft);
    }

    fn validate(&self, vector: &[f32], context: &str) -> AgentDbResult<()> {
        assert_dimensions(vector, self.config.dimension, context)?;
        Ok(())
    }

    fn read_backend(
        &self,
    ) -> AgentDbResult<std::sync::RwLockReadGuard<'_, Box<dyn VectorBackend>>> {
        self.backend
            .read()
            .map_err(|_| StorageError::LockPoisoned { component: "vectordb" }.into())
    }

    fn write_backend(
        &self,
    ) -> AgentDbResult<std::sync::RwLockWriteGuard<'_, Box<dyn VectorBackend>>> {
        self.backend
            .write()
            .map_err(|_| StorageError::LockPoisoned { component: "vectordb" }.into())
    }

    async fn auto_save(&self) -> AgentDbResult<()> {
        if let Some((path, policy)) = &self.auto_save {
            let path = path.clone();
            let policy = policy.clone();
            self.save_with_policy(&path, &policy).await?;
        }
        Ok(())
    }

    /// Inserts a validated copy of `vector` under a fresh UUID.
    pub async fn insert(&self, vector: &[f32]) -> AgentDbResult<String> {
        let id = Uuid::new_v4().to_string();
        self.insert_with_id(&id, vector).await?;
        Ok(id)
    }

    /// Inserts under a caller-chosen id, replacing any existing vector.
    pub async fn insert_with_id(&self, id: &str, vector: &[f32]) -> AgentDbResult<()> {
        let started = Instant::now();
        self.emit("insert", EventStatus::Started, None);

        if let Err(err) = self.validate(vector, "vectordb.insert") {
            self.emit("insert", EventStatus::Failed, None);
            return Err(err);
        }

        let count = {
            let mut backend = self.write_backend()?;
            backend.insert(id, vector);
            backend.len()
        };
        self.metrics.set_count(count);
        self.auto_save().await?;

        let elapsed = started.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.record("insert", elapsed);
        self.emit("insert", EventStatus::Completed, Some(elapsed));
        Ok(())
    }

    /// Validates every vector first, then inserts them all under one
    /// lock: a bad vector fails the whole batch before anything lands.
    pub async fn batch_insert(&self, vectors: &[Vec<f32>]) -> AgentDbResult<Vec<String>> {
        let started = Instant::now();
        self.bus.emit(
            EventDraft::new(COMPONENT, "batch_insert", EventStatus::Started)
                .with_metadata(json!({ "count": vectors.len() })),
        );

        for (index, vector) in vectors.iter().enumerate() {
            if let Err(err) = self.validate(vector, &format!("vectordb.batch_insert[{index}]")) {
                self.emit("batch_insert", EventStatus::Failed, None);
                return Err(err);
            }
        }

        let mut ids = Vec::with_capacity(vectors.len());
        let count = {
            let mut backend = self.write_backend()?;
            for vector in vectors {
                let id = Uuid::new_v4().to_string();
                backend.insert(&id, vector);
                ids.push(id);
            }
            backend.len()
        };
        self.metrics.set_count(count);
        if let Some(summary) = &self.metrics.batch_size {
            summary.observe(vectors.len() as f64);
        }
        self.auto_save().await?;

        let elapsed = started.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.record("batch_insert", elapsed);
        self.bus.emit(
            EventDraft::new(COMPONENT, "batch_insert", EventStatus::Completed)
                .with_duration_ms(elapsed)
                .with_metadata(json!({ "count": vectors.len() })),
        );
        Ok(ids)
    }

    /// Top-k search, best-first under the configured metric.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        include_vectors: bool,
    ) -> AgentDbResult<Vec<SearchResult>> {
        self.search_with_options(
            query,
            &SearchOptions {
                k,
                include_vectors,
                min_score: None,
            },
        )
    }

    pub fn search_with_options(
        &self,
        query: &[f32],
        options: &SearchOptions,
    ) -> AgentDbResult<Vec<SearchResult>> {
        let started = Instant::now();
        self.emit("search", EventStatus::Started, None);

        if let Err(err) = self.validate(query, "vectordb.search") {
            self.emit("search", EventStatus::Failed, None);
            return Err(err);
        }

        let results = {
            let backend = self.read_backend()?;
            let hits = backend.search(query, options.k);
            hits.into_iter()
                .filter(|(_, score)| match options.min_score {
                    Some(floor) => distance::passes_floor(self.config.metric, *score, floor),
                    None => true,
                })
                .map(|(id, score)| {
                    let vector = if options.include_vectors {
                        backend.get(&id)
                    } else {
                        None
                    };
                    SearchResult {
                        id,
                        similarity: score,
                        vector,
                    }
                })
                .collect::<Vec<_>>()
        };

        let elapsed = started.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.record("search", elapsed);
        self.emit("search", EventStatus::Completed, Some(elapsed));
        Ok(results)
    }

    /// An independent copy of the stored vector, if present.
    pub fn get_vector(&self, id: &str) -> Option<Vec<f32>> {
        self.backend.read().ok().and_then(|b| b.get(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backend.read().ok().is_some_and(|b| b.contains(id))
    }

    pub async fn delete(&self, id: &str) -> AgentDbResult<bool> {
        let (removed, count) = {
            let mut backend = self.write_backend()?;
            let removed = backend.remove(id);
            (removed, backend.len())
        };
        if removed {
            self.metrics.set_count(count);
            self.auto_save().await?;
        }
        Ok(removed)
    }

    pub fn count(&self) -> usize {
        self.backend.read().ok().map_or(0, |b| b.len())
    }

    pub async fn clear(&self) -> AgentDbResult<()> {
        {
            let mut backend = self.write_backend()?;
            backend.clear();
        }
        self.metrics.set_count(0);
        self.auto_save().await
    }

    /// Writes the snapshot with the store's default retry policy.
    pub async fn save(&self, path: &Path) -> AgentDbResult<()> {
        self.save_with_policy(path, &RetryPolicy::default()).await
    }

    async fn save_with_policy(&self, path: &Path, policy: &RetryPolicy) -> AgentDbResult<()> {
        let entries = {
            let backend = self.read_backend()?;
            backend.entries()
        };
        let dimension = self.config.dimension;
        let path = path.to_path_buf();
        with_retry("vectordb.save", policy, || {
            let entries = entries.clone();
            let path = path.clone();
            async move {
                snapshot::write_snapshot(&path, dimension, &entries)?;
                Ok(())
            }
        })
        .await?;
        debug!(path = %path.display(), count = entries.len(), "vector snapshot written");
        Ok(())
    }

    /// Loads a snapshot, replacing current contents. Returns `false` when
    /// the file does not exist.
    pub async fn load(&self, path: &Path) -> AgentDbResult<bool> {
        let Some(entries) = snapshot::read_snapshot(path, self.config.dimension)? else {
            return Ok(false);
        };
        let count = entries.len();
        {
            let mut fresh = create_backend(&self.config);
            for (id, vector) in &entries {
                fresh.insert(id, vector);
            }
            let mut backend = self.write_backend()?;
            *backend = fresh;
        }
        self.metrics.set_count(count);
        debug!(path = %path.display(), count, "vector snapshot loaded");
        Ok(true)
    }

    /// Snapshot of all live entries; used by the episode store when it
    /// persists its own index.
    pub fn entries(&self) -> Vec<(String, Vec<f32>)> {
        self.backend.read().ok().map_or_else(Vec::new, |b| b.entries())
    }
}
