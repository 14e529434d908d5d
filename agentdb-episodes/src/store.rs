//! The episode store.
//!
//! Relational rows are the source of truth for episode metadata; the
//! vector index owns the embeddings and the B+ tree owns the time axis.
//! Multi-write operations run in a single SQLite transaction under the
//! retry helper, and the in-memory indexes are updated after commit.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};
use uuid::Uuid;

use agentdb_core::config::{AgentDbConfig, DistanceMetric};
use agentdb_core::errors::{AgentDbResult, EpisodeError, StorageError};
use agentdb_core::models::{Episode, EpisodeLink, EpisodeMetadata, LinkType};
use agentdb_core::retry::with_retry;
use agentdb_core::time::now_ms;
use agentdb_core::validation::{assert_dimensions, Embedding};
use agentdb_observability::{EventBus, EventDraft, EventStatus, MetricsRegistry};
use agentdb_temporal::{persist as persist_time_index, restore as restore_time_index, TimeIndex};
use agentdb_vector::{SearchOptions, VectorStore};

use crate::context::ScoredEpisode;
use crate::linker::EpisodeLinker;
use crate::lock::DirectoryLock;
use crate::schema::{migrate, sql_err};

const COMPONENT: &str = "episodestore";

/// Options for [`EpisodeStore::create_episode`].
#[derive(Debug, Clone)]
pub struct CreateEpisode {
    pub task_id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub embedding: Vec<f32>,
    pub metadata: EpisodeMetadata,
    pub linked_episodes: Vec<String>,
}

/// Options for [`EpisodeStore::query_by_time_range`]. The window matches
/// episodes overlapping `[start, end]`; ongoing episodes join only when
/// `include_ongoing` is set.
#[derive(Debug, Clone)]
pub struct TimeRangeQuery {
    pub start: i64,
    pub end: i64,
    pub include_ongoing: bool,
    pub limit: Option<usize>,
}

/// Options for [`EpisodeStore::search_by_similarity`].
#[derive(Debug, Clone)]
pub struct SimilaritySearch {
    pub embedding: Vec<f32>,
    pub k: usize,
    pub min_similarity: Option<f32>,
    /// Restrict hits to these tasks.
    pub task_ids: Option<Vec<String>>,
}

/// Partial update for [`EpisodeStore::update`]. Unset fields keep their
/// stored value; setting `end_time` closes an ongoing episode.
#[derive(Debug, Clone, Default)]
pub struct UpdateEpisode {
    pub end_time: Option<i64>,
    pub metadata: Option<EpisodeMetadata>,
    pub embedding: Option<Vec<f32>>,
    pub linked_episodes: Option<Vec<String>>,
}

pub(crate) struct EpisodeRow {
    pub id: String,
    pub task_id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub metadata_json: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl EpisodeRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            metadata_json: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

pub(crate) const SELECT_EPISODE: &str =
    "SELECT id, task_id, start_time, end_time, metadata, created_at, updated_at FROM episodes";

struct EpisodeMetrics {
    operations: Option<agentdb_observability::CounterVec>,
    latency: Option<agentdb_observability::HistogramVec>,
    episodes: Option<agentdb_observability::Gauge>,
    links: Option<agentdb_observability::Gauge>,
}

impl EpisodeMetrics {
    fn register(registry: &MetricsRegistry) -> Self {
        let gauge = |name: &str, help: &str| {
            registry
                .gauge(name, help, &[])
                .ok()
                .and_then(|g| g.with_label_values(&[]).ok())
        };
        Self {
            operations: registry
                .counter(
                    "agentdb_episodes_operations_total",
                    "Episode store operations",
                    &["operation"],
                )
                .ok(),
            latency: registry
                .histogram(
                    "agentdb_episodes_latency_ms",
                    "Episode store operation latency in milliseconds",
                    &["operation"],
                    None,
                )
                .ok(),
            episodes: gauge("agentdb_episodes_total", "Stored episodes"),
            links: gauge("agentdb_episode_links_total", "Stored episode links"),
        }
    }

    fn record(&self, operation: &str, elapsed_ms: f64) {
        if let Some(counter) = self
            .operations
            .as_ref()
            .and_then(|c| c.with_label_values(&[operation]).ok())
        {
            counter.inc();
        }
        if let Some(histogram) = self
            .latency
            .as_ref()
            .and_then(|h| h.with_label_values(&[operation]).ok())
        {
            histogram.observe(elapsed_ms);
        }
    }
}

/// Hybrid relational + vector + temporal episode store.
pub struct EpisodeStore {
    pub(crate) config: AgentDbConfig,
    pub(crate) conn: tokio::sync::Mutex<Connection>,
    pub(crate) vectors: VectorStore,
    pub(crate) time_index: Mutex<TimeIndex>,
    pub(crate) linker: EpisodeLinker,
    pub(crate) bus: EventBus,
    metrics: EpisodeMetrics,
    vectors_path: PathBuf,
    time_index_path: PathBuf,
    _lock: DirectoryLock,
}

impl std::fmt::Debug for EpisodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeStore").finish_non_exhaustive()
    }
}

impl EpisodeStore {
    /// Opens (or creates) the store under the configured base directory.
    /// Acquires the advisory directory lock first, failing fast with
    /// `LockHeld` once the lock timeout elapses.
    pub async fn open(
        config: AgentDbConfig,
        bus: EventBus,
        registry: &MetricsRegistry,
    ) -> AgentDbResult<Self> {
        std::fs::create_dir_all(&config.storage.base_dir)?;

        let lock_path = config.storage.lock_path();
        let deadline =
            Instant::now() + std::time::Duration::from_millis(config.storage.lock_timeout_ms);
        let lock = loop {
            if let Some(lock) = DirectoryLock::try_acquire(&lock_path)? {
                break lock;
            }
            if Instant::now() >= deadline {
                return Err(StorageError::LockHeld { path: lock_path }.into());
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        };

        let conn = Connection::open(config.storage.episodes_db_path()).map_err(sql_err)?;
        migrate(&conn, config.episode.busy_timeout_ms)?;

        // Episode similarity is always cosine over the validated
        // embeddings, whatever the engine-wide metric is set to.
        let mut vector_config = config.vector.clone();
        vector_config.metric = DistanceMetric::Cosine;
        let vectors = VectorStore::new(vector_config, bus.clone(), registry);
        let vectors_path = config.storage.episode_vectors_path();
        vectors.load(&vectors_path).await?;

        let time_index_path = config.storage.time_index_path();
        let time_index = restore_time_index(&time_index_path)?.unwrap_or_default();

        let store = Self {
            config,
            conn: tokio::sync::Mutex::new(conn),
            vectors,
            time_index: Mutex::new(time_index),
            linker: EpisodeLinker::new(),
            bus,
            metrics: EpisodeMetrics::register(registry),
            vectors_path,
            time_index_path,
            _lock: lock,
        };
        store.reconcile().await?;
        Ok(store)
    }

    /// Re-derives the in-memory indexes from the relational rows: the
    /// rows are authoritative for membership, the snapshots for vectors.
    async fn reconcile(&self) -> AgentDbResult<()> {
        let conn = self.conn.lock().await;

        let mut stmt = conn
            .prepare("SELECT id, start_time FROM episodes")
            .map_err(sql_err)?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(sql_err)?
            .collect::<Result<_, _>>()
            .map_err(sql_err)?;

        {
            let mut index = self.time_index()?;
            let live: std::collections::HashSet<&str> =
                rows.iter().map(|(id, _)| id.as_str()).collect();
            for (ts, ids) in index.dump() {
                for id in ids {
                    if !live.contains(id.as_str()) {
                        index.remove(ts, &id);
                    }
                }
            }
            for (id, start_time) in &rows {
                index.insert(*start_time, id);
                if !self.vectors.contains(id) {
                    warn!(episode = %id, "episode has no vector; embedding lost until re-indexed");
                }
            }
        }

        let mut stmt = conn
            .prepare("SELECT source_id, target_id, link_type, created_at FROM episode_links")
            .map_err(sql_err)?;
        let links: Vec<(String, String, String, i64)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .map_err(sql_err)?
            .collect::<Result<_, _>>()
            .map_err(sql_err)?;
        for (source_id, target_id, link_type, created_at) in links {
            let Some(link_type) = LinkType::parse(&link_type) else {
                warn!(link_type, "unknown link type in storage; skipping");
                continue;
            };
            self.linker.add(EpisodeLink {
                source_id,
                target_id,
                link_type,
                created_at,
            });
        }
        Ok(())
    }

    pub(crate) fn time_index(&self) -> AgentDbResult<MutexGuard<'_, TimeIndex>> {
        self.time_index.lock().map_err(|_| {
            StorageError::LockPoisoned {
                component: "episodes.time_index",
            }
            .into()
        })
    }

    fn emit(&self, operation: &str, status: EventStatus, duration_ms: Option<f64>) {
        let mut draft = EventDraft::new(COMPONENT, operation, status);
        draft.duration_ms = duration_ms;
        self.bus.emit(draft);
    }

    fn finish(&self, operation: &str, started: Instant) {
        let elapsed = started.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.record(operation, elapsed);
        self.emit(operation, EventStatus::Completed, Some(elapsed));
    }

    fn publish_sizes(&self, conn: &Connection) {
        if let Some(gauge) = &self.metrics.episodes {
            if let Ok(count) =
                conn.query_row("SELECT COUNT(*) FROM episodes", [], |r| r.get::<_, i64>(0))
            {
                gauge.set(count as f64);
            }
        }
        if let Some(gauge) = &self.metrics.links {
            if let Ok(count) =
                conn.query_row("SELECT COUNT(*) FROM episode_links", [], |r| {
                    r.get::<_, i64>(0)
                })
            {
                gauge.set(count as f64);
            }
        }
    }

    fn exists(conn: &Connection, id: &str) -> AgentDbResult<bool> {
        conn.query_row("SELECT 1 FROM episodes WHERE id = ?1", [id], |_| Ok(()))
            .optional()
            .map_err(sql_err)
            .map(|found| found.is_some())
    }

    /// Creates an episode: validates, writes the row and its link rows in
    /// one transaction (retried), then updates the vector and time
    /// indexes.
    pub async fn create_episode(&self, options: CreateEpisode) -> AgentDbResult<String> {
        let started = Instant::now();
        self.emit("create", EventStatus::Started, None);

        let now = now_ms();
        let episode = Episode {
            id: Uuid::new_v4().to_string(),
            task_id: options.task_id.clone(),
            start_time: options.start_time,
            end_time: options.end_time,
            embedding: {
                assert_dimensions(
                    &options.embedding,
                    self.config.vector.dimension,
                    "episodes.create",
                )?;
                Embedding::new(options.embedding.clone())?
            },
            metadata: options.metadata.clone(),
            linked_episodes: options.linked_episodes.clone(),
            created_at: now,
            updated_at: now,
        };
        episode.validate()?;

        let metadata_json = serde_json::to_string(&episode.metadata)?;
        let id = episode.id.clone();

        with_retry("episodes.create", &self.config.retry, || {
            let episode = &episode;
            let metadata_json = metadata_json.clone();
            async move {
                let mut conn = self.conn.lock().await;
                for target in &episode.linked_episodes {
                    if !Self::exists(&conn, target)? {
                        return Err(EpisodeError::NotFound {
                            id: target.clone(),
                        }
                        .into());
                    }
                }
                let tx = conn.transaction().map_err(sql_err)?;
                tx.execute(
                    "INSERT INTO episodes (id, task_id, start_time, end_time, metadata, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        episode.id,
                        episode.task_id,
                        episode.start_time,
                        episode.end_time,
                        metadata_json,
                        episode.created_at,
                        episode.updated_at,
                    ],
                )
                .map_err(sql_err)?;
                for target in &episode.linked_episodes {
                    tx.execute(
                        "INSERT OR REPLACE INTO episode_links (source_id, target_id, link_type, created_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![episode.id, target, LinkType::Reference.as_str(), episode.created_at],
                    )
                    .map_err(sql_err)?;
                }
                tx.commit().map_err(sql_err)?;
                self.publish_sizes(&conn);
                Ok(())
            }
        })
        .await?;

        self.vectors
            .insert_with_id(&id, episode.embedding.as_slice())
            .await?;
        self.time_index()?.insert(episode.start_time, &id);
        for target in &episode.linked_episodes {
            self.linker.add(EpisodeLink {
                source_id: id.clone(),
                target_id: target.clone(),
                link_type: LinkType::Reference,
                created_at: now,
            });
        }

        debug!(episode = %id, task = %episode.task_id, "episode created");
        self.finish("create", started);
        Ok(id)
    }

    pub(crate) fn hydrate(&self, row: EpisodeRow) -> AgentDbResult<Episode> {
        let metadata: EpisodeMetadata = serde_json::from_str(&row.metadata_json)?;
        let vector = self.vectors.get_vector(&row.id).ok_or_else(|| {
            StorageError::SnapshotCorrupt {
                reason: format!("episode {} has no vector entry", row.id),
            }
        })?;
        let embedding = Embedding::new(vector)?;
        let linked_episodes = self
            .linker
            .outgoing(&row.id, None)
            .into_iter()
            .map(|l| l.target_id)
            .collect();
        Ok(Episode {
            id: row.id,
            task_id: row.task_id,
            start_time: row.start_time,
            end_time: row.end_time,
            embedding,
            metadata,
            linked_episodes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> AgentDbResult<Episode> {
        let row = {
            let conn = self.conn.lock().await;
            conn.query_row(
                &format!("{SELECT_EPISODE} WHERE id = ?1"),
                [id],
                EpisodeRow::from_row,
            )
            .optional()
            .map_err(sql_err)?
        };
        let row = row.ok_or_else(|| EpisodeError::NotFound { id: id.to_string() })?;
        self.hydrate(row)
    }

    /// Episodes overlapping the window, chronological by start time.
    pub async fn query_by_time_range(&self, query: TimeRangeQuery) -> AgentDbResult<Vec<Episode>> {
        let started = Instant::now();
        let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
        let rows = {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT_EPISODE}
                     WHERE start_time <= ?2
                       AND ((end_time IS NOT NULL AND end_time >= ?1)
                            OR (end_time IS NULL AND ?3))
                     ORDER BY start_time ASC, id ASC
                     LIMIT ?4"
                ))
                .map_err(sql_err)?;
            let rows: Vec<EpisodeRow> = stmt
                .query_map(
                    params![query.start, query.end, query.include_ongoing, limit],
                    EpisodeRow::from_row,
                )
                .map_err(sql_err)?
                .collect::<Result<_, _>>()
                .map_err(sql_err)?;
            rows
        };
        let episodes = rows
            .into_iter()
            .map(|row| self.hydrate(row))
            .collect::<AgentDbResult<Vec<_>>>()?;
        self.finish("query_by_time_range", started);
        Ok(episodes)
    }

    /// k-NN over episode embeddings, optionally filtered to given tasks.
    /// The relational filter is the only scoping applied; ongoing
    /// episodes participate like any other.
    pub async fn search_by_similarity(
        &self,
        search: SimilaritySearch,
    ) -> AgentDbResult<Vec<ScoredEpisode>> {
        let started = Instant::now();
        assert_dimensions(
            &search.embedding,
            self.config.vector.dimension,
            "episodes.search",
        )?;

        // Over-fetch when a task filter will discard hits afterwards.
        let fetch = if search.task_ids.is_some() {
            (search.k * 4).max(50)
        } else {
            search.k
        };
        let hits = self.vectors.search_with_options(
            &search.embedding,
            &SearchOptions {
                k: fetch,
                include_vectors: false,
                min_score: search.min_similarity,
            },
        )?;

        let mut results = Vec::with_capacity(search.k);
        for hit in hits {
            if results.len() == search.k {
                break;
            }
            let row = {
                let conn = self.conn.lock().await;
                conn.query_row(
                    &format!("{SELECT_EPISODE} WHERE id = ?1"),
                    [hit.id.as_str()],
                    EpisodeRow::from_row,
                )
                .optional()
                .map_err(sql_err)?
            };
            let Some(row) = row else {
                continue;
            };
            if let Some(task_ids) = &search.task_ids {
                if !task_ids.iter().any(|t| t == &row.task_id) {
                    continue;
                }
            }
            results.push(ScoredEpisode {
                episode: self.hydrate(row)?,
                similarity: hit.similarity,
            });
        }
        self.finish("search_by_similarity", started);
        Ok(results)
    }

    /// Applies a partial update: may close an ongoing episode, replace
    /// the embedding (re-indexed), and replace the link set.
    pub async fn update(&self, id: &str, patch: UpdateEpisode) -> AgentDbResult<()> {
        let started = Instant::now();
        let mut episode = self.get_by_id(id).await?;

        if let Some(end_time) = patch.end_time {
            episode.end_time = Some(end_time);
        }
        if let Some(metadata) = patch.metadata {
            episode.metadata = metadata;
        }
        if let Some(links) = &patch.linked_episodes {
            episode.linked_episodes = links.clone();
        }
        episode.updated_at = now_ms();
        episode.validate()?;

        if let Some(vector) = &patch.embedding {
            assert_dimensions(vector, self.config.vector.dimension, "episodes.update")?;
        }

        let metadata_json = serde_json::to_string(&episode.metadata)?;
        let replace_links = patch.linked_episodes.is_some();

        with_retry("episodes.update", &self.config.retry, || {
            let episode = &episode;
            let metadata_json = metadata_json.clone();
            async move {
                let mut conn = self.conn.lock().await;
                if replace_links {
                    for target in &episode.linked_episodes {
                        if target == id {
                            return Err(EpisodeError::SelfLink { id: id.to_string() }.into());
                        }
                        if !Self::exists(&conn, target)? {
                            return Err(EpisodeError::NotFound {
                                id: target.clone(),
                            }
                            .into());
                        }
                    }
                }
                let tx = conn.transaction().map_err(sql_err)?;
                tx.execute(
                    "UPDATE episodes SET end_time = ?2, metadata = ?3, updated_at = ?4 WHERE id = ?1",
                    params![id, episode.end_time, metadata_json, episode.updated_at],
                )
                .map_err(sql_err)?;
                if replace_links {
                    tx.execute("DELETE FROM episode_links WHERE source_id = ?1", [id])
                        .map_err(sql_err)?;
                    for target in &episode.linked_episodes {
                        tx.execute(
                            "INSERT OR REPLACE INTO episode_links (source_id, target_id, link_type, created_at)
                             VALUES (?1, ?2, ?3, ?4)",
                            params![id, target, LinkType::Reference.as_str(), episode.updated_at],
                        )
                        .map_err(sql_err)?;
                    }
                }
                tx.commit().map_err(sql_err)?;
                self.publish_sizes(&conn);
                Ok(())
            }
        })
        .await?;

        if let Some(vector) = &patch.embedding {
            self.vectors.insert_with_id(id, vector).await?;
        }
        if replace_links {
            for link in self.linker.outgoing(id, None) {
                self.linker.remove(id, &link.target_id);
            }
            for target in &episode.linked_episodes {
                self.linker.add(EpisodeLink {
                    source_id: id.to_string(),
                    target_id: target.clone(),
                    link_type: LinkType::Reference,
                    created_at: episode.updated_at,
                });
            }
        }

        self.finish("update", started);
        Ok(())
    }

    /// Deletes an episode, cascading its link rows and dropping its
    /// vector and time-index entries.
    pub async fn delete(&self, id: &str) -> AgentDbResult<()> {
        let started = Instant::now();
        let episode = self.get_by_id(id).await?;

        with_retry("episodes.delete", &self.config.retry, || async move {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction().map_err(sql_err)?;
            tx.execute(
                "DELETE FROM episode_links WHERE source_id = ?1 OR target_id = ?1",
                [id],
            )
            .map_err(sql_err)?;
            tx.execute("DELETE FROM episodes WHERE id = ?1", [id])
                .map_err(sql_err)?;
            tx.commit().map_err(sql_err)?;
            self.publish_sizes(&conn);
            Ok(())
        })
        .await?;

        self.vectors.delete(id).await?;
        self.time_index()?.remove(episode.start_time, id);
        self.linker.remove_all(id);

        self.finish("delete", started);
        Ok(())
    }

    /// Creates (or retypes) a link between two existing episodes.
    pub async fn link_episodes(
        &self,
        source: &str,
        target: &str,
        link_type: LinkType,
    ) -> AgentDbResult<()> {
        let started = Instant::now();
        {
            let conn = self.conn.lock().await;
            for endpoint in [source, target] {
                if !Self::exists(&conn, endpoint)? {
                    return Err(EpisodeError::NotFound {
                        id: endpoint.to_string(),
                    }
                    .into());
                }
            }
        }
        self.linker.validate(source, target, link_type)?;

        let created_at = now_ms();
        with_retry("episodes.link", &self.config.retry, || async move {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT OR REPLACE INTO episode_links (source_id, target_id, link_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![source, target, link_type.as_str(), created_at],
            )
            .map_err(sql_err)?;
            self.publish_sizes(&conn);
            Ok(())
        })
        .await?;

        self.linker.add(EpisodeLink {
            source_id: source.to_string(),
            target_id: target.to_string(),
            link_type,
            created_at,
        });
        self.finish("link", started);
        Ok(())
    }

    /// Removes the link between two episodes, if any.
    pub async fn unlink_episodes(&self, source: &str, target: &str) -> AgentDbResult<bool> {
        let removed_row = with_retry("episodes.unlink", &self.config.retry, || async move {
            let conn = self.conn.lock().await;
            let changed = conn
                .execute(
                    "DELETE FROM episode_links WHERE source_id = ?1 AND target_id = ?2",
                    params![source, target],
                )
                .map_err(sql_err)?;
            self.publish_sizes(&conn);
            Ok(changed > 0)
        })
        .await?;
        self.linker.remove(source, target);
        Ok(removed_row)
    }

    /// Every link touching the episode, outgoing first.
    pub async fn get_links(&self, id: &str) -> AgentDbResult<Vec<EpisodeLink>> {
        {
            let conn = self.conn.lock().await;
            if !Self::exists(&conn, id)? {
                return Err(EpisodeError::NotFound { id: id.to_string() }.into());
            }
        }
        let mut links = self.linker.outgoing(id, None);
        links.extend(self.linker.incoming(id, None));
        Ok(links)
    }

    /// Persists the vector and time-index snapshots.
    pub async fn save(&self) -> AgentDbResult<()> {
        let started = Instant::now();
        self.vectors.save(&self.vectors_path).await?;

        let snapshot = {
            let index = self.time_index()?;
            index.dump()
        };
        let path = self.time_index_path.clone();
        with_retry("episodes.save_time_index", &self.config.retry, || {
            let snapshot = snapshot.clone();
            let path = path.clone();
            async move {
                let mut index = TimeIndex::new();
                for (ts, ids) in &snapshot {
                    for id in ids {
                        index.insert(*ts, id);
                    }
                }
                persist_time_index(&index, &path)?;
                Ok(())
            }
        })
        .await?;
        self.finish("save", started);
        Ok(())
    }

    /// Flushes snapshots and outstanding events. The directory lock
    /// releases when the store drops.
    pub async fn close(self) -> AgentDbResult<()> {
        self.save().await?;
        self.bus.flush().await;
        Ok(())
    }

    pub async fn count(&self) -> AgentDbResult<usize> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT COUNT(*) FROM episodes", [], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(sql_err)
    }

    pub fn link_stats(&self) -> crate::linker::LinkStats {
        self.linker.stats()
    }
}
