//! Task-aware context retrieval.
//!
//! `episode_context` assembles three views of an episode history at
//! once: the task's own episodes, everything recent, and semantically
//! similar work from other tasks. The sub-queries run concurrently and
//! the whole call is bounded by the configured operation timeout.

use std::time::Duration;

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use agentdb_core::errors::{AgentDbError, AgentDbResult};
use agentdb_core::models::Episode;
use agentdb_core::time::now_ms;
use agentdb_observability::{EventDraft, EventStatus};

use crate::schema::sql_err;
use crate::store::{EpisodeRow, EpisodeStore, SimilaritySearch, SELECT_EPISODE};

/// An episode with the similarity score that surfaced it.
#[derive(Debug, Clone)]
pub struct ScoredEpisode {
    pub episode: Episode,
    pub similarity: f32,
}

/// The three context views returned by
/// [`EpisodeStore::episode_context`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeContext {
    /// Same-task episodes, most recent first.
    pub direct: Vec<Episode>,
    /// Episodes from the recent window, most recent first.
    pub temporal: Vec<Episode>,
    /// Similar episodes from other tasks.
    pub semantic: Vec<Episode>,
}

impl EpisodeStore {
    /// Gathers `{direct, temporal, semantic}` context for a task. The
    /// three sub-queries run concurrently; exceeding the configured
    /// timeout surfaces `RetryExhausted`.
    pub async fn episode_context(&self, task_id: &str) -> AgentDbResult<EpisodeContext> {
        let started = std::time::Instant::now();
        self.bus_emit_context(EventStatus::Started, None);

        let timeout = Duration::from_millis(self.config.episode.context_timeout_ms);
        let gathered = tokio::time::timeout(timeout, async {
            tokio::join!(
                self.direct_context(task_id),
                self.temporal_context(),
                self.semantic_context(task_id),
            )
        })
        .await;

        let (direct, temporal, semantic) = match gathered {
            Ok(parts) => parts,
            Err(_) => {
                self.bus_emit_context(EventStatus::Failed, None);
                return Err(AgentDbError::RetryExhausted {
                    operation: "episodes.context".to_string(),
                    attempts: 1,
                    source: Box::new(AgentDbError::Cancelled {
                        operation: format!("episodes.context({task_id}) timed out"),
                    }),
                });
            }
        };

        let context = EpisodeContext {
            direct: direct?,
            temporal: temporal?,
            semantic: semantic?.into_iter().map(|s| s.episode).collect(),
        };
        let elapsed = started.elapsed().as_secs_f64() * 1_000.0;
        self.bus_emit_context(EventStatus::Completed, Some(elapsed));
        Ok(context)
    }

    fn bus_emit_context(&self, status: EventStatus, duration_ms: Option<f64>) {
        let mut draft = EventDraft::new("episodestore", "context", status);
        draft.duration_ms = duration_ms;
        self.bus.emit(draft);
    }

    /// Up to `direct_limit` episodes sharing the task id.
    async fn direct_context(&self, task_id: &str) -> AgentDbResult<Vec<Episode>> {
        let limit = self.config.episode.direct_limit as i64;
        let rows = {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT_EPISODE} WHERE task_id = ?1 ORDER BY start_time DESC, id DESC LIMIT ?2"
                ))
                .map_err(sql_err)?;
            let rows: Vec<EpisodeRow> = stmt
                .query_map(rusqlite::params![task_id, limit], EpisodeRow::from_row)
                .map_err(sql_err)?
                .collect::<Result<_, _>>()
                .map_err(sql_err)?;
            rows
        };
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    /// The most recent episodes inside the temporal window, resolved
    /// through the B+ tree.
    async fn temporal_context(&self) -> AgentDbResult<Vec<Episode>> {
        let now = now_ms();
        let window_start = now - self.config.episode.temporal_window_ms;
        let ids: Vec<String> = {
            let index = self.time_index()?;
            let mut ids = index.ids_in_range(window_start, now);
            ids.reverse();
            ids.truncate(self.config.episode.temporal_limit);
            ids
        };

        let mut episodes = Vec::with_capacity(ids.len());
        for id in ids {
            let row = {
                let conn = self.conn.lock().await;
                conn.query_row(
                    &format!("{SELECT_EPISODE} WHERE id = ?1"),
                    [id.as_str()],
                    EpisodeRow::from_row,
                )
                .optional()
                .map_err(sql_err)?
            };
            if let Some(row) = row {
                episodes.push(self.hydrate(row)?);
            }
        }
        Ok(episodes)
    }

    /// Episodes similar to the task's most recent embedding, excluding
    /// the task's own episodes.
    async fn semantic_context(&self, task_id: &str) -> AgentDbResult<Vec<ScoredEpisode>> {
        let anchor = {
            let conn = self.conn.lock().await;
            conn.query_row(
                "SELECT id FROM episodes WHERE task_id = ?1 ORDER BY start_time DESC, id DESC LIMIT 1",
                [task_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(sql_err)?
        };
        let Some(anchor_id) = anchor else {
            return Ok(Vec::new());
        };
        let Some(query_vector) = self.vectors.get_vector(&anchor_id) else {
            return Ok(Vec::new());
        };

        let limit = self.config.episode.semantic_limit;
        // Over-fetch: same-task hits get filtered back out below.
        let scored = self
            .search_by_similarity(SimilaritySearch {
                embedding: query_vector,
                k: limit + self.config.episode.direct_limit,
                min_similarity: Some(self.config.episode.min_similarity),
                task_ids: None,
            })
            .await?;

        Ok(scored
            .into_iter()
            .filter(|s| s.episode.task_id != task_id)
            .take(limit)
            .collect())
    }
}
