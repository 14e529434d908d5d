//! Episode store end-to-end: create/update/delete lifecycle, time-range
//! and similarity queries, link-graph rules, context retrieval, snapshot
//! persistence and the directory lock.

use agentdb_core::config::AgentDbConfig;
use agentdb_core::errors::{AgentDbError, EpisodeError, StorageError};
use agentdb_core::models::{EpisodeMetadata, LinkType};
use agentdb_core::time::now_ms;
use agentdb_core::validation::{l2_normalize, EMBEDDING_DIMENSION};
use agentdb_observability::{EventBus, MetricsRegistry};
use agentdb_episodes::{CreateEpisode, EpisodeStore, SimilaritySearch, TimeRangeQuery, UpdateEpisode};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn config_in(dir: &std::path::Path) -> AgentDbConfig {
    let mut config = AgentDbConfig::default();
    config.storage.base_dir = dir.to_path_buf();
    config
}

async fn open_store(dir: &std::path::Path) -> EpisodeStore {
    EpisodeStore::open(config_in(dir), EventBus::disabled(), &MetricsRegistry::new())
        .await
        .unwrap()
}

/// Deterministic unit embedding; nearby seeds point in similar
/// directions, far seeds diverge.
fn embedding(seed: u64) -> Vec<f32> {
    let raw: Vec<f32> = (0..EMBEDDING_DIMENSION)
        .map(|i| (seed as f32 * 0.05 + i as f32 * 0.01).sin())
        .collect();
    l2_normalize(&raw, "fixture").unwrap()
}

/// A small rotation of `base`, still close in cosine terms.
fn similar_to(base: &[f32]) -> Vec<f32> {
    let mut raw = base.to_vec();
    for v in raw.iter_mut().take(32) {
        *v += 0.01;
    }
    l2_normalize(&raw, "fixture").unwrap()
}

fn create(task_id: &str, start_time: i64, embedding_vec: Vec<f32>) -> CreateEpisode {
    CreateEpisode {
        task_id: task_id.to_string(),
        start_time,
        end_time: Some(start_time + 1_000),
        embedding: embedding_vec,
        metadata: EpisodeMetadata::new("researcher", "investigate the archives"),
        linked_episodes: vec![],
    }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let now = now_ms();
    let id = store.create_episode(create("task-a", now, embedding(1))).await.unwrap();

    let episode = store.get_by_id(&id).await.unwrap();
    assert_eq!(episode.task_id, "task-a");
    assert_eq!(episode.start_time, now);
    assert_eq!(episode.metadata.agent_type, "researcher");
    assert_eq!(episode.embedding.as_slice(), embedding(1).as_slice());
    assert!(episode.linked_episodes.is_empty());
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn invalid_episodes_never_ingest() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let now = now_ms();

    // Wrong-dimension embedding.
    let mut bad = create("t", now, vec![1.0; 64]);
    assert!(matches!(
        store.create_episode(bad.clone()).await.unwrap_err(),
        AgentDbError::Validation(_)
    ));

    // end before start.
    bad = create("t", now, embedding(1));
    bad.end_time = Some(now - 5_000);
    assert!(matches!(
        store.create_episode(bad).await.unwrap_err(),
        AgentDbError::Episode(EpisodeError::InvalidTimeRange { .. })
    ));

    // Missing required metadata.
    let mut no_agent = create("t", now, embedding(1));
    no_agent.metadata.agent_type = String::new();
    assert!(matches!(
        store.create_episode(no_agent).await.unwrap_err(),
        AgentDbError::Episode(EpisodeError::MissingMetadata { .. })
    ));

    // Link to a missing episode.
    let mut dangling = create("t", now, embedding(1));
    dangling.linked_episodes = vec!["ghost".to_string()];
    assert!(matches!(
        store.create_episode(dangling).await.unwrap_err(),
        AgentDbError::Episode(EpisodeError::NotFound { .. })
    ));

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn update_closes_and_reindexes() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let now = now_ms();

    let mut ongoing = create("task-a", now, embedding(1));
    ongoing.end_time = None;
    let id = store.create_episode(ongoing).await.unwrap();
    assert!(store.get_by_id(&id).await.unwrap().is_ongoing());

    let other = store.create_episode(create("task-b", now, embedding(9))).await.unwrap();

    store
        .update(
            &id,
            UpdateEpisode {
                end_time: Some(now + 2_000),
                embedding: Some(embedding(50)),
                linked_episodes: Some(vec![other.clone()]),
                ..UpdateEpisode::default()
            },
        )
        .await
        .unwrap();

    let episode = store.get_by_id(&id).await.unwrap();
    assert_eq!(episode.end_time, Some(now + 2_000));
    assert_eq!(episode.embedding.as_slice(), embedding(50).as_slice());
    assert_eq!(episode.linked_episodes, vec![other]);
}

#[tokio::test]
async fn delete_cascades_links_and_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let now = now_ms();

    let a = store.create_episode(create("t", now, embedding(1))).await.unwrap();
    let b = store.create_episode(create("t", now + 10, embedding(2))).await.unwrap();
    store.link_episodes(&a, &b, LinkType::Sequence).await.unwrap();

    store.delete(&b).await.unwrap();
    assert!(matches!(
        store.get_by_id(&b).await.unwrap_err(),
        AgentDbError::Episode(EpisodeError::NotFound { .. })
    ));
    assert!(store.get_links(&a).await.unwrap().is_empty());
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.link_stats().total_links, 0);
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn time_range_honours_ongoing_flag() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let base = 1_000_000;

    store.create_episode(create("t", base, embedding(1))).await.unwrap();
    let mut ongoing = create("t", base + 500, embedding(2));
    ongoing.end_time = None;
    store.create_episode(ongoing).await.unwrap();
    // Outside the window entirely.
    store.create_episode(create("t", base + 100_000, embedding(3))).await.unwrap();

    let closed_only = store
        .query_by_time_range(TimeRangeQuery {
            start: base,
            end: base + 5_000,
            include_ongoing: false,
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(closed_only.len(), 1);

    let with_ongoing = store
        .query_by_time_range(TimeRangeQuery {
            start: base,
            end: base + 5_000,
            include_ongoing: true,
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(with_ongoing.len(), 2);
    assert!(with_ongoing.windows(2).all(|w| w[0].start_time <= w[1].start_time));

    let limited = store
        .query_by_time_range(TimeRangeQuery {
            start: base,
            end: base + 5_000,
            include_ongoing: true,
            limit: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn similarity_search_filters_by_task() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let now = now_ms();

    let anchor = embedding(10);
    store.create_episode(create("task-a", now, anchor.clone())).await.unwrap();
    store.create_episode(create("task-b", now + 1, similar_to(&anchor))).await.unwrap();
    store.create_episode(create("task-c", now + 2, embedding(400))).await.unwrap();

    let all = store
        .search_by_similarity(SimilaritySearch {
            embedding: anchor.clone(),
            k: 10,
            min_similarity: None,
            task_ids: None,
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert_eq!(all[0].episode.task_id, "task-a");

    let filtered = store
        .search_by_similarity(SimilaritySearch {
            embedding: anchor.clone(),
            k: 10,
            min_similarity: None,
            task_ids: Some(vec!["task-b".to_string()]),
        })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].episode.task_id, "task-b");

    let floored = store
        .search_by_similarity(SimilaritySearch {
            embedding: anchor,
            k: 10,
            min_similarity: Some(0.95),
            task_ids: None,
        })
        .await
        .unwrap();
    assert!(floored.iter().all(|s| s.similarity >= 0.95));
    assert!(floored.len() >= 2, "anchor and its rotation stay above 0.95");
}

// ─── Link graph ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn sequence_links_stay_acyclic() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let now = now_ms();

    let a = store.create_episode(create("t", now, embedding(1))).await.unwrap();
    let b = store.create_episode(create("t", now + 1, embedding(2))).await.unwrap();
    let c = store.create_episode(create("t", now + 2, embedding(3))).await.unwrap();

    store.link_episodes(&a, &b, LinkType::Sequence).await.unwrap();
    store.link_episodes(&b, &c, LinkType::Sequence).await.unwrap();

    assert!(matches!(
        store.link_episodes(&c, &a, LinkType::Sequence).await.unwrap_err(),
        AgentDbError::Episode(EpisodeError::SequenceCycle { .. })
    ));
    // The same pair as a causal link is fine.
    store.link_episodes(&c, &a, LinkType::Causal).await.unwrap();

    assert!(matches!(
        store.link_episodes(&a, &a, LinkType::Reference).await.unwrap_err(),
        AgentDbError::Episode(EpisodeError::SelfLink { .. })
    ));

    let links = store.get_links(&a).await.unwrap();
    assert_eq!(links.len(), 2);

    assert!(store.unlink_episodes(&a, &b).await.unwrap());
    assert!(!store.unlink_episodes(&a, &b).await.unwrap());
}

// ─── Context retrieval ───────────────────────────────────────────────────────

#[tokio::test]
async fn context_returns_direct_temporal_and_semantic() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let now = now_ms();

    let anchor = embedding(20);
    // Three episodes for task T, the latest carrying the anchor.
    store.create_episode(create("T", now - 3_000, embedding(21))).await.unwrap();
    store.create_episode(create("T", now - 2_000, embedding(22))).await.unwrap();
    store.create_episode(create("T", now - 1_000, anchor.clone())).await.unwrap();
    // One for task U with a similar embedding.
    store.create_episode(create("U", now - 1_500, similar_to(&anchor))).await.unwrap();

    let context = store.episode_context("T").await.unwrap();

    assert_eq!(context.direct.len(), 3);
    assert!(context.direct.iter().all(|e| e.task_id == "T"));
    assert!(context.direct.windows(2).all(|w| w[0].start_time >= w[1].start_time));

    // All four land inside the one-hour temporal window.
    assert_eq!(context.temporal.len(), 4);

    assert!(!context.semantic.is_empty());
    assert!(context.semantic.iter().all(|e| e.task_id != "T"));
    assert!(context.semantic.iter().any(|e| e.task_id == "U"));
}

#[tokio::test]
async fn context_for_unknown_task_is_empty_semantic() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    store
        .create_episode(create("other", now_ms(), embedding(5)))
        .await
        .unwrap();

    let context = store.episode_context("nobody").await.unwrap();
    assert!(context.direct.is_empty());
    assert!(context.semantic.is_empty());
    assert_eq!(context.temporal.len(), 1);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshots_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let now = now_ms();
    let (a, b) = {
        let store = open_store(dir.path()).await;
        let a = store.create_episode(create("t", now, embedding(1))).await.unwrap();
        let b = store.create_episode(create("t", now + 10, embedding(2))).await.unwrap();
        store.link_episodes(&a, &b, LinkType::Sequence).await.unwrap();
        store.close().await.unwrap();
        (a, b)
    };

    let store = open_store(dir.path()).await;
    assert_eq!(store.count().await.unwrap(), 2);
    let episode = store.get_by_id(&a).await.unwrap();
    assert_eq!(episode.embedding.as_slice(), embedding(1).as_slice());

    let links = store.get_links(&a).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].link_type, LinkType::Sequence);
    assert_eq!(links[0].target_id, b);

    // The rebuilt sequence graph still rejects the closing cycle.
    assert!(matches!(
        store.link_episodes(&b, &a, LinkType::Sequence).await.unwrap_err(),
        AgentDbError::Episode(EpisodeError::SequenceCycle { .. })
    ));

    // The restored time index serves range queries.
    let in_range = store
        .query_by_time_range(TimeRangeQuery {
            start: now - 100,
            end: now + 100_000,
            include_ongoing: true,
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(in_range.len(), 2);
}

#[tokio::test]
async fn directory_lock_rejects_second_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.storage.lock_timeout_ms = 200;

    let _first = EpisodeStore::open(config.clone(), EventBus::disabled(), &MetricsRegistry::new())
        .await
        .unwrap();

    let second = EpisodeStore::open(config, EventBus::disabled(), &MetricsRegistry::new()).await;
    assert!(matches!(
        second.unwrap_err(),
        AgentDbError::Storage(StorageError::LockHeld { .. })
    ));
}
