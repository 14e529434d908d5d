//! End-to-end engine scenarios across the vector store, hypergraph,
//! time index and episode store: HNSW snapshot round-trips, orphan
//! prevention with auto-linking, hyperedge arity and expiry, task
//! context assembly, bulk range queries, and the metrics/event surface.

use agentdb_core::config::{BackendMode, VectorConfig};
use agentdb_core::errors::{AgentDbError, GraphError};
use agentdb_core::models::{EpisodeMetadata, TemporalGranularity, KEY_PROPERTY};
use agentdb_core::time::now_ms;
use agentdb_core::validation::{cosine_similarity, EMBEDDING_DIMENSION};
use agentdb_episodes::{CreateEpisode, EpisodeStore};
use agentdb_graph::{CreateHyperedge, CreateNode, HypergraphStore, NodeFilter};
use agentdb_temporal::TimeIndex;
use agentdb_vector::VectorStore;
use serde_json::{json, Value};
use test_fixtures::{
    config_in, nearby_embedding, observability, seeded_embedding, unit_embedding, Rng,
};

fn keyed(node_type: &str, key: &str) -> CreateNode {
    let mut properties = agentdb_core::models::Properties::new();
    properties.insert(KEY_PROPERTY.into(), Value::String(key.into()));
    CreateNode {
        node_type: node_type.into(),
        properties,
        embedding: None,
        link_to: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scenario 1: HNSW round-trip through the on-disk snapshot
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn hnsw_snapshot_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.bin");
    let (bus, registry) = observability();

    let config = VectorConfig {
        backend: BackendMode::Hnsw,
        ..VectorConfig::default()
    };
    let store = VectorStore::new(config.clone(), bus.clone(), &registry);

    let mut originals = Vec::new();
    for seed in [3u64, 77, 200, 512, 901] {
        let vector = seeded_embedding(seed);
        let id = store.insert(&vector).await.unwrap();
        originals.push((id, vector));
    }
    store.save(&path).await.unwrap();

    let restored = VectorStore::new(config, bus, &registry);
    assert!(restored.load(&path).await.unwrap());
    assert_eq!(restored.count(), 5);

    for (id, vector) in &originals {
        let loaded = restored.get_vector(id).unwrap();
        for (a, b) in loaded.iter().zip(vector.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    let results = restored.search(&seeded_embedding(77), 10, false).unwrap();
    assert!(!results.is_empty());
    assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert_eq!(results[0].id, originals[1].0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scenario 2: orphan prevention and root-namespace auto-linking
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn orphan_prevention_with_auto_link() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, registry) = observability();
    let store = HypergraphStore::new("memory", &config_in(dir.path()), bus, &registry);

    let api = store.create_node(keyed("doc", "project/api")).unwrap();
    let db = store.create_node(keyed("doc", "project/db")).unwrap();
    assert_ne!(api, db);

    let err = store.create_node(keyed("x", "other/y")).unwrap_err();
    assert!(matches!(
        err,
        AgentDbError::Graph(GraphError::OrphanNode { .. })
    ));

    let report = store.validate_integrity().unwrap();
    assert!(report.is_valid);
    assert_eq!(report.total_nodes, 2);

    let namespaced = store
        .query_nodes(&NodeFilter {
            namespace: Some("project".into()),
            ..NodeFilter::default()
        })
        .unwrap();
    assert_eq!(namespaced.count, 2);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scenario 3 + 4: hyperedge arity and temporal expiry
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn hyperedge_arity_and_temporal_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, registry) = observability();
    let store = HypergraphStore::new("memory", &config_in(dir.path()), bus, &registry);

    let a = store.create_node(keyed("n", "project/a")).unwrap();
    let b = store.create_node(keyed("n", "project/b")).unwrap();
    let c = store.create_node(keyed("n", "project/c")).unwrap();

    let err = store
        .create_hyperedge(CreateHyperedge {
            nodes: vec![a.clone(), b.clone()],
            edge_type: "pair".into(),
            metadata: Value::Null,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        AgentDbError::Graph(GraphError::InvalidHyperedge { count: 2 })
    ));

    store
        .create_hyperedge(CreateHyperedge {
            nodes: vec![a.clone(), b.clone(), c.clone()],
            edge_type: "triple".into(),
            metadata: json!({"note": "persists"}),
        })
        .unwrap();

    let expired = store
        .create_temporal_hyperedge(
            CreateHyperedge {
                nodes: vec![a, b, c],
                edge_type: "session".into(),
                metadata: Value::Null,
            },
            now_ms() - 1,
            TemporalGranularity::Hourly,
        )
        .unwrap();

    assert!(store.get_hyperedge(&expired).unwrap().is_expired);

    let report = store.validate_integrity().unwrap();
    assert!(report.is_valid);
    assert_eq!(report.total_hyperedges, 2);
    assert_eq!(report.expired_temporal_hyperedges, vec![expired.clone()]);

    // Expired hyperedges stay retrievable.
    let all = store.get_all_hyperedges().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|h| h.is_expired).count(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scenario 5: episode context across direct, temporal and semantic views
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn episode_context_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, registry) = observability();
    let store = EpisodeStore::open(config_in(dir.path()), bus, &registry)
        .await
        .unwrap();

    let now = now_ms();
    let anchor = seeded_embedding(40);
    for (task, offset, embedding) in [
        ("T", 3_000, seeded_embedding(41)),
        ("T", 2_000, seeded_embedding(42)),
        ("T", 1_000, anchor.clone()),
        ("U", 1_500, nearby_embedding(&anchor)),
    ] {
        store
            .create_episode(CreateEpisode {
                task_id: task.to_string(),
                start_time: now - offset,
                end_time: Some(now - offset + 500),
                embedding,
                metadata: EpisodeMetadata::new("researcher", "follow the thread"),
                linked_episodes: vec![],
            })
            .await
            .unwrap();
    }

    let context = store.episode_context("T").await.unwrap();
    assert_eq!(context.direct.len(), 3);
    assert_eq!(context.temporal.len(), 4);
    assert!(context.semantic.iter().any(|e| e.task_id == "U"));
    assert!(context.semantic.iter().all(|e| e.task_id != "T"));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scenario 6: bulk range queries through the B+ tree
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn btree_bulk_range_query() {
    let mut index = TimeIndex::new();
    let mut rng = Rng(0x5eed_cafe_0123_4567);
    let mut expected: Vec<(i64, String)> = Vec::new();

    for i in 0..1_000 {
        let ts = rng.below(10_001) as i64;
        let id = format!("ep-{i}");
        index.insert(ts, &id);
        expected.push((ts, id));
    }

    let got = index.ids_in_range(2_500, 7_500);
    let mut want: Vec<(i64, String)> = expected
        .into_iter()
        .filter(|(ts, _)| (2_500..=7_500).contains(ts))
        .collect();
    want.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(got.len(), want.len());
    // Chronological: the timestamp sequence of results is non-decreasing.
    let timestamps: Vec<i64> = {
        let groups = index.query_range(2_500, 7_500);
        groups
            .iter()
            .flat_map(|(ts, ids)| ids.iter().map(move |_| *ts))
            .collect()
    };
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    assert!(timestamps.first().map(|t| *t >= 2_500).unwrap_or(true));
    assert!(timestamps.last().map(|t| *t <= 7_500).unwrap_or(true));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cross-cutting: validation boundaries hold everywhere
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn embedding_contract_is_enforced_at_every_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, registry) = observability();

    let vectors = VectorStore::new(VectorConfig::default(), bus.clone(), &registry);
    let graph = HypergraphStore::new("memory", &config_in(dir.path()), bus, &registry);

    let short = vec![0.0f32; EMBEDDING_DIMENSION - 1];
    let long = vec![0.0f32; EMBEDDING_DIMENSION + 1];
    let zero = vec![0.0f32; EMBEDDING_DIMENSION];
    let mut poisoned = unit_embedding(0);
    poisoned[EMBEDDING_DIMENSION - 1] = f32::NAN;

    assert!(vectors.insert(&short).await.is_err());
    assert!(vectors.insert(&long).await.is_err());
    assert!(vectors.insert(&zero).await.is_err());
    assert!(vectors.insert(&poisoned).await.is_err());
    assert_eq!(vectors.count(), 0);

    let mut with_bad_embedding = keyed("doc", "project/a");
    with_bad_embedding.embedding = Some(zero);
    assert!(graph.create_node(with_bad_embedding).is_err());

    // Validated vectors flow through, and cosine against itself is 1.
    let good = seeded_embedding(9);
    let id = vectors.insert(&good).await.unwrap();
    let fetched = vectors.get_vector(&id).unwrap();
    assert!((cosine_similarity(&good, &fetched).unwrap() - 1.0).abs() < 1e-5);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cross-cutting: the metrics surface reflects work done
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn metrics_exposition_covers_store_activity() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, registry) = observability();

    let vectors = VectorStore::new(VectorConfig::default(), bus.clone(), &registry);
    vectors.insert(&seeded_embedding(1)).await.unwrap();
    vectors.insert(&seeded_embedding(2)).await.unwrap();
    vectors.search(&seeded_embedding(1), 2, false).unwrap();

    let graph = HypergraphStore::new("memory", &config_in(dir.path()), bus, &registry);
    graph.create_node(keyed("doc", "project/a")).unwrap();

    let text = registry.export();
    assert!(text.contains("# TYPE agentdb_vectordb_operations_total counter"));
    assert!(text.contains("agentdb_vectordb_operations_total{operation=\"insert\"} 2"));
    assert!(text.contains("agentdb_vectordb_operations_total{operation=\"search\"} 1"));
    assert!(text.contains("agentdb_vectordb_vectors 2"));
    assert!(text.contains("agentdb_graphdb_nodes 1"));

    let snapshot = registry.snapshot();
    assert!(snapshot
        .metrics
        .iter()
        .any(|m| m.name == "agentdb_vectordb_latency_ms" && m.kind == "histogram"));
}
