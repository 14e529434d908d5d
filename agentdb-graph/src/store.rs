//! The hypergraph store.
//!
//! Id-keyed maps guarded by one `RwLock`, with secondary indexes for key
//! lookup, incident edges and hyperedge membership. Every node after the
//! first must be reachable: creation either names a `link_to` target,
//! upserts onto an existing key, or auto-links through its namespace to
//! the synthetic `graph:root`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use agentdb_core::config::AgentDbConfig;
use agentdb_core::errors::{AgentDbError, AgentDbResult, GraphError, StorageError};
use agentdb_core::models::{
    key_namespace, merge_properties, property_key, Edge, EdgeDirection, Hyperedge, Node,
    Properties, TemporalBounds, TemporalGranularity, GRAPH_ROOT_KEY, KEY_PROPERTY,
    MIN_HYPEREDGE_NODES, ROOT_NAMESPACES,
};
use agentdb_core::retry::{with_retry, RetryPolicy};
use agentdb_core::time::now_ms;
use agentdb_core::validation::{assert_dimensions, Embedding};
use agentdb_core::CancellationToken;
use agentdb_observability::{EventBus, EventDraft, EventStatus, MetricsRegistry};

use crate::integrity::{build_report, IntegrityReport};
use crate::persistence::{read_graph, write_graph, GraphDocument, GRAPH_DOCUMENT_VERSION};
use crate::query::{HyperedgeRecord, NodeFilter, QueryOutput, TraversalOutput};
use crate::traversal::bfs_hops;

const COMPONENT: &str = "graphdb";

/// Edge type used for orphan-prevention auto-links.
pub const LINKED_TO: &str = "linked_to";

/// Options for [`HypergraphStore::create_node`].
#[derive(Debug, Clone, Default)]
pub struct CreateNode {
    pub node_type: String,
    pub properties: Properties,
    pub embedding: Option<Vec<f32>>,
    pub link_to: Option<String>,
}

/// Options for [`HypergraphStore::create_edge`].
#[derive(Debug, Clone)]
pub struct CreateEdge {
    pub source: String,
    pub target: String,
    pub edge_type: String,
    pub metadata: Value,
}

/// Options for [`HypergraphStore::create_hyperedge`].
#[derive(Debug, Clone)]
pub struct CreateHyperedge {
    pub nodes: Vec<String>,
    pub edge_type: String,
    pub metadata: Value,
}

#[derive(Default)]
pub(crate) struct GraphInner {
    pub(crate) nodes: HashMap<String, Node>,
    pub(crate) edges: HashMap<String, Edge>,
    pub(crate) hyperedges: HashMap<String, Hyperedge>,
    /// `key` property -> node id.
    pub(crate) key_index: HashMap<String, String>,
    /// node id -> incident edge ids, both directions.
    pub(crate) incident_edges: HashMap<String, HashSet<String>>,
    /// node id -> hyperedge ids it participates in.
    pub(crate) node_hyperedges: HashMap<String, HashSet<String>>,
}

impl GraphInner {
    fn insert_node(&mut self, node: Node) -> String {
        if let Some(key) = property_key(&node.properties) {
            self.key_index.insert(key.to_string(), node.id.clone());
        }
        let id = node.id.clone();
        self.incident_edges.entry(id.clone()).or_default();
        self.node_hyperedges.entry(id.clone()).or_default();
        self.nodes.insert(id.clone(), node);
        id
    }

    fn insert_edge(&mut self, edge: Edge) -> String {
        let id = edge.id.clone();
        self.incident_edges
            .entry(edge.source.clone())
            .or_default()
            .insert(id.clone());
        self.incident_edges
            .entry(edge.target.clone())
            .or_default()
            .insert(id.clone());
        self.edges.insert(id.clone(), edge);
        id
    }

    fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        for endpoint in [&edge.source, &edge.target] {
            if let Some(set) = self.incident_edges.get_mut(endpoint) {
                set.remove(id);
            }
        }
        Some(edge)
    }

    fn insert_hyperedge(&mut self, hyperedge: Hyperedge) -> String {
        let id = hyperedge.id.clone();
        for member in &hyperedge.nodes {
            self.node_hyperedges
                .entry(member.clone())
                .or_default()
                .insert(id.clone());
        }
        self.hyperedges.insert(id.clone(), hyperedge);
        id
    }

    /// Most recently created node whose key sits in `namespace`.
    fn latest_in_namespace(&self, namespace: &str) -> Option<String> {
        self.nodes
            .values()
            .filter(|node| {
                property_key(&node.properties)
                    .and_then(key_namespace)
                    .map(|ns| ns == namespace)
                    .unwrap_or(false)
            })
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .map(|node| node.id.clone())
    }

    pub(crate) fn rebuild_indexes(&mut self) {
        self.key_index.clear();
        self.incident_edges.clear();
        self.node_hyperedges.clear();
        let node_ids: Vec<String> = self.nodes.keys().cloned().collect();
        for id in node_ids {
            self.incident_edges.entry(id.clone()).or_default();
            self.node_hyperedges.entry(id.clone()).or_default();
        }
        let keyed: Vec<(String, String)> = self
            .nodes
            .values()
            .filter_map(|n| property_key(&n.properties).map(|k| (k.to_string(), n.id.clone())))
            .collect();
        for (key, id) in keyed {
            self.key_index.insert(key, id);
        }
        let edges: Vec<(String, String, String)> = self
            .edges
            .values()
            .map(|e| (e.id.clone(), e.source.clone(), e.target.clone()))
            .collect();
        for (id, source, target) in edges {
            self.incident_edges.entry(source).or_default().insert(id.clone());
            self.incident_edges.entry(target).or_default().insert(id);
        }
        let memberships: Vec<(String, Vec<String>)> = self
            .hyperedges
            .values()
            .map(|h| (h.id.clone(), h.nodes.clone()))
            .collect();
        for (id, members) in memberships {
            for member in members {
                self.node_hyperedges.entry(member).or_default().insert(id.clone());
            }
        }
    }
}

struct GraphMetrics {
    operations: Option<agentdb_observability::CounterVec>,
    latency: Option<agentdb_observability::HistogramVec>,
    nodes: Option<agentdb_observability::Gauge>,
    edges: Option<agentdb_observability::Gauge>,
    hyperedges: Option<agentdb_observability::Gauge>,
}

impl GraphMetrics {
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
                    "agentdb_graphdb_operations_total",
                    "Hypergraph store operations",
                    &["operation"],
                )
                .ok(),
            latency: registry
                .histogram(
                    "agentdb_graphdb_latency_ms",
                    "Hypergraph operation latency in milliseconds",
                    &["operation"],
                    None,
                )
                .ok(),
            nodes: gauge("agentdb_graphdb_nodes", "Nodes in the graph"),
            edges: gauge("agentdb_graphdb_edges", "Binary edges in the graph"),
            hyperedges: gauge("agentdb_graphdb_hyperedges", "Hyperedges in the graph"),
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

    fn set_sizes(&self, nodes: usize, edges: usize, hyperedges: usize) {
        if let Some(g) = &self.nodes {
            g.set(nodes as f64);
        }
        if let Some(g) = &self.edges {
            g.set(edges as f64);
        }
        if let Some(g) = &self.hyperedges {
            g.set(hyperedges as f64);
        }
    }
}

/// The hypergraph DB: nodes, binary edges and hyperedges with orphan
/// prevention, traversal, integrity reporting and JSON persistence.
pub struct HypergraphStore {
    name: String,
    dimension: usize,
    path: PathBuf,
    retry: RetryPolicy,
    inner: RwLock<GraphInner>,
    bus: EventBus,
    metrics: GraphMetrics,
}

impl HypergraphStore {
    /// A named graph persisted at `<base_dir>/graphs/<name>.json`.
    pub fn new(
        name: impl Into<String>,
        config: &AgentDbConfig,
        bus: EventBus,
        registry: &MetricsRegistry,
    ) -> Self {
        let name = name.into();
        let path = config.storage.graphs_dir().join(format!("{name}.json"));
        Self {
            name,
            dimension: config.vector.dimension,
            path,
            retry: config.retry.clone(),
            inner: RwLock::new(GraphInner::default()),
            bus,
            metrics: GraphMetrics::register(registry),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn read_inner(&self) -> AgentDbResult<RwLockReadGuard<'_, GraphInner>> {
        self.inner
            .read()
            .map_err(|_| StorageError::LockPoisoned { component: COMPONENT }.into())
    }

    fn write_inner(&self) -> AgentDbResult<RwLockWriteGuard<'_, GraphInner>> {
        self.inner
            .write()
            .map_err(|_| StorageError::LockPoisoned { component: COMPONENT }.into())
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

    fn publish_sizes(&self, inner: &GraphInner) {
        self.metrics
            .set_sizes(inner.nodes.len(), inner.edges.len(), inner.hyperedges.len());
    }

    /// Creates a node, upserting on a matching `key` and enforcing
    /// orphan prevention otherwise. Returns the node id (the existing one
    /// on upsert).
    pub fn create_node(&self, options: CreateNode) -> AgentDbResult<String> {
        let started = Instant::now();

        let embedding = match options.embedding {
            Some(raw) => {
                assert_dimensions(&raw, self.dimension, "graphdb.create_node")?;
                Some(Embedding::new(raw)?)
            }
            None => None,
        };

        let mut inner = self.write_inner()?;

        // Key upsert: merge properties, refresh the embedding, keep the id.
        if let Some(key) = property_key(&options.properties) {
            if let Some(existing_id) = inner.key_index.get(key).cloned() {
                if let Some(node) = inner.nodes.get_mut(&existing_id) {
                    merge_properties(&mut node.properties, &options.properties);
                    if let Some(embedding) = embedding {
                        node.embedding = Some(embedding);
                    }
                    node.updated_at = now_ms();
                }
                drop(inner);
                self.finish("upsert_node", started);
                return Ok(existing_id);
            }
        }

        let node = Node::new(options.node_type, options.properties, embedding);
        let node_id = node.id.clone();

        if inner.nodes.is_empty() {
            inner.insert_node(node);
        } else if let Some(target) = options.link_to {
            if !inner.nodes.contains_key(&target) {
                return Err(GraphError::NodeNotFound { id: target }.into());
            }
            inner.insert_node(node);
            inner.insert_edge(Edge::new(&node_id, &target, LINKED_TO, Value::Null));
        } else {
            let node_key = property_key(&node.properties).map(str::to_string);
            let namespace = node_key
                .as_deref()
                .and_then(key_namespace)
                .map(str::to_string);

            // Keys in a non-root namespace cannot auto-link; keyless and
            // slashless keys fall through to the graph root.
            if let Some(ns) = &namespace {
                if !ROOT_NAMESPACES.contains(&ns.as_str()) {
                    return Err(GraphError::OrphanNode { key: node_key }.into());
                }
            }
            let same_namespace = namespace
                .as_deref()
                .and_then(|ns| inner.latest_in_namespace(ns));
            let target = match same_namespace {
                Some(target) => target,
                None => ensure_root(&mut inner),
            };
            inner.insert_node(node);
            inner.insert_edge(Edge::new(&node_id, &target, LINKED_TO, Value::Null));
        }

        self.publish_sizes(&inner);
        drop(inner);
        self.finish("create_node", started);
        Ok(node_id)
    }

    /// Returns a copy of the node.
    pub fn get_node(&self, id: &str) -> AgentDbResult<Node> {
        let inner = self.read_inner()?;
        inner
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() }.into())
    }

    /// Shallow-merges `props` into the node's property bag.
    pub fn update_node(&self, id: &str, props: &Properties) -> AgentDbResult<()> {
        let started = Instant::now();
        let mut inner = self.write_inner()?;
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;

        let old_key = property_key(&node.properties).map(str::to_string);
        merge_properties(&mut node.properties, props);
        node.updated_at = now_ms();
        let new_key = property_key(&node.properties).map(str::to_string);

        if old_key != new_key {
            if let Some(old) = old_key {
                inner.key_index.remove(&old);
            }
            if let Some(new) = new_key {
                inner.key_index.insert(new, id.to_string());
            }
        }
        drop(inner);
        self.finish("update_node", started);
        Ok(())
    }

    /// Validates and replaces the node's embedding.
    pub fn update_embedding(&self, id: &str, vector: &[f32]) -> AgentDbResult<()> {
        assert_dimensions(vector, self.dimension, "graphdb.update_embedding")?;
        let embedding = Embedding::new(vector.to_vec())?;
        let mut inner = self.write_inner()?;
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;
        node.embedding = Some(embedding);
        node.updated_at = now_ms();
        Ok(())
    }

    /// Creates a directed edge; both endpoints must already exist.
    pub fn create_edge(&self, options: CreateEdge) -> AgentDbResult<String> {
        let started = Instant::now();
        let mut inner = self.write_inner()?;
        for endpoint in [&options.source, &options.target] {
            if !inner.nodes.contains_key(endpoint) {
                return Err(GraphError::NodeNotFound {
                    id: endpoint.clone(),
                }
                .into());
            }
        }
        let id = inner.insert_edge(Edge::new(
            options.source,
            options.target,
            options.edge_type,
            options.metadata,
        ));
        self.publish_sizes(&inner);
        drop(inner);
        self.finish("create_edge", started);
        Ok(id)
    }

    pub fn delete_edge(&self, id: &str) -> AgentDbResult<()> {
        let started = Instant::now();
        let mut inner = self.write_inner()?;
        inner
            .remove_edge(id)
            .ok_or_else(|| GraphError::EdgeNotFound { id: id.to_string() })?;
        self.publish_sizes(&inner);
        drop(inner);
        self.finish("delete_edge", started);
        Ok(())
    }

    /// Incident edges of a node, filtered by direction.
    pub fn get_edges(
        &self,
        node_id: &str,
        direction: EdgeDirection,
    ) -> AgentDbResult<QueryOutput<Edge>> {
        let started = Instant::now();
        let inner = self.read_inner()?;
        if !inner.nodes.contains_key(node_id) {
            return Err(GraphError::NodeNotFound {
                id: node_id.to_string(),
            }
            .into());
        }
        let mut data: Vec<Edge> = inner
            .incident_edges
            .get(node_id)
            .map(|edge_ids| {
                edge_ids
                    .iter()
                    .filter_map(|id| inner.edges.get(id))
                    .filter(|edge| match direction {
                        EdgeDirection::Outgoing => edge.source == node_id,
                        EdgeDirection::Incoming => edge.target == node_id,
                        EdgeDirection::Both => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        data.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        drop(inner);

        let elapsed = started.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.record("get_edges", elapsed);
        Ok(QueryOutput::new(data, elapsed))
    }

    /// Creates an n-ary hyperedge over at least three existing nodes.
    pub fn create_hyperedge(&self, options: CreateHyperedge) -> AgentDbResult<String> {
        self.create_hyperedge_inner(options, None)
    }

    /// A hyperedge that expires. `is_expired` is derived on every read.
    pub fn create_temporal_hyperedge(
        &self,
        options: CreateHyperedge,
        expires_at: i64,
        granularity: TemporalGranularity,
    ) -> AgentDbResult<String> {
        self.create_hyperedge_inner(
            options,
            Some(TemporalBounds {
                expires_at,
                granularity,
            }),
        )
    }

    fn create_hyperedge_inner(
        &self,
        options: CreateHyperedge,
        temporal: Option<TemporalBounds>,
    ) -> AgentDbResult<String> {
        let started = Instant::now();
        if options.nodes.len() < MIN_HYPEREDGE_NODES {
            return Err(GraphError::InvalidHyperedge {
                count: options.nodes.len(),
            }
            .into());
        }
        let mut inner = self.write_inner()?;
        for member in &options.nodes {
            if !inner.nodes.contains_key(member) {
                return Err(GraphError::NodeNotFound { id: member.clone() }.into());
            }
        }
        let mut hyperedge = Hyperedge::new(options.nodes, options.edge_type, options.metadata);
        hyperedge.temporal = temporal;
        let id = inner.insert_hyperedge(hyperedge);
        self.publish_sizes(&inner);
        drop(inner);
        self.finish("create_hyperedge", started);
        Ok(id)
    }

    pub fn get_hyperedge(&self, id: &str) -> AgentDbResult<HyperedgeRecord> {
        let inner = self.read_inner()?;
        inner
            .hyperedges
            .get(id)
            .cloned()
            .map(|h| HyperedgeRecord::at(h, now_ms()))
            .ok_or_else(|| {
                GraphError::HyperedgeNotFound { id: id.to_string() }.into()
            })
    }

    pub fn get_all_hyperedges(&self) -> AgentDbResult<Vec<HyperedgeRecord>> {
        let inner = self.read_inner()?;
        let now = now_ms();
        let mut records: Vec<HyperedgeRecord> = inner
            .hyperedges
            .values()
            .cloned()
            .map(|h| HyperedgeRecord::at(h, now))
            .collect();
        records.sort_by(|a, b| {
            a.hyperedge
                .created_at
                .cmp(&b.hyperedge.created_at)
                .then(a.hyperedge.id.cmp(&b.hyperedge.id))
        });
        Ok(records)
    }

    pub fn get_hyperedges_by_node(&self, node_id: &str) -> AgentDbResult<Vec<HyperedgeRecord>> {
        let inner = self.read_inner()?;
        let now = now_ms();
        let mut records: Vec<HyperedgeRecord> = inner
            .node_hyperedges
            .get(node_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.hyperedges.get(id))
                    .cloned()
                    .map(|h| HyperedgeRecord::at(h, now))
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| a.hyperedge.id.cmp(&b.hyperedge.id));
        Ok(records)
    }

    /// Deletes a node and cascades over every incident edge.
    pub fn delete_node(&self, id: &str) -> AgentDbResult<()> {
        let started = Instant::now();
        let mut inner = self.write_inner()?;
        let node = inner
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound { id: id.to_string() })?;

        if let Some(key) = property_key(&node.properties) {
            inner.key_index.remove(key);
        }
        let incident: Vec<String> = inner
            .incident_edges
            .remove(id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for edge_id in incident {
            inner.remove_edge(&edge_id);
        }
        inner.node_hyperedges.remove(id);

        self.publish_sizes(&inner);
        drop(inner);
        self.finish("delete_node", started);
        Ok(())
    }

    /// Filtered node listing with limit/offset paging.
    pub fn query_nodes(&self, filter: &NodeFilter) -> AgentDbResult<QueryOutput<Node>> {
        let started = Instant::now();
        let pattern = filter
            .key_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| AgentDbError::Config {
                message: format!("invalid key_pattern: {e}"),
            })?;

        let inner = self.read_inner()?;
        let mut matched: Vec<Node> = inner
            .nodes
            .values()
            .filter(|node| {
                let key = property_key(&node.properties);
                if let Some(ns) = &filter.namespace {
                    if key.and_then(key_namespace) != Some(ns.as_str()) {
                        return false;
                    }
                }
                if let Some(regex) = &pattern {
                    match key {
                        Some(k) if regex.is_match(k) => {}
                        _ => return false,
                    }
                }
                if let Some(after) = filter.created_after {
                    if node.created_at <= after {
                        return false;
                    }
                }
                if let Some(before) = filter.created_before {
                    if node.created_at >= before {
                        return false;
                    }
                }
                if let Some(has) = filter.has_embedding {
                    if node.embedding.is_some() != has {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        drop(inner);

        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let offset = filter.offset.unwrap_or(0).min(matched.len());
        let mut data = matched.split_off(offset);
        if let Some(limit) = filter.limit {
            data.truncate(limit);
        }

        let elapsed = started.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.record("query_nodes", elapsed);
        Ok(QueryOutput::new(data, elapsed))
    }

    /// BFS over edges (both directions) and hyperedge co-membership.
    /// Depth 0 returns just the start node.
    pub fn traverse_hops(
        &self,
        start: &str,
        hops: usize,
        cancel: Option<&CancellationToken>,
    ) -> AgentDbResult<TraversalOutput> {
        let started = Instant::now();
        self.emit("traverse", EventStatus::Started, None);
        let inner = self.read_inner()?;
        if !inner.nodes.contains_key(start) {
            self.emit("traverse", EventStatus::Failed, None);
            return Err(GraphError::NodeNotFound {
                id: start.to_string(),
            }
            .into());
        }
        let (data, cancelled) = bfs_hops(&inner, start, hops, cancel);
        drop(inner);

        let elapsed = started.elapsed().as_secs_f64() * 1_000.0;
        self.metrics.record("traverse", elapsed);
        self.emit("traverse", EventStatus::Completed, Some(elapsed));
        Ok(TraversalOutput {
            count: data.len(),
            data,
            execution_time_ms: elapsed,
            cancelled,
        })
    }

    /// Snapshot read of the graph invariants.
    pub fn validate_integrity(&self) -> AgentDbResult<IntegrityReport> {
        let started = Instant::now();
        let inner = self.read_inner()?;
        let report = build_report(&inner, self.dimension, now_ms());
        drop(inner);
        self.finish("validate_integrity", started);
        Ok(report)
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().ok().map_or(0, |i| i.nodes.len())
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().ok().map_or(0, |i| i.edges.len())
    }

    pub fn hyperedge_count(&self) -> usize {
        self.inner.read().ok().map_or(0, |i| i.hyperedges.len())
    }

    /// Persists the graph document, atomically and with retry.
    pub async fn save(&self) -> AgentDbResult<()> {
        let started = Instant::now();
        let document = {
            let inner = self.read_inner()?;
            GraphDocument {
                version: GRAPH_DOCUMENT_VERSION,
                saved_at: now_ms(),
                nodes: inner.nodes.values().cloned().collect(),
                edges: inner.edges.values().cloned().collect(),
                hyperedges: inner.hyperedges.values().cloned().collect(),
            }
        };
        let path = self.path.clone();
        with_retry("graphdb.save", &self.retry, || {
            let document = document.clone();
            let path = path.clone();
            async move {
                write_graph(&path, &document)?;
                Ok(())
            }
        })
        .await?;
        debug!(graph = %self.name, path = %self.path.display(), "graph saved");
        self.finish("save", started);
        Ok(())
    }

    /// Loads the graph document, replacing in-memory state. Returns
    /// `false` when no file exists yet.
    pub async fn load(&self) -> AgentDbResult<bool> {
        let started = Instant::now();
        let Some(document) = read_graph(&self.path)? else {
            return Ok(false);
        };
        let mut fresh = GraphInner {
            nodes: document.nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            edges: document.edges.into_iter().map(|e| (e.id.clone(), e)).collect(),
            hyperedges: document
                .hyperedges
                .into_iter()
                .map(|h| (h.id.clone(), h))
                .collect(),
            ..GraphInner::default()
        };
        fresh.rebuild_indexes();
        {
            let mut inner = self.write_inner()?;
            *inner = fresh;
            self.publish_sizes(&inner);
        }
        debug!(graph = %self.name, "graph loaded");
        self.finish("load", started);
        Ok(true)
    }
}

/// Finds or creates the synthetic root node that absorbs root-namespace
/// nodes created without a parent.
fn ensure_root(inner: &mut GraphInner) -> String {
    if let Some(id) = inner.key_index.get(GRAPH_ROOT_KEY) {
        return id.clone();
    }
    let mut properties = Properties::new();
    properties.insert(KEY_PROPERTY.to_string(), Value::String(GRAPH_ROOT_KEY.into()));
    inner.insert_node(Node::new("system", properties, None))
}
