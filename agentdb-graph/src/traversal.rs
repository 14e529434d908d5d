//! Breadth-first hop traversal over binary edges and hyperedge
//! co-membership.

use std::collections::{HashSet, VecDeque};

use agentdb_core::CancellationToken;

use crate::store::GraphInner;

/// BFS from `start`, following binary edges in both directions and
/// hyperedge co-membership, up to `hops` levels. Depth 0 is just the
/// start node. Returns the visit order and whether the token fired
/// mid-walk (partial result, no state left behind).
pub(crate) fn bfs_hops(
    inner: &GraphInner,
    start: &str,
    hops: usize,
    cancel: Option<&CancellationToken>,
) -> (Vec<String>, bool) {
    let mut visited: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();

    visited.insert(start.to_string());
    queue.push_back((start.to_string(), 0));

    while let Some((node_id, depth)) = queue.pop_front() {
        if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
            return (order, true);
        }
        order.push(node_id.clone());
        if depth >= hops {
            continue;
        }
        for neighbour in neighbours(inner, &node_id) {
            if visited.insert(neighbour.clone()) {
                queue.push_back((neighbour, depth + 1));
            }
        }
    }
    (order, false)
}

/// Neighbours of a node: endpoints across incident edges plus every
/// co-member of its hyperedges. Order is deterministic.
fn neighbours(inner: &GraphInner, node_id: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    if let Some(edge_ids) = inner.incident_edges.get(node_id) {
        let mut edge_ids: Vec<&String> = edge_ids.iter().collect();
        edge_ids.sort();
        for edge_id in edge_ids {
            if let Some(edge) = inner.edges.get(edge_id) {
                let other = if edge.source == node_id {
                    &edge.target
                } else {
                    &edge.source
                };
                if other != node_id && seen.insert(other) {
                    out.push(other.clone());
                }
            }
        }
    }

    if let Some(hyperedge_ids) = inner.node_hyperedges.get(node_id) {
        let mut hyperedge_ids: Vec<&String> = hyperedge_ids.iter().collect();
        hyperedge_ids.sort();
        for hyperedge_id in hyperedge_ids {
            if let Some(hyperedge) = inner.hyperedges.get(hyperedge_id) {
                for member in &hyperedge.nodes {
                    if member != node_id && seen.insert(member) {
                        out.push(member.clone());
                    }
                }
            }
        }
    }

    out
}
