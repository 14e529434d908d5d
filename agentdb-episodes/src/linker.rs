//! In-memory link graph over episodes.
//!
//! Mirrors the authoritative `episode_links` rows as outgoing/incoming
//! adjacency maps. One link per `(source, target)` pair; sequence links
//! must keep their subgraph acyclic, checked by a DFS from the proposed
//! target before anything is written.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use agentdb_core::errors::EpisodeError;
use agentdb_core::models::{EpisodeLink, LinkType, MAX_EPISODE_LINKS};

/// Aggregate link statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStats {
    pub total_links: usize,
    pub episodes_with_links: usize,
    pub avg_links_per_episode: f64,
}

#[derive(Default)]
struct LinkMaps {
    outgoing: HashMap<String, Vec<EpisodeLink>>,
    incoming: HashMap<String, Vec<EpisodeLink>>,
}

impl LinkMaps {
    /// DFS over outgoing sequence edges: can `from` reach `to`?
    fn sequence_reaches(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(links) = self.outgoing.get(current) {
                for link in links {
                    if link.link_type == LinkType::Sequence {
                        stack.push(&link.target_id);
                    }
                }
            }
        }
        false
    }

    fn remove_pair(&mut self, source: &str, target: &str) -> bool {
        let mut removed = false;
        if let Some(links) = self.outgoing.get_mut(source) {
            let before = links.len();
            links.retain(|l| l.target_id != target);
            removed = links.len() != before;
            if links.is_empty() {
                self.outgoing.remove(source);
            }
        }
        if let Some(links) = self.incoming.get_mut(target) {
            links.retain(|l| l.source_id != source);
            if links.is_empty() {
                self.incoming.remove(target);
            }
        }
        removed
    }
}

/// The adjacency half of the episode link graph. The store persists the
/// rows; this answers the structural questions.
#[derive(Default)]
pub struct EpisodeLinker {
    maps: RwLock<LinkMaps>,
}

impl EpisodeLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural admission checks for a proposed link. Endpoint
    /// existence is the store's job; this enforces self-links, the
    /// outgoing cap, and sequence acyclicity.
    pub fn validate(
        &self,
        source: &str,
        target: &str,
        link_type: LinkType,
    ) -> Result<(), EpisodeError> {
        if source == target {
            return Err(EpisodeError::SelfLink {
                id: source.to_string(),
            });
        }
        let maps = match self.maps.read() {
            Ok(maps) => maps,
            Err(_) => return Ok(()),
        };
        let outgoing = maps.outgoing.get(source).map(Vec::len).unwrap_or(0);
        // Replacing an existing pair does not grow the fan-out.
        let replaces = maps
            .outgoing
            .get(source)
            .map(|links| links.iter().any(|l| l.target_id == target))
            .unwrap_or(false);
        if !replaces && outgoing >= MAX_EPISODE_LINKS {
            return Err(EpisodeError::TooManyLinks {
                id: source.to_string(),
                count: outgoing,
                limit: MAX_EPISODE_LINKS,
            });
        }
        if link_type == LinkType::Sequence && maps.sequence_reaches(target, source) {
            return Err(EpisodeError::SequenceCycle {
                from_id: source.to_string(),
                target: target.to_string(),
            });
        }
        Ok(())
    }

    /// Records a link, replacing any previous link for the same pair.
    pub fn add(&self, link: EpisodeLink) {
        if let Ok(mut maps) = self.maps.write() {
            maps.remove_pair(&link.source_id, &link.target_id);
            maps.incoming
                .entry(link.target_id.clone())
                .or_default()
                .push(link.clone());
            maps.outgoing
                .entry(link.source_id.clone())
                .or_default()
                .push(link);
        }
    }

    /// Removes the link for a pair. Returns whether it existed.
    pub fn remove(&self, source: &str, target: &str) -> bool {
        self.maps
            .write()
            .map(|mut maps| maps.remove_pair(source, target))
            .unwrap_or(false)
    }

    /// Drops every link touching `id`; used when an episode is deleted.
    pub fn remove_all(&self, id: &str) {
        if let Ok(mut maps) = self.maps.write() {
            let out: Vec<String> = maps
                .outgoing
                .get(id)
                .map(|links| links.iter().map(|l| l.target_id.clone()).collect())
                .unwrap_or_default();
            for target in out {
                maps.remove_pair(id, &target);
            }
            let inc: Vec<String> = maps
                .incoming
                .get(id)
                .map(|links| links.iter().map(|l| l.source_id.clone()).collect())
                .unwrap_or_default();
            for source in inc {
                maps.remove_pair(&source, id);
            }
        }
    }

    pub fn outgoing(&self, id: &str, link_type: Option<LinkType>) -> Vec<EpisodeLink> {
        self.maps
            .read()
            .map(|maps| {
                maps.outgoing
                    .get(id)
                    .map(|links| {
                        links
                            .iter()
                            .filter(|l| link_type.map(|t| l.link_type == t).unwrap_or(true))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn incoming(&self, id: &str, link_type: Option<LinkType>) -> Vec<EpisodeLink> {
        self.maps
            .read()
            .map(|maps| {
                maps.incoming
                    .get(id)
                    .map(|links| {
                        links
                            .iter()
                            .filter(|l| link_type.map(|t| l.link_type == t).unwrap_or(true))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Neighbouring episode ids, outgoing, incoming, or both.
    pub fn linked_episodes(&self, id: &str, direction: agentdb_core::models::EdgeDirection) -> Vec<String> {
        use agentdb_core::models::EdgeDirection;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        if matches!(direction, EdgeDirection::Outgoing | EdgeDirection::Both) {
            for link in self.outgoing(id, None) {
                if seen.insert(link.target_id.clone()) {
                    out.push(link.target_id);
                }
            }
        }
        if matches!(direction, EdgeDirection::Incoming | EdgeDirection::Both) {
            for link in self.incoming(id, None) {
                if seen.insert(link.source_id.clone()) {
                    out.push(link.source_id);
                }
            }
        }
        out
    }

    pub fn stats(&self) -> LinkStats {
        self.maps
            .read()
            .map(|maps| {
                let total_links: usize = maps.outgoing.values().map(Vec::len).sum();
                let mut with_links: HashSet<&String> = HashSet::new();
                for (source, links) in &maps.outgoing {
                    if !links.is_empty() {
                        with_links.insert(source);
                    }
                }
                for (target, links) in &maps.incoming {
                    if !links.is_empty() {
                        with_links.insert(target);
                    }
                }
                let episodes_with_links = with_links.len();
                let avg_links_per_episode = if episodes_with_links == 0 {
                    0.0
                } else {
                    total_links as f64 / episodes_with_links as f64
                };
                LinkStats {
                    total_links,
                    episodes_with_links,
                    avg_links_per_episode,
                }
            })
            .unwrap_or(LinkStats {
                total_links: 0,
                episodes_with_links: 0,
                avg_links_per_episode: 0.0,
            })
    }

    pub fn clear(&self) {
        if let Ok(mut maps) = self.maps.write() {
            maps.outgoing.clear();
            maps.incoming.clear();
        }
    }
}
