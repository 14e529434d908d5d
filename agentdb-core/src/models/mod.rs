pub mod episode;
pub mod graph;
pub mod property;

pub use episode::{Episode, EpisodeLink, EpisodeMetadata, EpisodeOutcome, LinkType};
pub use graph::{Edge, EdgeDirection, Hyperedge, Node, TemporalBounds, TemporalGranularity};
pub use graph::MIN_HYPEREDGE_NODES;
pub use episode::{MAX_EPISODE_LINKS, MAX_METADATA_BYTES};
pub use property::{
    key_namespace, merge_properties, property_key, property_vector_id, Properties,
    GRAPH_ROOT_KEY, KEY_PROPERTY, NAMESPACE_PROPERTY, ROOT_NAMESPACES, VECTOR_ID_PROPERTY,
};
