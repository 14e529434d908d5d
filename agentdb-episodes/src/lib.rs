//! # agentdb-episodes
//!
//! The temporal episode store: a hybrid of relational metadata rows
//! (SQLite in WAL mode), a vector index over episode embeddings, the
//! B+ tree time index, and a typed link graph with DAG enforcement on
//! sequence links. Multi-write operations run inside transactions and
//! every durable write goes through the shared retry helper.

pub mod context;
pub mod linker;
pub mod lock;
mod schema;
pub mod store;

pub use context::{EpisodeContext, ScoredEpisode};
pub use linker::{EpisodeLinker, LinkStats};
pub use lock::DirectoryLock;
pub use store::{
    CreateEpisode, EpisodeStore, SimilaritySearch, TimeRangeQuery, UpdateEpisode,
};
