//! Episode store and linker errors.

/// Violations of the episode metadata, time and link rules, plus lookup
/// misses. All validation variants correspond to the engine's
/// episode-validation failure kind and are raised before any write.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EpisodeError {
    #[error("episode not found: {id}")]
    NotFound { id: String },

    #[error("missing required metadata field: {field}")]
    MissingMetadata { field: String },

    #[error("serialised metadata is {size} bytes, limit is {limit}")]
    MetadataTooLarge { size: usize, limit: usize },

    #[error("end_time {end} precedes start_time {start}")]
    InvalidTimeRange { start: i64, end: i64 },

    #[error("episode {id} has {count} links, limit is {limit}")]
    TooManyLinks {
        id: String,
        count: usize,
        limit: usize,
    },

    #[error("episode cannot link to itself: {id}")]
    SelfLink { id: String },

    #[error("sequence link {from_id} -> {target} would close a cycle")]
    SequenceCycle { from_id: String, target: String },

    #[error("invalid episode: {reason}")]
    Validation { reason: String },
}
