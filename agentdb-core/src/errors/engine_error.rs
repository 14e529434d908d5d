use super::{EpisodeError, GraphError, StorageError, ValidationError};

/// Top-level error type for the AgentDB memory engine.
/// All subsystem errors convert into this via `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum AgentDbError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("episode error: {0}")]
    Episode(#[from] EpisodeError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<AgentDbError>,
    },

    #[error("operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("config error: {message}")]
    Config { message: String },
}

/// Convenience type alias.
pub type AgentDbResult<T> = Result<T, AgentDbError>;

impl AgentDbError {
    /// True for failures worth retrying: storage-level faults that may be
    /// transient. Validation and structural errors never are.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentDbError::Storage(StorageError::Io(_)) | AgentDbError::Storage(StorageError::Sqlite { .. })
        )
    }
}

impl From<serde_json::Error> for AgentDbError {
    fn from(err: serde_json::Error) -> Self {
        AgentDbError::Storage(StorageError::Serialization(err))
    }
}

impl From<std::io::Error> for AgentDbError {
    fn from(err: std::io::Error) -> Self {
        AgentDbError::Storage(StorageError::Io(err))
    }
}
