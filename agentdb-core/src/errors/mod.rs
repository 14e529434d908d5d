pub mod engine_error;
pub mod episode_error;
pub mod graph_error;
pub mod storage_error;
pub mod validation_error;

pub use engine_error::{AgentDbError, AgentDbResult};
pub use episode_error::EpisodeError;
pub use graph_error::GraphError;
pub use storage_error::StorageError;
pub use validation_error::ValidationError;
