//! # agentdb-core
//!
//! Core layer of the AgentDB memory engine: the vector validation kernel,
//! the error taxonomy, domain models shared by the graph and episode
//! stores, engine configuration, and the retry helper every
//! durability-touching path goes through.

pub mod config;
pub mod errors;
pub mod models;
pub mod retry;
pub mod time;
pub mod validation;

pub use config::AgentDbConfig;
pub use errors::{AgentDbError, AgentDbResult};
pub use retry::{with_retry, RetryPolicy};
pub use validation::{Embedding, EMBEDDING_DIMENSION, NORM_TOLERANCE};

pub use tokio_util::sync::CancellationToken;
