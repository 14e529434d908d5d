//! Vector contract violations. These are programming errors at the caller
//! and are never retried or silently recovered.

/// Raised by the validation kernel when an embedding breaks the
/// 1536-dimensional, finite, L2-normalised contract.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    #[error("vector not L2-normalised in {context}: norm {norm}")]
    NotNormalised { norm: f64, context: String },

    #[error("non-finite value {value} at position {index} in {context}")]
    InvalidValue {
        index: usize,
        value: f32,
        context: String,
    },

    #[error("cannot normalise a zero vector in {context}")]
    ZeroVector { context: String },
}
