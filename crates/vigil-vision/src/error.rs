//! Error type for the embedding/enrollment/recognition/attendance crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisionError>;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("person not found: {0}")]
    PersonNotFound(i64),

    #[error("too many images for one enrollment call: {count} exceeds limit {limit}")]
    TooManyImages { count: usize, limit: usize },

    #[error("index error: {0}")]
    Index(#[from] vigil_index::IndexError),

    #[error("store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}
