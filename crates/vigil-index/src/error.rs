//! Error type for the similarity index.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("corrupt index on disk: {0}")]
    CorruptIndex(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
