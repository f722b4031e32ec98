//! Shared error type for cross-crate domain failures.

use thiserror::Error;

/// Result type alias using the shared domain error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can cross a component boundary without being specific to
/// any one crate's storage or transport details.
#[derive(Debug, Error)]
pub enum Error {
    #[error("person not found: {0}")]
    PersonNotFound(String),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("camera not found: {0}")]
    CameraNotFound(String),

    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}
