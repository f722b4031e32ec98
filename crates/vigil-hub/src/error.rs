//! Error type for the subscription hub. Publish never fails (a full
//! queue drops the oldest message instead), so this currently only
//! covers malformed construction.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("queue capacity must be >= 1")]
    InvalidCapacity,
}
