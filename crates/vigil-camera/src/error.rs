//! Error type for camera workers and frame sources.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CameraError>;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("frame source disconnected: {0}")]
    SourceDisconnected(String),

    #[error("connect attempt failed: {0}")]
    ConnectFailed(String),

    #[error("vision error: {0}")]
    Vision(#[from] vigil_vision::VisionError),

    #[error("store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
