//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Server error type. Every internal crate's error bridges into this one
/// at the HTTP edge so handlers can use `?` and still produce a sensible
/// status code.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] vigil_store::StoreError),

    #[error("vision error: {0}")]
    Vision(#[from] vigil_vision::VisionError),

    #[error("index error: {0}")]
    Index(#[from] vigil_index::IndexError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<vigil_camera::CameraError> for ServerError {
    fn from(e: vigil_camera::CameraError) -> Self {
        ServerError::Internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ServerError::Storage(vigil_store::StoreError::PersonNotFound(_))
            | ServerError::Storage(vigil_store::StoreError::RoomNotFound(_))
            | ServerError::Storage(vigil_store::StoreError::CameraNotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ServerError::Storage(vigil_store::StoreError::DuplicateExternalId(_))
            | ServerError::Storage(vigil_store::StoreError::DuplicateAttendance { .. }) => {
                (StatusCode::CONFLICT, "conflict")
            }
            ServerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ServerError::Vision(vigil_vision::VisionError::PersonNotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ServerError::Vision(vigil_vision::VisionError::TooManyImages { .. }) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            ServerError::Vision(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vision_error"),
            ServerError::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_error"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = self.to_string();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(status = %status, code, error = %message, "server error")
            }
            _ => tracing::warn!(status = %status, code, error = %message, "client error"),
        }

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}
