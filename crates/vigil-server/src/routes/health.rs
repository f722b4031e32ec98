//! Liveness/readiness endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_cameras: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_cameras = state.workers.lock().await.len();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_cameras,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
