//! HTTP API and WebSocket server for Vigil: wires C2-C9 behind the
//! service's external interface.

mod aggregator;
mod camera_source;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{Result, ServerError};
pub use state::AppState;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vigil_config::VigilConfig;
use vigil_hub::Hub;
use vigil_index::SimilarityIndex;
use vigil_presence::PresenceTracker;
use vigil_store::Store;
use vigil_vision::{AttendanceGate, EnrollmentCoordinator, MockFaceDetector, RecognitionEngine};

/// Build application state from a loaded config: open the store, load
/// the similarity index, and construct every C4-C9 component threaded
/// through to the routes.
pub fn build_state(config: VigilConfig) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(&config.persistence.image_root)?;
    std::fs::create_dir_all(&config.persistence.snapshot_root)?;

    let store = Arc::new(Store::open(Path::new(&config.persistence.database_path))?);
    let index = Arc::new(SimilarityIndex::new(
        config.persistence.index_vector_path.clone(),
        config.persistence.index_slot_map_path.clone(),
    ));
    match index.load() {
        Ok(()) => tracing::info!(slots = index.size(), "loaded similarity index from disk"),
        Err(e) => tracing::warn!(error = %e, "no similarity index on disk yet, starting empty"),
    }
    for (embedding, vector) in store.all_reference_embeddings()? {
        let _ = index.add(embedding.person_id, &vector);
    }

    let detector: vigil_vision::SharedFaceDetector = Arc::new(MockFaceDetector::new());
    let timezone = config.timezone()?;

    let enrollment = Arc::new(EnrollmentCoordinator::new(
        store.clone(),
        index.clone(),
        detector.clone(),
        config.persistence.image_root.clone(),
        config.enrollment.q_min,
        config.enrollment.a_min,
        config.enrollment.max_images_per_person,
        std::time::Duration::from_millis(config.enrollment.image_processing_timeout_ms),
    ));
    let recognition = Arc::new(RecognitionEngine::new(
        detector,
        index.clone(),
        config.recognition.q_min_recognize,
        config.recognition.confidence_threshold,
    ));
    let attendance = Arc::new(AttendanceGate::new(store.clone(), timezone, config.attendance.attendance_min));
    let presence = Arc::new(PresenceTracker::new(config.presence.ttl()));
    let hub = Hub::new(config.hub.subscriber_queue);
    let tuning = AppState::tuning_from_config(&config);

    Ok(AppState {
        config: Arc::new(config),
        store,
        index,
        enrollment,
        recognition,
        attendance,
        presence,
        hub,
        tuning,
        workers: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
    })
}

/// Start the presence eviction loop and the `rooms:all` aggregator.
/// Returns the cancellation token controlling both.
pub fn spawn_background_tasks(state: &AppState) -> CancellationToken {
    let cancel = CancellationToken::new();

    let hub = state.hub.clone();
    vigil_presence::spawn_eviction_loop(
        state.presence.clone(),
        state.config.presence.eviction_period(),
        cancel.clone(),
        move |delta| {
            if let Ok(json) = serde_json::to_value(&delta) {
                hub.publish(&vigil_hub::room_topic(delta.room_id), vigil_hub::Payload::Event(json));
            }
        },
    );

    aggregator::spawn(
        state.hub.clone(),
        state.store.clone(),
        state.config.presence.refresh_period(),
        cancel.clone(),
    );

    cancel
}

/// Assemble the full router: routes, tracing, and CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::students::router())
        .merge(routes::attendance::router())
        .merge(routes::rooms::router())
        .merge(routes::ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `router` on `addr` until the process receives Ctrl-C.
pub async fn serve(router: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "vigil-server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_config(temp_dir: &tempfile::TempDir) -> VigilConfig {
        let mut config = VigilConfig::default();
        config.persistence.database_path = temp_dir.path().join("vigil.db").to_string_lossy().into_owned();
        config.persistence.image_root = temp_dir.path().join("images").to_string_lossy().into_owned();
        config.persistence.snapshot_root = temp_dir.path().join("snapshots").to_string_lossy().into_owned();
        config.persistence.index_vector_path = temp_dir.path().join("index.vectors").to_string_lossy().into_owned();
        config.persistence.index_slot_map_path = temp_dir.path().join("index.slots").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn health_endpoint_responds_ok_without_binding_a_socket() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let state = build_state(test_config(&temp_dir)).unwrap();
        let app = router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let state = build_state(test_config(&temp_dir)).unwrap();
        let app = router(state);

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
