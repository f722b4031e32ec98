//! Application state shared across handlers: the application root that
//! threads C2-C9 explicitly into every handler rather than through
//! global singletons.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vigil_camera::WorkerTuning;
use vigil_config::VigilConfig;
use vigil_hub::Hub;
use vigil_index::SimilarityIndex;
use vigil_presence::PresenceTracker;
use vigil_store::Store;
use vigil_types::CameraId;
use vigil_vision::{AttendanceGate, EnrollmentCoordinator, RecognitionEngine};

/// A running camera worker's control handle.
pub struct WorkerHandle {
    pub join: tokio::task::JoinHandle<()>,
    pub cancel: CancellationToken,
}

/// Everything a handler needs, cloned cheaply via `Arc` fields.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<VigilConfig>,
    pub store: Arc<Store>,
    pub index: Arc<SimilarityIndex>,
    pub enrollment: Arc<EnrollmentCoordinator>,
    pub recognition: Arc<RecognitionEngine>,
    pub attendance: Arc<AttendanceGate>,
    pub presence: Arc<PresenceTracker>,
    pub hub: Arc<Hub>,
    pub tuning: WorkerTuning,
    pub workers: Arc<tokio::sync::Mutex<HashMap<CameraId, WorkerHandle>>>,
}

impl AppState {
    /// Derive a [`WorkerTuning`] from the loaded config. Kept here rather
    /// than in `vigil-config` or `vigil-camera` so neither crate needs to
    /// know about the other.
    pub fn tuning_from_config(config: &VigilConfig) -> WorkerTuning {
        WorkerTuning {
            recognition_period: config.camera.recognition_period(),
            stream_period: config.camera.stream_period(),
            event_cooldown: config.camera.event_cooldown(),
            connect_timeout: config.camera.connect_timeout(),
            shutdown_grace: config.camera.shutdown_grace(),
            backoff_initial: config.camera.backoff_initial(),
            backoff_factor: config.camera.backoff_factor,
            backoff_cap: config.camera.backoff_cap(),
            persistence_fail_window: config.camera.persistence_fail_window(),
        }
    }
}
