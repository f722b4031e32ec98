//! Camera worker (C7): connects one frame source, runs recognition on
//! its frames at a bounded rate, and publishes frames/events to the hub.

mod cooldown;
mod error;
mod failure;
pub mod source;
mod tuning;
mod worker;

pub use error::{CameraError, Result};
pub use source::{BoxedFrameSource, Frame, FrameSource};
pub use tuning::WorkerTuning;
pub use worker::CameraWorker;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vigil_hub::Hub;
use vigil_presence::PresenceTracker;
use vigil_types::{CameraId, RoomId};
use vigil_vision::{AttendanceGate, RecognitionEngine};

/// Build and spawn a worker for one camera, returning a handle to join
/// and a token the caller uses to stop it. Mirrors
/// `vigil_presence::spawn_eviction_loop`'s shape: compose the pieces
/// here rather than inside the leaf crates so `vigil-camera` never
/// depends on how the application assembles C2-C9.
#[allow(clippy::too_many_arguments)]
pub fn spawn_camera_worker(
    camera_id: CameraId,
    room_id: RoomId,
    source: BoxedFrameSource,
    recognition: Arc<RecognitionEngine>,
    attendance: Arc<AttendanceGate>,
    presence: Arc<PresenceTracker>,
    hub: Arc<Hub>,
    snapshot_root: impl Into<PathBuf>,
    tuning: WorkerTuning,
) -> (tokio::task::JoinHandle<()>, CancellationToken) {
    let cancel = CancellationToken::new();
    let worker = CameraWorker::new(
        camera_id,
        room_id,
        source,
        recognition,
        attendance,
        presence,
        hub,
        snapshot_root,
        tuning,
        cancel.clone(),
    );
    let handle = tokio::spawn(worker.run());
    (handle, cancel)
}
