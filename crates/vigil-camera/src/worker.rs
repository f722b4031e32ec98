//! Camera worker (C7): connect/reconnect state machine driving one
//! camera's frame loop.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vigil_hub::{Hub, Payload};
use vigil_presence::PresenceTracker;
use vigil_types::{
    AttendanceOutcome, CameraId, CameraMessage, PersonId, RecognitionEvent, RecognizedPerson, RoomId,
    WorkerState, WorkerStatus,
};
use vigil_vision::{AttendanceGate, RecognitionEngine};

use crate::cooldown::CooldownMap;
use crate::failure::PersistenceFailureTracker;
use crate::source::BoxedFrameSource;
use crate::tuning::WorkerTuning;

/// One running camera. Owns its frame source, cooldown map, and failure
/// tracker exclusively — nothing outside this task ever touches them.
pub struct CameraWorker {
    camera_id: CameraId,
    room_id: RoomId,
    source: BoxedFrameSource,
    recognition: Arc<RecognitionEngine>,
    attendance: Arc<AttendanceGate>,
    presence: Arc<PresenceTracker>,
    hub: Arc<Hub>,
    snapshot_root: PathBuf,
    tuning: WorkerTuning,
    cancel: CancellationToken,

    state: WorkerState,
    cooldown: CooldownMap,
    failures: PersistenceFailureTracker,
    frame_count: u64,
    started_at: Instant,
    last_frame_publish: Option<Instant>,
    last_recognition: Option<Instant>,
}

impl CameraWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera_id: CameraId,
        room_id: RoomId,
        source: BoxedFrameSource,
        recognition: Arc<RecognitionEngine>,
        attendance: Arc<AttendanceGate>,
        presence: Arc<PresenceTracker>,
        hub: Arc<Hub>,
        snapshot_root: impl Into<PathBuf>,
        tuning: WorkerTuning,
        cancel: CancellationToken,
    ) -> Self {
        let cooldown = CooldownMap::new(tuning.event_cooldown);
        let failures = PersistenceFailureTracker::new(tuning.persistence_fail_window);
        Self {
            camera_id,
            room_id,
            source,
            recognition,
            attendance,
            presence,
            hub,
            snapshot_root: snapshot_root.into(),
            tuning,
            cancel,
            state: WorkerState::Offline,
            cooldown,
            failures,
            frame_count: 0,
            started_at: Instant::now(),
            last_frame_publish: None,
            last_recognition: None,
        }
    }

    /// Drive the state machine until stopped or cancelled. Consumes the
    /// worker; the caller typically `tokio::spawn`s this.
    pub async fn run(mut self) {
        self.transition(WorkerState::Connecting).await;
        let mut backoff = self.tuning.backoff_initial;

        loop {
            if self.cancel.is_cancelled() {
                self.shutdown().await;
                return;
            }

            match self.state {
                WorkerState::Connecting => {
                    let connected = tokio::select! {
                        _ = self.cancel.cancelled() => { self.shutdown().await; return; }
                        result = tokio::time::timeout(self.tuning.connect_timeout, self.source.connect()) => {
                            matches!(result, Ok(Ok(())))
                        }
                    };
                    if connected {
                        backoff = self.tuning.backoff_initial;
                        self.transition(WorkerState::Streaming).await;
                    } else {
                        self.transition(WorkerState::Failed).await;
                    }
                }
                WorkerState::Failed => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => { self.shutdown().await; return; }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * self.tuning.backoff_factor).min(self.tuning.backoff_cap);
                    self.transition(WorkerState::Connecting).await;
                }
                WorkerState::Streaming => {
                    self.stream_once().await;
                }
                WorkerState::Stopped | WorkerState::Offline => return,
            }
        }
    }

    async fn stream_once(&mut self) {
        let frame = tokio::select! {
            _ = self.cancel.cancelled() => { self.shutdown().await; return; }
            frame = self.source.next_frame() => frame,
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(camera_id = self.camera_id.get(), error = %e, "camera frame source failed");
                self.transition(WorkerState::Failed).await;
                return;
            }
        };
        self.frame_count += 1;

        let now_instant = Instant::now();
        if self
            .last_frame_publish
            .map_or(true, |t| now_instant.duration_since(t) >= self.tuning.stream_period)
        {
            self.hub.publish(
                &vigil_hub::camera_topic(self.camera_id),
                Payload::Frame(frame.jpeg_bytes.clone()),
            );
            self.last_frame_publish = Some(now_instant);
        }

        let should_recognize = self
            .last_recognition
            .map_or(true, |t| now_instant.duration_since(t) >= self.tuning.recognition_period);
        if !should_recognize {
            return;
        }
        self.last_recognition = Some(now_instant);

        let image = match image::load_from_memory(&frame.jpeg_bytes) {
            Ok(img) => img,
            Err(_) => return,
        };

        let matches = match self.recognition.recognize(&image).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(camera_id = self.camera_id.get(), error = %e, "recognition failed");
                return;
            }
        };
        if matches.is_empty() {
            return;
        }

        let now = Utc::now();
        let mut recognized = Vec::new();

        for m in matches {
            let within_cooldown = self.cooldown.is_within_cooldown(m.person_id, now);
            let recognized_person = if within_cooldown {
                None
            } else {
                self.cooldown.stamp(m.person_id, now);
                self.record_attendance(m.person_id, m.confidence, now, &frame.jpeg_bytes).await
            };

            let delta = self.presence.touch(self.room_id, m.person_id, self.camera_id, now, m.confidence);
            if let Ok(json) = serde_json::to_value(&delta) {
                self.hub.publish(&vigil_hub::room_topic(self.room_id), Payload::Event(json));
            }

            if let Some(rp) = recognized_person {
                recognized.push(rp);
            }
        }

        if !recognized.is_empty() {
            let event = CameraMessage::Recognition(RecognitionEvent {
                camera_id: self.camera_id,
                recognized,
                timestamp: now,
            });
            if let Ok(json) = serde_json::to_value(&event) {
                self.hub.publish(&vigil_hub::camera_topic(self.camera_id), Payload::Event(json));
            }
        }
    }

    async fn record_attendance(
        &mut self,
        person_id: PersonId,
        confidence: f32,
        now: chrono::DateTime<Utc>,
        jpeg_bytes: &[u8],
    ) -> Option<RecognizedPerson> {
        match self.attendance.record(person_id, confidence, now) {
            Ok(result) => {
                self.failures.record_success();
                if result.outcome == AttendanceOutcome::Created {
                    if let Some(record_id) = result.record_id {
                        if let Ok(path) = self.write_snapshot(jpeg_bytes, person_id, now) {
                            let _ = self.attendance.attach_snapshot(record_id, &path);
                        }
                    }
                }
                Some(RecognizedPerson {
                    person_id,
                    confidence,
                    status: result.outcome,
                    check_in_time: (result.outcome == AttendanceOutcome::Created).then_some(now),
                })
            }
            Err(e) => {
                tracing::error!(camera_id = self.camera_id.get(), error = %e, "attendance gate call failed");
                if self.failures.record_failure(now) {
                    self.transition(WorkerState::Failed).await;
                }
                None
            }
        }
    }

    fn write_snapshot(
        &self,
        bytes: &[u8],
        person_id: PersonId,
        now: chrono::DateTime<Utc>,
    ) -> std::io::Result<String> {
        std::fs::create_dir_all(&self.snapshot_root)?;
        let filename = format!("{}-{}.jpg", person_id.get(), now.timestamp_millis());
        let final_path = self.snapshot_root.join(&filename);
        let tmp_path = self.snapshot_root.join(format!("{filename}.tmp"));
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(final_path.to_string_lossy().into_owned())
    }

    async fn transition(&mut self, state: WorkerState) {
        self.state = state;
        self.publish_status();
    }

    fn publish_status(&self) {
        let elapsed = self.started_at.elapsed().as_secs_f32();
        let fps = if elapsed > 0.0 { self.frame_count as f32 / elapsed } else { 0.0 };
        let status = CameraMessage::Status(WorkerStatus {
            camera_id: self.camera_id,
            connected: self.state.connected(),
            running: self.state.running(),
            fps,
            frame_count: self.frame_count,
        });
        if let Ok(json) = serde_json::to_value(&status) {
            self.hub.publish(&vigil_hub::camera_topic(self.camera_id), Payload::Event(json));
        }
    }

    /// Disconnect the frame source, bounded by `shutdown_grace`, and
    /// mark the worker stopped regardless of whether disconnect finished
    /// cleanly in time.
    async fn shutdown(&mut self) {
        let _ = tokio::time::timeout(self.tuning.shutdown_grace, self.source.disconnect()).await;
        self.state = WorkerState::Stopped;
        self.publish_status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockFrameSource;
    use std::time::Duration;
    use vigil_index::SimilarityIndex;
    use vigil_store::Store;
    use vigil_vision::{MockFaceDetector, RecognitionEngine};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        use image::{codecs::png::PngEncoder, ImageEncoder};
        let img = image::RgbImage::new(w, h);
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(img.as_raw(), w, h, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn harness(dir: &tempfile::TempDir, frames: Vec<Vec<u8>>) -> (CameraWorker, CancellationToken, Arc<Hub>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let index = Arc::new(SimilarityIndex::new(dir.path().join("v"), dir.path().join("s")));
        let recognition = Arc::new(RecognitionEngine::new(Arc::new(MockFaceDetector::new()), index, 0.0, 2.0));
        let attendance = Arc::new(AttendanceGate::new(store, chrono_tz::UTC, 0.0));
        let presence = Arc::new(PresenceTracker::new(Duration::from_secs(30)));
        let hub = Hub::new(32);
        let cancel = CancellationToken::new();

        let mut tuning = WorkerTuning::default();
        tuning.connect_timeout = Duration::from_millis(200);
        tuning.shutdown_grace = Duration::from_millis(200);
        tuning.backoff_initial = Duration::from_millis(10);
        tuning.backoff_cap = Duration::from_millis(50);

        let worker = CameraWorker::new(
            CameraId::new(1),
            RoomId::new(1),
            Box::new(MockFrameSource::new(frames)),
            recognition,
            attendance,
            presence,
            hub.clone(),
            dir.path().join("snapshots"),
            tuning,
            cancel.clone(),
        );
        (worker, cancel, hub)
    }

    #[tokio::test]
    async fn worker_publishes_status_transitions_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, cancel, hub) = harness(&dir, vec![png_bytes(8, 8); 20]);
        let sub = hub.subscribe(&vigil_hub::camera_topic(CameraId::new(1)), vigil_hub::SubscriptionKind::Events);

        let handle = tokio::spawn(worker.run());
        // Let it connect and stream a little before stopping.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

        let mut saw_streaming = false;
        let mut saw_stopped = false;
        while let Ok(Some(msg)) = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await {
            if let vigil_hub::Payload::Event(json) = msg.payload {
                if let Ok(CameraMessage::Status(status)) = serde_json::from_value::<CameraMessage>(json) {
                    if status.connected && status.running {
                        saw_streaming = true;
                    }
                    if !status.connected && !status.running {
                        saw_stopped = true;
                    }
                }
            }
        }
        assert!(saw_streaming);
        assert!(saw_stopped);
    }

    #[tokio::test]
    async fn connect_failures_retry_with_backoff_then_succeed() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(SimilarityIndex::new(dir.path().join("v"), dir.path().join("s")));
        let recognition = Arc::new(RecognitionEngine::new(Arc::new(MockFaceDetector::new()), index, 0.0, 2.0));
        let attendance = Arc::new(AttendanceGate::new(store, chrono_tz::UTC, 0.0));
        let presence = Arc::new(PresenceTracker::new(Duration::from_secs(30)));
        let hub = Hub::new(32);
        let cancel = CancellationToken::new();

        let mut tuning = WorkerTuning::default();
        tuning.connect_timeout = Duration::from_millis(100);
        tuning.backoff_initial = Duration::from_millis(5);
        tuning.backoff_cap = Duration::from_millis(20);

        let worker = CameraWorker::new(
            CameraId::new(1),
            RoomId::new(1),
            Box::new(MockFrameSource::new(vec![png_bytes(8, 8)]).failing_connects(2)),
            recognition,
            attendance,
            presence,
            hub.clone(),
            dir.path().join("snapshots"),
            tuning,
            cancel.clone(),
        );
        let sub = hub.subscribe(&vigil_hub::camera_topic(CameraId::new(1)), vigil_hub::SubscriptionKind::Events);
        let handle = tokio::spawn(worker.run());

        let mut saw_streaming = false;
        for _ in 0..20 {
            if let Ok(Some(msg)) = tokio::time::timeout(Duration::from_millis(200), sub.recv()).await {
                if let vigil_hub::Payload::Event(json) = msg.payload {
                    if let Ok(CameraMessage::Status(status)) = serde_json::from_value::<CameraMessage>(json) {
                        if status.connected && status.running {
                            saw_streaming = true;
                            break;
                        }
                    }
                }
            }
        }
        assert!(saw_streaming);
        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
