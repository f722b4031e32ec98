//! Tagged records produced by the recognition and presence pipeline.
//!
//! The reference system's source passes these around as ad-hoc
//! dictionaries; here they are reified so every producer/consumer boundary
//! is checked by the compiler instead of by key-name convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CameraId, PersonId, ReferenceId, RoomId};

/// A face bounding box in source-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// One recognized face from a single frame (C5 output).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub person_id: PersonId,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Outcome of an attendance-gate call (C6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceOutcome {
    Created,
    Already,
    Suppressed,
}

/// Why one enrollment image was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollSkipReason {
    Decode,
    NoFace,
    MultiFace,
    LowQuality,
    Timeout,
}

/// Summary returned by one `enroll(...)` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollSummary {
    pub successful: usize,
    pub new_reference_ids: Vec<ReferenceId>,
    /// Parallel to `new_reference_ids`: skip reasons in input order, for
    /// images that did not succeed.
    pub skipped: Vec<EnrollSkipReason>,
}

impl EnrollSummary {
    pub fn skip_count(&self, reason: EnrollSkipReason) -> usize {
        self.skipped.iter().filter(|r| **r == reason).count()
    }
}

/// One person's recognition outcome as carried in a `RecognitionEvent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecognizedPerson {
    pub person_id: PersonId,
    pub confidence: f32,
    pub status: AttendanceOutcome,
    pub check_in_time: Option<DateTime<Utc>>,
}

/// Structured event published on a camera's control channel whenever at
/// least one recognition passed cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionEvent {
    pub camera_id: CameraId,
    pub recognized: Vec<RecognizedPerson>,
    pub timestamp: DateTime<Utc>,
}

/// Why a presence snapshot changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceChangeKind {
    Added,
    Refreshed,
    Expired,
}

/// Published on `room:<room_id>` (and aggregated onto `rooms:all`)
/// whenever presence membership changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceDelta {
    pub room_id: RoomId,
    pub person_id: PersonId,
    pub kind: PresenceChangeKind,
    pub occupant_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Camera worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Offline,
    Connecting,
    Streaming,
    Failed,
    Stopped,
}

impl WorkerState {
    /// Whether the frame source is currently connected.
    pub fn connected(self) -> bool {
        matches!(self, WorkerState::Streaming)
    }

    /// Whether the worker task is still active (connecting, streaming,
    /// or retrying after a failure) as opposed to stopped for good.
    pub fn running(self) -> bool {
        !matches!(self, WorkerState::Offline | WorkerState::Stopped)
    }
}

/// Published whenever a camera worker's state machine transitions, and
/// periodically while streaming (backs the WebSocket `status` message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub camera_id: CameraId,
    pub connected: bool,
    pub running: bool,
    pub fps: f32,
    pub frame_count: u64,
}

/// Wire envelope for the text-frame side of a camera's WebSocket stream:
/// a recognition event or a status update, tagged so a client can tell
/// them apart without guessing from the field set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraMessage {
    Recognition(RecognitionEvent),
    Status(WorkerStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_area_is_width_times_height() {
        let bbox = BoundingBox {
            x: 0,
            y: 0,
            width: 10,
            height: 20,
        };
        assert_eq!(bbox.area(), 200);
    }

    #[test]
    fn worker_state_connected_and_running_reflect_lifecycle() {
        assert!(WorkerState::Streaming.connected());
        assert!(WorkerState::Streaming.running());
        assert!(!WorkerState::Connecting.connected());
        assert!(WorkerState::Connecting.running());
        assert!(!WorkerState::Stopped.running());
        assert!(!WorkerState::Offline.running());
    }

    #[test]
    fn camera_message_tags_status_and_recognition_distinctly() {
        let status = CameraMessage::Status(WorkerStatus {
            camera_id: CameraId::new(1),
            connected: true,
            running: true,
            fps: 2.0,
            frame_count: 10,
        });
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["connected"], true);

        let recognition = CameraMessage::Recognition(RecognitionEvent {
            camera_id: CameraId::new(1),
            recognized: Vec::new(),
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&recognition).unwrap();
        assert_eq!(json["type"], "recognition");
        assert!(json["recognized"].is_array());
    }

    #[test]
    fn enroll_summary_counts_by_reason() {
        let summary = EnrollSummary {
            successful: 1,
            new_reference_ids: vec![ReferenceId::new(1)],
            skipped: vec![
                EnrollSkipReason::Decode,
                EnrollSkipReason::LowQuality,
                EnrollSkipReason::LowQuality,
            ],
        };
        assert_eq!(summary.skip_count(EnrollSkipReason::LowQuality), 2);
        assert_eq!(summary.skip_count(EnrollSkipReason::Decode), 1);
        assert_eq!(summary.skip_count(EnrollSkipReason::NoFace), 0);
    }
}
