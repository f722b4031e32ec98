//! Durable and quasi-durable entity records.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AttendanceId, CameraId, PersonId, ReferenceId, RoomId};

/// A stable enrolled identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    /// Unique, externally meaningful identifier (e.g. a student number).
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub group: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Person {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A single enrolled reference image/embedding sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEmbedding {
    pub id: ReferenceId,
    pub person_id: PersonId,
    pub image_path: String,
    pub created_at: DateTime<Utc>,
}

/// A single daily check-in. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub person_id: PersonId,
    pub day: NaiveDate,
    pub time_of_day: NaiveTime,
    pub confidence: f32,
    pub snapshot_path: Option<String>,
}

/// A logical grouping of cameras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub active: bool,
}

/// Runtime status of a camera worker. Never persisted — recomputed on
/// every process start as `Offline` until a worker is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    Offline,
    Connecting,
    Streaming,
    Failed,
}

/// A camera belonging to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: CameraId,
    pub room_id: RoomId,
    pub name: String,
    /// Frame-source address (RTSP URL, device path, etc.) — opaque to
    /// everything except the frame-source implementation it is handed to.
    pub source_address: String,
    pub active: bool,
    #[serde(default = "default_camera_status")]
    pub status: CameraStatus,
}

fn default_camera_status() -> CameraStatus {
    CameraStatus::Offline
}

/// One entry of the in-memory presence map, as returned from a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub room_id: RoomId,
    pub person_id: PersonId,
    pub camera_id: CameraId,
    pub last_seen: DateTime<Utc>,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_joins_parts() {
        let person = Person {
            id: PersonId::new(1),
            external_id: "2024001".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            group: None,
            created_at: Utc::now(),
        };
        assert_eq!(person.display_name(), "Ada Lovelace");
    }

    #[test]
    fn camera_status_serializes_snake_case() {
        let json = serde_json::to_string(&CameraStatus::Streaming).unwrap();
        assert_eq!(json, "\"streaming\"");
    }
}
