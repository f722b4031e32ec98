//! Shared domain types for the Vigil attendance and presence service.
//!
//! These are the tagged records every other crate in the workspace
//! exchanges, so that no component has to pass around untyped JSON or
//! tuples across a call boundary.

pub mod error;
pub mod ids;
pub mod model;
pub mod recognition;

pub use error::{Error, Result};
pub use ids::{AttendanceId, CameraId, PersonId, ReferenceId, RoomId, SlotId};
pub use model::{
    AttendanceRecord, Camera, CameraStatus, Person, PresenceEntry, ReferenceEmbedding, Room,
};
pub use recognition::{
    AttendanceOutcome, BoundingBox, CameraMessage, EnrollSkipReason, EnrollSummary, Match,
    PresenceChangeKind, PresenceDelta, RecognitionEvent, RecognizedPerson, WorkerState,
    WorkerStatus,
};

/// Fixed embedding dimensionality. The embedding provider (C1) and the
/// similarity index (C3) must agree on this; it is not configurable
/// because the distance metric and persisted index artifacts both bake it
/// in structurally.
pub const EMBEDDING_DIMENSION: usize = 512;
