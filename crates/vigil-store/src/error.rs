//! Error type for the relational store.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("person not found: {0}")]
    PersonNotFound(String),

    #[error("room not found: {0}")]
    RoomNotFound(i64),

    #[error("camera not found: {0}")]
    CameraNotFound(i64),

    #[error("external id already registered: {0}")]
    DuplicateExternalId(String),

    #[error("attendance already recorded for person {person_id} on {day}")]
    DuplicateAttendance { person_id: i64, day: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
