//! Attendance check-in and reporting (C6).

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use vigil_types::{AttendanceId, AttendanceOutcome, AttendanceRecord, Person};
use vigil_vision::SingleRecognition;

use crate::error::{Result, ServerError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attendance/check-in", post(check_in_handler))
        .route("/attendance/today", get(today_handler))
        .route(
            "/attendance/student/{external_id}",
            get(for_student_handler),
        )
        .route("/attendance/statistics", get(statistics_handler))
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    /// A single JPEG frame, base64-encoded.
    pub image_base64: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    Success,
    AlreadyAttended,
    NoMatch,
    NoFace,
    Error,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub status: CheckInStatus,
    pub person: Option<Person>,
    pub confidence: Option<f32>,
    pub check_in_time: Option<chrono::DateTime<Utc>>,
    pub attendance_id: Option<AttendanceId>,
}

impl CheckInResponse {
    fn status_only(status: CheckInStatus) -> Self {
        Self {
            status,
            person: None,
            confidence: None,
            check_in_time: None,
            attendance_id: None,
        }
    }
}

/// Run a base64 JPEG through recognition and the attendance gate, and
/// report one of the five outcomes a caller needs to branch on. A
/// recognized face whose confidence the gate suppresses (above the
/// search threshold but below `attendance.attendance_min`) is reported
/// as `no_match`: the image didn't produce a confident-enough identity
/// for the caller to act on, same as not matching at all.
async fn check_in_handler(
    State(state): State<AppState>,
    Json(body): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>> {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(body.image_base64.as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(Json(CheckInResponse::status_only(CheckInStatus::Error))),
    };
    let image = match image::load_from_memory(&bytes) {
        Ok(image) => image,
        Err(_) => return Ok(Json(CheckInResponse::status_only(CheckInStatus::Error))),
    };

    let matched = match state.recognition.recognize_one(&image).await? {
        SingleRecognition::NoFace => return Ok(Json(CheckInResponse::status_only(CheckInStatus::NoFace))),
        SingleRecognition::NoMatch => return Ok(Json(CheckInResponse::status_only(CheckInStatus::NoMatch))),
        SingleRecognition::Matched(m) => m,
    };

    let now = Utc::now();
    let result = state.attendance.record(matched.person_id, matched.confidence, now)?;
    let person = state.store.get_person(matched.person_id)?;

    let response = match result.outcome {
        AttendanceOutcome::Created => CheckInResponse {
            status: CheckInStatus::Success,
            person: Some(person),
            confidence: Some(matched.confidence),
            check_in_time: Some(now),
            attendance_id: result.record_id,
        },
        AttendanceOutcome::Already => {
            let tz = state
                .config
                .timezone()
                .map_err(|e| ServerError::Internal(e.to_string()))?;
            let day = now.with_timezone(&tz).date_naive();
            let existing = state
                .store
                .attendance_for_person(matched.person_id, Some(day), Some(day))?
                .into_iter()
                .next();
            CheckInResponse {
                status: CheckInStatus::AlreadyAttended,
                person: Some(person),
                confidence: Some(matched.confidence),
                check_in_time: existing
                    .as_ref()
                    .map(|r| tz.from_local_datetime(&r.day.and_time(r.time_of_day)).unwrap().with_timezone(&Utc)),
                attendance_id: existing.map(|r| r.id),
            }
        }
        AttendanceOutcome::Suppressed => CheckInResponse::status_only(CheckInStatus::NoMatch),
    };

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct DayReport {
    pub day: NaiveDate,
    pub records: Vec<AttendanceRecord>,
}

async fn today_handler(State(state): State<AppState>) -> Result<Json<DayReport>> {
    let tz = state
        .config
        .timezone()
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    let day = Utc::now().with_timezone(&tz).date_naive();
    let records = state.store.attendance_for_day(day)?;
    Ok(Json(DayReport { day, records }))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

async fn for_student_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<AttendanceRecord>>> {
    let person = state.store.get_person_by_external_id(&external_id)?;
    let records = state
        .store
        .attendance_for_person(person.id, range.date_from, range.date_to)?;
    Ok(Json(records))
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub day: NaiveDate,
    pub total_enrolled: i64,
    pub checked_in: i64,
}

async fn statistics_handler(State(state): State<AppState>) -> Result<Json<StatisticsResponse>> {
    let tz = state
        .config
        .timezone()
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    let day = Utc::now().with_timezone(&tz).date_naive();
    let (total_enrolled, checked_in) = state.store.attendance_statistics(day)?;
    Ok(Json(StatisticsResponse {
        day,
        total_enrolled,
        checked_in,
    }))
}
