//! Room/camera CRUD, camera lifecycle control, and presence reporting
//! (C2 persistence + C7 lifecycle + C8 snapshots).

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vigil_store::{NewCamera, NewRoom};
use vigil_types::{Camera, CameraId, PresenceEntry, Room, RoomId};

use crate::camera_source::SyntheticFrameSource;
use crate::error::{Result, ServerError};
use crate::state::{AppState, WorkerHandle};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room_handler).get(list_rooms_handler))
        .route("/rooms/{id}", delete(delete_room_handler))
        .route(
            "/rooms/{id}/cameras",
            post(create_camera_handler).get(list_cameras_handler),
        )
        .route(
            "/rooms/{id}/cameras/{cid}/start",
            post(start_camera_handler),
        )
        .route("/rooms/{id}/cameras/{cid}/stop", post(stop_camera_handler))
        .route("/rooms/{id}/start-all", post(start_all_handler))
        .route("/rooms/{id}/stop-all", post(stop_all_handler))
        .route("/rooms/{id}/presence", get(room_presence_handler))
        .route("/rooms/presence/all", get(all_presence_handler))
        .route(
            "/rooms/presence/student/{external_id}",
            get(student_presence_handler),
        )
        .route("/rooms/presence/stats", get(presence_stats_handler))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

async fn create_room_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<Room>> {
    let room = state.store.create_room(NewRoom { name: &body.name })?;
    Ok(Json(room))
}

async fn list_rooms_handler(State(state): State<AppState>) -> Result<Json<Vec<Room>>> {
    Ok(Json(state.store.list_rooms()?))
}

async fn delete_room_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let room_id = RoomId::new(id);
    for camera in state.store.list_cameras_for_room(room_id)? {
        stop_worker(&state, camera.id).await;
    }
    let deleted = state.store.delete_room(room_id)?;
    if !deleted {
        return Err(ServerError::NotFound(format!("room {id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCameraRequest {
    pub name: String,
    pub source_address: String,
}

async fn create_camera_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CreateCameraRequest>,
) -> Result<Json<Camera>> {
    let camera = state.store.create_camera(NewCamera {
        room_id: RoomId::new(id),
        name: &body.name,
        source_address: &body.source_address,
    })?;
    Ok(Json(camera))
}

async fn list_cameras_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Camera>>> {
    Ok(Json(state.store.list_cameras_for_room(RoomId::new(id))?))
}

async fn start_camera_handler(
    State(state): State<AppState>,
    Path((room_id, camera_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>> {
    start_worker(&state, RoomId::new(room_id), CameraId::new(camera_id)).await?;
    Ok(Json(serde_json::json!({ "started": true })))
}

async fn stop_camera_handler(
    State(state): State<AppState>,
    Path((_room_id, camera_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>> {
    stop_worker(&state, CameraId::new(camera_id)).await;
    state.store.set_camera_active(CameraId::new(camera_id), false)?;
    Ok(Json(serde_json::json!({ "stopped": true })))
}

async fn start_all_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let room_id = RoomId::new(id);
    let mut started = 0;
    for camera in state.store.list_cameras_for_room(room_id)? {
        start_worker(&state, room_id, camera.id).await?;
        started += 1;
    }
    Ok(Json(serde_json::json!({ "started": started })))
}

async fn stop_all_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let room_id = RoomId::new(id);
    let mut stopped = 0;
    for camera in state.store.list_cameras_for_room(room_id)? {
        stop_worker(&state, camera.id).await;
        state.store.set_camera_active(camera.id, false)?;
        stopped += 1;
    }
    Ok(Json(serde_json::json!({ "stopped": stopped })))
}

/// Spawn a worker for `camera_id` if one isn't already running, and mark
/// the camera active in the store.
pub(crate) async fn start_worker(state: &AppState, room_id: RoomId, camera_id: CameraId) -> Result<()> {
    let mut workers = state.workers.lock().await;
    if workers.contains_key(&camera_id) {
        return Ok(());
    }
    let camera = state.store.get_camera(camera_id)?;
    let source = Box::new(SyntheticFrameSource::new(camera.source_address.clone()));
    let (join, cancel) = vigil_camera::spawn_camera_worker(
        camera_id,
        room_id,
        source,
        state.recognition.clone(),
        state.attendance.clone(),
        state.presence.clone(),
        state.hub.clone(),
        state.config.persistence.snapshot_root.clone(),
        state.tuning,
    );
    workers.insert(camera_id, WorkerHandle { join, cancel });
    drop(workers);
    state.store.set_camera_active(camera_id, true)?;
    Ok(())
}

pub(crate) async fn stop_worker(state: &AppState, camera_id: CameraId) {
    let handle = state.workers.lock().await.remove(&camera_id);
    if let Some(handle) = handle {
        handle.cancel.cancel();
        let _ = handle.join.await;
    }
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub entries: Vec<PresenceEntry>,
}

async fn room_presence_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PresenceResponse>> {
    let entries = state.presence.snapshot(RoomId::new(id), Utc::now());
    Ok(Json(PresenceResponse { entries }))
}

#[derive(Debug, Serialize)]
pub struct AllPresenceResponse {
    pub rooms: std::collections::HashMap<RoomId, Vec<PresenceEntry>>,
    pub total_occupants: usize,
}

async fn all_presence_handler(State(state): State<AppState>) -> Result<Json<AllPresenceResponse>> {
    let (rooms, total_occupants) = state.presence.snapshot_all(Utc::now());
    Ok(Json(AllPresenceResponse {
        rooms,
        total_occupants,
    }))
}

#[derive(Debug, Serialize)]
pub struct StudentPresenceResponse {
    pub room_id: Option<RoomId>,
}

async fn student_presence_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<StudentPresenceResponse>> {
    let person = state.store.get_person_by_external_id(&external_id)?;
    let room_id = state.presence.locate(person.id, Utc::now());
    Ok(Json(StudentPresenceResponse { room_id }))
}

#[derive(Debug, Serialize)]
pub struct PresenceStatsResponse {
    pub rooms_occupied: usize,
    pub total_occupants: usize,
}

async fn presence_stats_handler(State(state): State<AppState>) -> Result<Json<PresenceStatsResponse>> {
    let (rooms, total_occupants) = state.presence.snapshot_all(Utc::now());
    Ok(Json(PresenceStatsResponse {
        rooms_occupied: rooms.values().filter(|v| !v.is_empty()).count(),
        total_occupants,
    }))
}
