//! Person registration and enrollment (C2 + C4).

use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use vigil_store::NewPerson;
use vigil_types::{EnrollSummary, Person};

use crate::error::{Result, ServerError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/students/register", post(register_handler))
        .route(
            "/students/{external_id}/upload-images",
            post(upload_images_handler),
        )
        .route("/students", get(list_students_handler))
        .route(
            "/students/{external_id}",
            get(get_student_handler).delete(delete_student_handler),
        )
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub group: Option<String>,
}

async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<Person>> {
    let person = state.store.create_person(NewPerson {
        external_id: &body.external_id,
        first_name: &body.first_name,
        last_name: &body.last_name,
        group: body.group.as_deref(),
    })?;
    Ok(Json(person))
}

async fn upload_images_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<EnrollSummary>> {
    let person = state.store.get_person_by_external_id(&external_id)?;

    let mut images = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        images.push(bytes.to_vec());
    }

    let summary = state.enrollment.enroll(person.id, images).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListStudentsResponse {
    pub students: Vec<Person>,
}

async fn list_students_handler(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ListStudentsResponse>> {
    let students = state.store.list_persons(q.skip, q.limit)?;
    Ok(Json(ListStudentsResponse { students }))
}

async fn get_student_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<Person>> {
    let person = state.store.get_person_by_external_id(&external_id)?;
    Ok(Json(person))
}

async fn delete_student_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let person = state.store.get_person_by_external_id(&external_id)?;
    state.index.remove_by_person(person.id);
    state.presence.remove_person(person.id);
    let deleted = state.store.delete_person(person.id)?;
    if !deleted {
        return Err(ServerError::NotFound(format!("student {external_id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
