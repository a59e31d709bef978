// plantcare-server/src/routes.rs
use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use plantcare_core::models::note::parse_day;
use plantcare_core::{ChatReply, Crop, NewCrop, NewNote, Note, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Deserialize, Debug)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub reply: ChatReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "PlantCare API en funcionamiento" }))
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let session_key = request
        .session_id
        .filter(|key| !key.trim().is_empty());
    debug!(session_key = ?session_key, "POST /chat");

    let reply = state
        .chat
        .handle_message(session_key.as_deref(), &request.message)
        .await?;
    Ok(Json(ChatResponse {
        reply,
        session_id: session_key,
    }))
}

pub async fn list_cultivos(State(state): State<AppState>) -> Result<Json<Vec<Crop>>, ApiError> {
    let crops = state.crops.list().await?;
    debug!(count = crops.len(), "GET /cultivos");
    Ok(Json(crops))
}

pub async fn create_cultivo(
    State(state): State<AppState>,
    payload: Result<Json<NewCrop>, JsonRejection>,
) -> Result<(StatusCode, Json<Crop>), ApiError> {
    let Json(new_crop) = payload?;
    let created = state.crops.create(new_crop).await?;
    info!(name = %created.name, "POST /cultivos created a crop");
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize, Debug, Default)]
pub struct NotesQuery {
    #[serde(default)]
    pub date: Option<String>,
}

pub async fn list_notes(
    State(state): State<AppState>,
    query: Result<Query<NotesQuery>, QueryRejection>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let Query(query) = query?;
    let date = match query.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_day(raw)?),
        _ => None,
    };
    let notes = state.notes.list(date).await?;
    debug!(?date, count = notes.len(), "GET /notes");
    Ok(Json(notes))
}

pub async fn create_note(
    State(state): State<AppState>,
    payload: Result<Json<NewNote>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let Json(new_note) = payload?;
    let created = state.notes.create(new_note).await?;
    info!(date = %created.date, "POST /notes created a note");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = RecordId::parse(&id);
    if state.notes.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Nota no encontrada"))
    }
}
