//! Participant enrollment and lifecycle handlers.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use crate::api::extract::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::envelope::ApiResponse;
use crate::api::handlers::AppState;
use crate::error::PipelineError;
use crate::lifecycle::ParticipantQuery;
use crate::types::{ParticipantPatch, ParticipantStatus};

#[derive(Debug, Deserialize)]
pub struct EnrollBody {
    pub contact: String,
    #[serde(default)]
    pub demographics: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct BulkEnrollBody {
    pub contacts: Vec<String>,
    #[serde(default)]
    pub demographics: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub status: ParticipantStatus,
}

pub async fn enroll_participant(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
    Json(body): Json<EnrollBody>,
) -> Result<Response, PipelineError> {
    let participant = state
        .lifecycle
        .enroll(study_id, &body.contact, body.demographics)
        .await?;
    Ok(ApiResponse::created(participant))
}

pub async fn bulk_enroll(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
    Json(body): Json<BulkEnrollBody>,
) -> Result<Response, PipelineError> {
    let outcome = state
        .lifecycle
        .bulk_enroll(study_id, &body.contacts, body.demographics)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

pub async fn list_participants(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
    Query(mut query): Query<ParticipantQuery>,
) -> Result<Response, PipelineError> {
    query.study_id = Some(study_id);
    let participants = state.lifecycle.list(&query).await?;
    Ok(ApiResponse::ok(participants))
}

pub async fn get_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let participant = state.lifecycle.get(participant_id).await?;
    Ok(ApiResponse::ok(participant))
}

pub async fn transition_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
    Json(body): Json<TransitionBody>,
) -> Result<Response, PipelineError> {
    let participant = state.lifecycle.transition(participant_id, body.status).await?;
    Ok(ApiResponse::ok(participant))
}

pub async fn update_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
    Json(patch): Json<ParticipantPatch>,
) -> Result<Response, PipelineError> {
    let participant = state.lifecycle.update(participant_id, patch).await?;
    Ok(ApiResponse::ok(participant))
}

pub async fn delete_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let deleted = state.lifecycle.delete(participant_id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "deleted": deleted })))
}
