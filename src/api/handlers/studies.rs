//! Study CRUD handlers.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use crate::api::extract::Json;
use uuid::Uuid;

use crate::api::envelope::ApiResponse;
use crate::api::handlers::AppState;
use crate::error::PipelineError;
use crate::studies::{StudyPatch, StudyQuery};
use crate::types::NewStudy;

pub async fn create_study(
    State(state): State<AppState>,
    Json(body): Json<NewStudy>,
) -> Result<Response, PipelineError> {
    let study = state.studies.create(body).await?;
    Ok(ApiResponse::created(study))
}

pub async fn list_studies(
    State(state): State<AppState>,
    Query(query): Query<StudyQuery>,
) -> Result<Response, PipelineError> {
    let studies = state.studies.list(&query).await?;
    Ok(ApiResponse::ok(studies))
}

pub async fn get_study(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let study = state.studies.get(study_id).await?;
    Ok(ApiResponse::ok(study))
}

pub async fn update_study(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
    Json(patch): Json<StudyPatch>,
) -> Result<Response, PipelineError> {
    let study = state.studies.update(study_id, patch).await?;
    Ok(ApiResponse::ok(study))
}

pub async fn delete_study(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let deleted = state.studies.delete(study_id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "deleted": deleted })))
}
