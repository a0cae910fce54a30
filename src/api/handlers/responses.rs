//! Response submission and listing handlers.

use axum::extract::{Query, State};
use axum::response::Response;
use crate::api::extract::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::envelope::ApiResponse;
use crate::api::handlers::AppState;
use crate::error::PipelineError;
use crate::ingestor::ResponseQuery;
use crate::types::ResponsePayload;

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub participant_id: Uuid,
    pub task_id: Uuid,
    pub response_data: ResponsePayload,
}

pub async fn submit_response(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> Result<Response, PipelineError> {
    let response = state
        .ingestor
        .submit(body.participant_id, body.task_id, body.response_data)
        .await?;
    Ok(ApiResponse::created(response))
}

pub async fn list_responses(
    State(state): State<AppState>,
    Query(query): Query<ResponseQuery>,
) -> Result<Response, PipelineError> {
    let responses = state.ingestor.list(&query).await?;
    Ok(ApiResponse::ok(responses))
}
