//! AI analysis handlers.

use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::api::handlers::AppState;
use crate::error::PipelineError;

/// Run (or fetch the cached) per-response analysis.
pub async fn analyze_response(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let analysis = state.pipeline.analyze_response(response_id).await?;
    Ok(ApiResponse::ok(analysis))
}

/// Run the study-level synthesis, waiting on any in-flight run.
pub async fn synthesize_study(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let synthesis = state.pipeline.synthesize_study(study_id).await?;
    Ok(ApiResponse::ok(synthesis))
}

/// Read back the cached synthesis without triggering inference.
pub async fn get_synthesis(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    // 404 distinguishes "never synthesized or invalidated" from an error.
    match state.pipeline.cached_synthesis(study_id) {
        Some(synthesis) => Ok(ApiResponse::ok(synthesis)),
        None => Ok(ApiErrorResponse::build(
            axum::http::StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("no cached synthesis for study {study_id}"),
        )),
    }
}
