//! Service health endpoint.

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::api::envelope::ApiResponse;
use crate::api::handlers::AppState;
use crate::analysis::AnalysisStats;
use crate::error::PipelineError;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub analysis: AnalysisStats,
}

pub async fn health(State(state): State<AppState>) -> Result<Response, PipelineError> {
    Ok(ApiResponse::ok(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        analysis: state.pipeline.stats(),
    }))
}
