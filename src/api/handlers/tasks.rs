//! Task sequencing handlers.

use axum::extract::{Path, State};
use axum::response::Response;
use crate::api::extract::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::envelope::ApiResponse;
use crate::api::handlers::AppState;
use crate::error::PipelineError;
use crate::types::{NewTask, TaskPatch, TaskType};

/// Body for `POST /studies/:id/tasks`; the study comes from the path.
#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub title: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub order_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    pub task_ids: Vec<Uuid>,
}

pub async fn create_task(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
    Json(body): Json<CreateTaskBody>,
) -> Result<Response, PipelineError> {
    let task = state
        .sequencer
        .add_task(NewTask {
            study_id,
            task_type: body.task_type,
            title: body.title,
            instructions: body.instructions,
            order_index: body.order_index,
        })
        .await?;
    Ok(ApiResponse::created(task))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let tasks = state.sequencer.list(study_id).await?;
    Ok(ApiResponse::ok(tasks))
}

pub async fn reorder_tasks(
    State(state): State<AppState>,
    Path(study_id): Path<Uuid>,
    Json(body): Json<ReorderBody>,
) -> Result<Response, PipelineError> {
    state.sequencer.reorder(study_id, &body.task_ids).await?;
    let tasks = state.sequencer.list(study_id).await?;
    Ok(ApiResponse::ok(tasks))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let task = state.sequencer.get(task_id).await?;
    Ok(ApiResponse::ok(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<Response, PipelineError> {
    let task = state.sequencer.update(task_id, patch).await?;
    Ok(ApiResponse::ok(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Response, PipelineError> {
    let deleted = state.sequencer.delete(task_id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "deleted": deleted })))
}
