//! Task run handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use phi_core::{AgentId, Task, TaskId, TaskMetrics, TaskSpec};

use crate::http::responses::{RunTaskRequest, TaskDetailResponse};
use crate::http::ApiError;
use crate::state::AppState;

/// Start a workflow run. Returns the PENDING task without waiting for it.
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(req): Json<RunTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if req.task_type.trim().is_empty() {
        return Err(ApiError::BadRequest("type must not be empty".to_string()));
    }
    if !state.coordinator.supports(&req.task_type) {
        return Err(ApiError::BadRequest(format!(
            "Unknown task type: {}",
            req.task_type
        )));
    }

    let agent_id = AgentId::new(agent_id);
    let org_id = match req.org_id {
        Some(org_id) => org_id,
        None => state.coordinator.resolve_org(&agent_id).await?,
    };

    let task = state
        .coordinator
        .run(TaskSpec {
            agent_id,
            org_id,
            task_type: req.task_type,
            input: req.input,
        })
        .await;

    info!(task_id = %task.id, "Run requested");
    Ok((StatusCode::ACCEPTED, Json(task)))
}

/// Task detail with its ordered event log.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskDetailResponse>, ApiError> {
    let (task, events) = state
        .tasks
        .get_with_events(&TaskId::new(task_id.clone()))
        .await
        .ok_or(phi_core::CoreError::TaskNotFound(task_id))?;

    Ok(Json(TaskDetailResponse { task, events }))
}

/// Run summary, available once the task is terminal.
pub async fn get_task_metrics(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskMetrics>, ApiError> {
    state
        .tasks
        .metrics(&TaskId::new(task_id.clone()))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No metrics for task {task_id}")))
}
