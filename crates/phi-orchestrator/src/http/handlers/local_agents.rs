//! Local agent protocol handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use phi_core::wire::{
    Ack, HeartbeatRequest, HeartbeatResponse, PendingTasksResponse, PendingToolTask,
    ToolCallbackRequest,
};
use phi_core::{LocalAgentId, ToolOutcome};

use crate::http::ApiError;
use crate::state::AppState;

/// Register or refresh a local agent.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HeartbeatRequest>,
) -> Json<HeartbeatResponse> {
    let agent = state.agents.heartbeat(req.into()).await;
    Json(HeartbeatResponse {
        id: agent.id,
        status: agent.status,
    })
}

/// Pending tool work for one local agent.
pub async fn pending_tasks(
    State(state): State<Arc<AppState>>,
    Path(local_agent_id): Path<String>,
) -> Json<PendingTasksResponse> {
    let pending = state
        .tools
        .list_pending(&LocalAgentId::new(local_agent_id))
        .await;

    Json(PendingTasksResponse {
        tasks: pending.iter().map(PendingToolTask::from).collect(),
    })
}

/// Tool result reported by a local agent.
pub async fn tool_callback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ToolCallbackRequest>,
) -> Result<Json<Ack>, ApiError> {
    info!(
        task_id = %req.task_id,
        step_id = %req.step_id,
        tool_name = %req.tool_name,
        failed = req.error.is_some(),
        "Tool callback received"
    );

    state
        .tools
        .complete(
            &req.task_id,
            &req.step_id,
            ToolOutcome::from_callback(req.result, req.error),
        )
        .await?;

    Ok(Json(Ack::ok()))
}
