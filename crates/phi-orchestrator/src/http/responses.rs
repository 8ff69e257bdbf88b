//! HTTP request and response types.
//!
//! Local agent protocol bodies live in `phi_core::wire`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use phi_core::{OrgId, Task, TaskEvent};

// ============================================================================
// Task types
// ============================================================================

/// Body of `POST /agents/:agent_id/run-task`.
#[derive(Debug, Deserialize)]
pub struct RunTaskRequest {
    #[serde(rename = "type")]
    pub task_type: String,

    #[serde(default)]
    pub input: Value,

    /// Resolved from the agent profile when absent.
    #[serde(default)]
    pub org_id: Option<OrgId>,
}

/// A task with its event log.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskDetailResponse {
    #[serde(flatten)]
    pub task: Task,

    pub events: Vec<TaskEvent>,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
