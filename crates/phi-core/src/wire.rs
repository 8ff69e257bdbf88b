//! JSON bodies exchanged between the orchestrator and local agents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AgentId, Heartbeat, LocalAgentId, LocalAgentStatus, OrgId, TaskId, ToolTask, ToolTaskId,
};

/// Body of `POST /local-agents/heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub local_agent_id: Option<LocalAgentId>,
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub name: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub status: LocalAgentStatus,
}

impl From<HeartbeatRequest> for Heartbeat {
    fn from(req: HeartbeatRequest) -> Self {
        Self {
            local_agent_id: req.local_agent_id,
            agent_id: req.agent_id,
            org_id: req.org_id,
            name: req.name,
            capabilities: req.capabilities,
            status: req.status,
        }
    }
}

/// Response to a heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub id: LocalAgentId,
    pub status: LocalAgentStatus,
}

/// One unit of pending work as seen by a local agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolTask {
    pub id: ToolTaskId,
    pub step_id: String,
    pub task_id: TaskId,
    pub tool_name: String,
    pub payload: Value,
}

impl From<&ToolTask> for PendingToolTask {
    fn from(task: &ToolTask) -> Self {
        Self {
            id: task.id.clone(),
            step_id: task.step_id.clone(),
            task_id: task.task_id.clone(),
            tool_name: task.tool_name.clone(),
            payload: task.payload.clone(),
        }
    }
}

/// Response of `GET /local-agents/:id/pending-tasks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingTasksResponse {
    pub tasks: Vec<PendingToolTask>,
}

/// Body of `POST /tool-callbacks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallbackRequest {
    pub task_id: TaskId,
    pub step_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
