//! Units of remote work addressed to a local agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CoreError, LocalAgentId, TaskId, ToolTaskId, ToolTaskStatus};

/// What a workflow stage wants a local agent to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub task_id: TaskId,
    pub local_agent_id: LocalAgentId,
    /// Workflow step identifier, unique within the owning task.
    pub step_id: String,
    pub tool_name: String,
    pub payload: Value,
}

/// How a tool task resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Completed(Value),
    Failed(String),
}

impl ToolOutcome {
    /// Interpret a worker callback: any error wins over a result.
    pub fn from_callback(result: Option<Value>, error: Option<String>) -> Self {
        match error {
            Some(error) => Self::Failed(error),
            None => Self::Completed(result.unwrap_or(Value::Null)),
        }
    }
}

/// A tool invocation owned by exactly one Task and addressed to exactly one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolTask {
    pub id: ToolTaskId,
    pub task_id: TaskId,
    pub local_agent_id: LocalAgentId,
    pub step_id: String,
    pub tool_name: String,
    pub payload: Value,
    pub status: ToolTaskStatus,
    /// Set only on COMPLETED.
    pub result: Option<Value>,
    /// Set only on FAILED.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolTask {
    /// Create a new PENDING tool task.
    pub fn new(request: ToolRequest) -> Self {
        Self {
            id: ToolTaskId::generate(),
            task_id: request.task_id,
            local_agent_id: request.local_agent_id,
            step_id: request.step_id,
            tool_name: request.tool_name,
            payload: request.payload,
            status: ToolTaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move from PENDING to a terminal status. A tool task resolves once.
    pub fn resolve(&mut self, outcome: ToolOutcome) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::ToolTaskAlreadyResolved {
                task_id: self.task_id.to_string(),
                step_id: self.step_id.clone(),
                status: self.status.to_string(),
            });
        }

        match outcome {
            ToolOutcome::Completed(result) => {
                self.status = ToolTaskStatus::Completed;
                self.result = Some(result);
            }
            ToolOutcome::Failed(error) => {
                self.status = ToolTaskStatus::Failed;
                self.error = Some(error);
            }
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
