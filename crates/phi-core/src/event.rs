//! Task events: the append-only audit log of every Task and ToolTask transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ids::{EventId, TaskId};
use crate::{ToolTask, ToolTaskStatus};

/// An immutable log entry attached to a Task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: EventId,
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
    pub event_type: TaskEventType,
    pub payload: Value,
}

impl TaskEvent {
    /// Create a new task event stamped with the current time.
    pub fn new(task_id: TaskId, event_type: TaskEventType, payload: Value) -> Self {
        Self {
            id: EventId::generate(),
            task_id,
            timestamp: Utc::now(),
            event_type,
            payload,
        }
    }

    /// Create a PROGRESS_UPDATE event.
    pub fn progress_update(
        task_id: TaskId,
        progress: u8,
        eta_seconds: Option<u32>,
        current_step: Option<&str>,
    ) -> Self {
        Self::new(
            task_id,
            TaskEventType::ProgressUpdate,
            json!({
                "progress": progress,
                "eta_seconds": eta_seconds,
                "current_step": current_step,
            }),
        )
    }

    /// Create a TOOL_REQUESTED event for a freshly enqueued tool task.
    pub fn tool_requested(tool_task: &ToolTask) -> Self {
        Self::new(
            tool_task.task_id.clone(),
            TaskEventType::ToolRequested,
            json!({
                "tool_task_id": tool_task.id,
                "step_id": tool_task.step_id,
                "tool_name": tool_task.tool_name,
                "local_agent_id": tool_task.local_agent_id,
            }),
        )
    }

    /// Create a TOOL_COMPLETED or TOOL_FAILED event for a resolved tool task.
    pub fn tool_resolved(tool_task: &ToolTask) -> Self {
        let event_type = match tool_task.status {
            ToolTaskStatus::Failed => TaskEventType::ToolFailed,
            _ => TaskEventType::ToolCompleted,
        };
        Self::new(
            tool_task.task_id.clone(),
            event_type,
            json!({
                "step_id": tool_task.step_id,
                "tool_name": tool_task.tool_name,
                "error": tool_task.error,
            }),
        )
    }
}

/// Type of task event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskEventType {
    /// Task row created in PENDING.
    TaskCreated,
    /// Task moved to RUNNING and the pipeline was launched.
    WorkflowStarted,
    /// A stage reached its progress checkpoint.
    ProgressUpdate,
    /// A tool task was addressed to a local agent.
    ToolRequested,
    /// A local agent reported a tool result.
    ToolCompleted,
    /// A local agent reported a tool error.
    ToolFailed,
    /// The pipeline returned (with or without a stage error).
    WorkflowCompleted,
    /// The global deadline elapsed before the pipeline returned.
    WorkflowTimeout,
    /// The run could not execute or be finalized normally.
    WorkflowError,
}
