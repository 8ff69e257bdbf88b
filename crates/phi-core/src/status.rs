//! Status enums for Tasks, ToolTasks, and LocalAgents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Status of a Task run by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task created, workflow not started yet.
    #[default]
    Pending,
    /// Workflow engine is executing the pipeline.
    Running,
    /// Pipeline finished and produced an output.
    Success,
    /// Pipeline failed, timed out, or bookkeeping failed.
    Failed,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Whether a task in this status may move to `next`.
    ///
    /// `Pending -> Failed` is allowed so a run that never got started can
    /// still be closed out.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Success)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a unit of remote work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolTaskStatus {
    /// Waiting for the addressed local agent to pick it up and call back.
    #[default]
    Pending,
    /// Callback delivered a result.
    Completed,
    /// Callback delivered an error.
    Failed,
}

impl ToolTaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ToolTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Liveness status a local agent reports about itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalAgentStatus {
    /// Known to the orchestrator but not (yet) accepting work.
    Enrolled,
    /// Polling for work.
    #[default]
    Active,
    /// Shut down or disconnected on purpose.
    Offline,
}

impl LocalAgentStatus {
    /// Returns true if tool tasks may be addressed to the agent.
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrolled => "ENROLLED",
            Self::Active => "ACTIVE",
            Self::Offline => "OFFLINE",
        }
    }
}

impl fmt::Display for LocalAgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalAgentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ENROLLED" => Ok(Self::Enrolled),
            "ACTIVE" => Ok(Self::Active),
            "OFFLINE" => Ok(Self::Offline),
            other => Err(CoreError::InvalidInput(format!(
                "unknown local agent status: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_task_statuses_reject_transitions() {
        for terminal in [TaskStatus::Success, TaskStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                TaskStatus::Pending,
                TaskStatus::Running,
                TaskStatus::Success,
                TaskStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_pending_cannot_skip_to_success() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Success));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert_eq!(
            serde_json::to_string(&ToolTaskStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert_eq!(
            "active".parse::<LocalAgentStatus>().unwrap(),
            LocalAgentStatus::Active
        );
        assert!("sleeping".parse::<LocalAgentStatus>().is_err());
    }
}
