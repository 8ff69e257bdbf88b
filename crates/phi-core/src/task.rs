//! Task types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AgentId, CoreError, OrgId, TaskId, TaskStatus};

/// What a caller asks to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub agent_id: AgentId,
    pub org_id: OrgId,
    /// Workflow selector, e.g. `DAILY_WAREHOUSE_REPORT`.
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub input: Value,
}

/// One request to run a workflow for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub agent_id: AgentId,
    pub org_id: OrgId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: TaskStatus,
    pub input: Value,
    /// Set only on SUCCESS.
    pub output: Option<Value>,
    /// Set only on FAILED.
    pub error: Option<String>,
    /// Percent complete, always within 0..=100.
    pub progress: u8,
    /// Advisory estimate of remaining time.
    pub eta_seconds: Option<u32>,
    /// Human-readable label of the stage being executed.
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A status change requested for a Task.
///
/// Carrying the output or error inside the variant keeps the two mutually
/// exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Start,
    Succeed(Value),
    Fail(String),
}

impl StatusChange {
    pub fn target(&self) -> TaskStatus {
        match self {
            Self::Start => TaskStatus::Running,
            Self::Succeed(_) => TaskStatus::Success,
            Self::Fail(_) => TaskStatus::Failed,
        }
    }
}

impl Task {
    /// Create a new PENDING Task.
    pub fn new(spec: TaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            agent_id: spec.agent_id,
            org_id: spec.org_id,
            task_type: spec.task_type,
            status: TaskStatus::Pending,
            input: spec.input,
            output: None,
            error: None,
            progress: 0,
            eta_seconds: None,
            current_step: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status change, rejecting anything the lifecycle does not allow.
    pub fn apply(&mut self, change: StatusChange) -> Result<(), CoreError> {
        let next = change.target();
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        match change {
            StatusChange::Start => {}
            StatusChange::Succeed(output) => {
                self.output = Some(output);
                self.error = None;
            }
            StatusChange::Fail(error) => {
                self.error = Some(error);
                self.output = None;
            }
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a progress checkpoint and return the stored percentage.
    ///
    /// The value is clamped to 0..=100 and never moves backwards. Terminal
    /// tasks are frozen.
    pub fn record_progress(
        &mut self,
        progress: i64,
        eta_seconds: Option<u32>,
        current_step: Option<String>,
    ) -> Result<u8, CoreError> {
        if self.is_terminal() {
            return Err(CoreError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "PROGRESS_UPDATE".to_string(),
            });
        }

        let clamped = progress.clamp(0, 100) as u8;
        self.progress = self.progress.max(clamped);
        self.eta_seconds = eta_seconds;
        self.current_step = current_step;
        self.updated_at = Utc::now();
        Ok(self.progress)
    }
}
