//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Phi Agents.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// No tool task matches the `(task_id, step_id)` pair.
    #[error("Tool task not found: task={task_id} step={step_id}")]
    ToolTaskNotFound { task_id: String, step_id: String },

    /// Local agent not found.
    #[error("Local agent not found: {0}")]
    LocalAgentNotFound(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// A second callback arrived for a tool task that already resolved.
    #[error("Tool task already resolved as {status}: task={task_id} step={step_id}")]
    ToolTaskAlreadyResolved {
        task_id: String,
        step_id: String,
        status: String,
    },

    /// The step id is already in use for this task.
    #[error("Duplicate step '{step_id}' for task {task_id}")]
    DuplicateStep { task_id: String, step_id: String },

    /// Metrics were already written for this task.
    #[error("Metrics already recorded for task {0}")]
    MetricsAlreadyRecorded(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
