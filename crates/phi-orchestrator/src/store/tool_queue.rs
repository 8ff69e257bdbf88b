//! Tool dispatch queue: remote work addressed to local agents.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use phi_core::{
    CoreError, LocalAgentId, TaskEvent, TaskId, ToolOutcome, ToolRequest, ToolTask, ToolTaskId,
    ToolTaskStatus,
};

use super::TaskStore;

/// How a wait on a tool task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Completed(Value),
    Failed(String),
    /// The wait gave up. The tool task itself stays PENDING and may still
    /// resolve later.
    TimedOut,
}

/// Queue of ToolTasks. The callback path (`complete`) is the only writer after
/// enqueue.
pub struct ToolQueue {
    tasks: Arc<TaskStore>,
    entries: RwLock<Vec<ToolTask>>,
    resolved: watch::Sender<u64>,
}

impl ToolQueue {
    pub fn new(tasks: Arc<TaskStore>) -> Self {
        let (resolved, _) = watch::channel(0);
        Self {
            tasks,
            entries: RwLock::new(Vec::new()),
            resolved,
        }
    }

    /// Queue a PENDING tool task for a local agent and log TOOL_REQUESTED.
    pub async fn enqueue(&self, request: ToolRequest) -> Result<ToolTask, CoreError> {
        let mut entries = self.entries.write().await;
        if entries
            .iter()
            .any(|t| t.task_id == request.task_id && t.step_id == request.step_id)
        {
            return Err(CoreError::DuplicateStep {
                task_id: request.task_id.to_string(),
                step_id: request.step_id,
            });
        }

        let tool_task = ToolTask::new(request);
        self.tasks.append(TaskEvent::tool_requested(&tool_task)).await?;
        entries.push(tool_task.clone());

        info!(
            tool_task_id = %tool_task.id,
            task_id = %tool_task.task_id,
            step_id = %tool_task.step_id,
            local_agent_id = %tool_task.local_agent_id,
            tool_name = %tool_task.tool_name,
            "Tool task enqueued"
        );
        Ok(tool_task)
    }

    /// All PENDING tool tasks addressed to `local_agent_id`, oldest first.
    pub async fn list_pending(&self, local_agent_id: &LocalAgentId) -> Vec<ToolTask> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|t| &t.local_agent_id == local_agent_id && t.status == ToolTaskStatus::Pending)
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &ToolTaskId) -> Option<ToolTask> {
        self.entries.read().await.iter().find(|t| &t.id == id).cloned()
    }

    /// Resolve the tool task identified by `(task_id, step_id)`.
    ///
    /// A second completion is rejected and the first result is kept.
    pub async fn complete(
        &self,
        task_id: &TaskId,
        step_id: &str,
        outcome: ToolOutcome,
    ) -> Result<ToolTask, CoreError> {
        let mut entries = self.entries.write().await;
        let slot = entries
            .iter_mut()
            .find(|t| &t.task_id == task_id && t.step_id == step_id)
            .ok_or_else(|| CoreError::ToolTaskNotFound {
                task_id: task_id.to_string(),
                step_id: step_id.to_string(),
            })?;

        let mut resolved = slot.clone();
        resolved.resolve(outcome)?;
        self.tasks.append(TaskEvent::tool_resolved(&resolved)).await?;
        *slot = resolved.clone();
        drop(entries);

        self.resolved.send_modify(|generation| *generation += 1);
        info!(
            tool_task_id = %resolved.id,
            task_id = %resolved.task_id,
            step_id = %resolved.step_id,
            status = %resolved.status,
            "Tool task resolved"
        );
        Ok(resolved)
    }

    /// Wait until the tool task leaves PENDING or `max_wait` elapses.
    ///
    /// The stored status is re-read at least every `poll_interval`; a callback
    /// wakes the waiter early.
    pub async fn wait_for_resolution(
        &self,
        id: &ToolTaskId,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<Resolution, CoreError> {
        let deadline = Instant::now() + max_wait;
        let mut changes = self.resolved.subscribe();

        loop {
            let task = self
                .get(id)
                .await
                .ok_or_else(|| CoreError::InvalidInput(format!("unknown tool task {id}")))?;

            match task.status {
                ToolTaskStatus::Completed => {
                    return Ok(Resolution::Completed(task.result.unwrap_or(Value::Null)))
                }
                ToolTaskStatus::Failed => {
                    return Ok(Resolution::Failed(
                        task.error.unwrap_or_else(|| "tool failed".to_string()),
                    ))
                }
                ToolTaskStatus::Pending => {}
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(tool_task_id = %id, "Gave up waiting for tool task");
                return Ok(Resolution::TimedOut);
            }

            let wait = poll_interval.min(deadline - now);
            let _ = tokio::time::timeout(wait, changes.changed()).await;
        }
    }

    pub async fn count_by_status(&self) -> HashMap<ToolTaskStatus, usize> {
        let entries = self.entries.read().await;
        let mut counts = HashMap::new();
        for task in entries.iter() {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        counts
    }
}
