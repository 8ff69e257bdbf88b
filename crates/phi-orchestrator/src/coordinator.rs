//! Task run coordinator: creates tasks, runs their workflow in the background
//! under a global deadline, and always finalizes them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use phi_core::{
    AgentId, OrgId, RunCounters, StatusChange, Task, TaskEventType, TaskMetrics, TaskSpec,
};

use crate::clients::{CoreApi, CoreApiError};
use crate::retry::RetryPolicy;
use crate::store::TaskStore;
use crate::workflow::{WorkflowEngine, WorkflowState};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("could not load agent {agent_id}: {source}")]
    AgentLookup {
        agent_id: String,
        #[source]
        source: CoreApiError,
    },

    #[error("agent {0} has no org_id")]
    MissingOrg(String),
}

/// How the workflow part of a run ended.
enum RunOutcome {
    Finished(WorkflowState),
    TimedOut,
    Error(String),
}

#[derive(Clone)]
pub struct TaskRunCoordinator {
    tasks: Arc<TaskStore>,
    engine: Arc<WorkflowEngine>,
    core_api: Arc<dyn CoreApi>,
    retry: RetryPolicy,
    task_timeout: Duration,
}

impl TaskRunCoordinator {
    pub fn new(
        tasks: Arc<TaskStore>,
        engine: Arc<WorkflowEngine>,
        core_api: Arc<dyn CoreApi>,
        retry: RetryPolicy,
        task_timeout: Duration,
    ) -> Self {
        Self {
            tasks,
            engine,
            core_api,
            retry,
            task_timeout,
        }
    }

    /// Whether a workflow is registered for `task_type`.
    pub fn supports(&self, task_type: &str) -> bool {
        self.engine.supports(task_type)
    }

    /// Create a PENDING task and return it immediately; the run continues in
    /// the background.
    pub async fn run(&self, spec: TaskSpec) -> Task {
        self.submit(spec).await.0
    }

    /// Like [`run`](Self::run), also returning the handle of the background run.
    pub async fn submit(&self, spec: TaskSpec) -> (Task, JoinHandle<()>) {
        let task = self.tasks.create(spec).await;
        info!(
            task_id = %task.id,
            agent_id = %task.agent_id,
            task_type = %task.task_type,
            "Task created"
        );

        let span = info_span!(
            "task_run",
            task_id = %task.id,
            agent_id = %task.agent_id,
            org_id = %task.org_id
        );
        let handle = tokio::spawn(self.clone().execute(task.clone()).instrument(span));
        (task, handle)
    }

    /// Organization of an agent, read from its core API profile.
    pub async fn resolve_org(&self, agent_id: &AgentId) -> Result<OrgId, CoordinatorError> {
        let profile = self
            .retry
            .run_if("get_agent", CoreApiError::is_transient, || {
                self.core_api.get_agent(agent_id)
            })
            .await
            .map_err(|source| CoordinatorError::AgentLookup {
                agent_id: agent_id.to_string(),
                source,
            })?;

        profile
            .org_id
            .ok_or_else(|| CoordinatorError::MissingOrg(agent_id.to_string()))
    }

    async fn execute(self, task: Task) {
        let started = Instant::now();
        let outcome = self.drive(&task).await;
        self.finalize(&task, outcome, started.elapsed()).await;
    }

    async fn drive(&self, task: &Task) -> RunOutcome {
        if let Err(e) = self
            .tasks
            .transition(
                &task.id,
                StatusChange::Start,
                TaskEventType::WorkflowStarted,
                json!({ "task_type": task.task_type }),
            )
            .await
        {
            return RunOutcome::Error(e.to_string());
        }
        info!(task_type = %task.task_type, "Starting workflow");

        let engine = self.engine.clone();
        let running = task.clone();
        let mut handle = tokio::spawn(
            async move { engine.execute(&running).await }.in_current_span(),
        );

        match tokio::time::timeout(self.task_timeout, &mut handle).await {
            Ok(Ok(Ok(state))) => RunOutcome::Finished(state),
            Ok(Ok(Err(e))) => RunOutcome::Error(e.to_string()),
            Ok(Err(join_error)) => RunOutcome::Error(format!("Workflow aborted: {join_error}")),
            Err(_) => {
                handle.abort();
                RunOutcome::TimedOut
            }
        }
    }

    /// Record the terminal status, its event and the metrics row.
    async fn finalize(&self, task: &Task, outcome: RunOutcome, elapsed: Duration) {
        let timeout_secs = self.task_timeout.as_secs();
        let (change, event_type, payload, counters) = match outcome {
            RunOutcome::Finished(state) => match state.error.clone() {
                None => (
                    StatusChange::Succeed(state.output()),
                    TaskEventType::WorkflowCompleted,
                    json!({ "status": "SUCCESS" }),
                    state.counters,
                ),
                Some(error) => (
                    StatusChange::Fail(error),
                    TaskEventType::WorkflowCompleted,
                    json!({ "status": "FAILED" }),
                    state.counters,
                ),
            },
            RunOutcome::TimedOut => (
                StatusChange::Fail(format!("Task timed out after {timeout_secs} seconds")),
                TaskEventType::WorkflowTimeout,
                json!({ "timeout_seconds": timeout_secs }),
                RunCounters::default(),
            ),
            RunOutcome::Error(error) => (
                StatusChange::Fail(error.clone()),
                TaskEventType::WorkflowError,
                json!({ "error": error }),
                RunCounters::default(),
            ),
        };

        match self
            .tasks
            .transition(&task.id, change, event_type, payload)
            .await
        {
            Ok(done) => match &done.error {
                None => info!(duration_secs = elapsed.as_secs_f64(), "Workflow completed successfully"),
                Some(e) => error!(error = %e, duration_secs = elapsed.as_secs_f64(), "Workflow failed"),
            },
            Err(e) => error!(error = %e, "Failed to record final task status"),
        }

        let metrics = TaskMetrics {
            task_id: task.id.clone(),
            org_id: task.org_id.clone(),
            agent_id: task.agent_id.clone(),
            task_type: task.task_type.clone(),
            duration_seconds: elapsed.as_secs_f64(),
            llm_calls: counters.llm_calls,
            llm_tokens_used: counters.llm_tokens_used,
            tool_calls: counters.tool_calls,
            created_at: Utc::now(),
        };
        if let Err(e) = self.tasks.record_metrics(metrics).await {
            warn!(error = %e, "Failed to record task metrics");
        }
    }
}
