//! Workflow engine: fixed, linear pipelines of named stages.
//!
//! The workflow state is owned and moved from stage to stage. Each stage
//! publishes its progress checkpoint before it runs. The first stage that
//! fails ends the pipeline; the returned state carries the error.

mod dispatch;
pub mod warehouse_report;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use phi_core::{AgentId, CoreError, OrgId, RunCounters, Task, TaskId};

use crate::clients::{Analyzer, AnalyzerError, CoreApi, CoreApiError, DocChunk, Notifier};
use crate::config::DispatchConfig;
use crate::retry::RetryPolicy;
use crate::store::{LivenessRegistry, TaskStore, ToolQueue};

pub use dispatch::{DispatchOutcome, RemoteCall};
pub use warehouse_report::DAILY_WAREHOUSE_REPORT;

/// Everything a stage may talk to.
#[derive(Clone)]
pub struct WorkflowDeps {
    pub tasks: Arc<TaskStore>,
    pub tools: Arc<ToolQueue>,
    pub agents: Arc<LivenessRegistry>,
    pub core_api: Arc<dyn CoreApi>,
    pub analyzer: Arc<dyn Analyzer>,
    pub slack: Arc<dyn Notifier>,
    pub email: Arc<dyn Notifier>,
    pub retry: RetryPolicy,
    pub dispatch: DispatchConfig,
    /// Upper bound on one notification delivery.
    pub notify_timeout: Duration,
}

/// Where the external data of a run came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataSource {
    /// Not fetched yet.
    #[default]
    Unfetched,
    /// Returned by a local agent.
    LocalAgent,
    /// Predefined substitute used in degraded mode.
    Fallback,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unfetched => "unfetched",
            Self::LocalAgent => "local_agent",
            Self::Fallback => "fallback",
        }
    }
}

/// State threaded through the stages of one run.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub task_type: String,
    pub input: Value,
    pub system_prompt: String,
    pub agent_config: Value,
    pub doc_chunks: Vec<DocChunk>,
    pub external_data: Value,
    pub data_source: DataSource,
    pub analysis: Option<String>,
    /// Final structured result, becomes the Task output.
    pub report: Option<Value>,
    pub counters: RunCounters,
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn new(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            agent_id: task.agent_id.clone(),
            org_id: task.org_id.clone(),
            task_type: task.task_type.clone(),
            input: task.input.clone(),
            system_prompt: String::new(),
            agent_config: json!({}),
            doc_chunks: Vec::new(),
            external_data: json!({}),
            data_source: DataSource::Unfetched,
            analysis: None,
            report: None,
            counters: RunCounters::default(),
            error: None,
        }
    }

    pub fn output(&self) -> Value {
        self.report.clone().unwrap_or_else(|| json!({}))
    }
}

/// Progress published when a stage starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub progress: u8,
    pub label: &'static str,
}

/// A failure that ends the pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Error fetching docs: {0}")]
    ContextDocuments(#[source] CoreApiError),

    #[error("Error in LLM analysis: {0}")]
    Analysis(#[source] AnalyzerError),

    #[error("Error formatting report: {0}")]
    Format(String),

    #[error("Error recording progress: {0}")]
    Progress(#[source] CoreError),
}

/// A failed stage hands its state back alongside the error.
#[derive(Debug)]
pub struct StageFailure {
    pub state: Box<WorkflowState>,
    pub error: StageError,
}

impl StageFailure {
    pub fn new(state: WorkflowState, error: StageError) -> Self {
        Self {
            state: Box::new(state),
            error,
        }
    }
}

pub type StageResult = Result<WorkflowState, StageFailure>;

/// One named step of a pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn checkpoint(&self) -> Checkpoint;

    async fn run(&self, deps: &WorkflowDeps, state: WorkflowState) -> StageResult;
}

/// An ordered list of stages.
pub struct Workflow {
    stages: Vec<Box<dyn Stage>>,
}

impl Workflow {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, stopping at the first failure.
    pub async fn run(&self, deps: &WorkflowDeps, mut state: WorkflowState) -> WorkflowState {
        for stage in &self.stages {
            let checkpoint = stage.checkpoint();
            if let Err(e) = deps
                .tasks
                .update_progress(
                    &state.task_id,
                    i64::from(checkpoint.progress),
                    None,
                    Some(checkpoint.label),
                )
                .await
            {
                return Self::fail(stage.as_ref(), StageFailure::new(state, StageError::Progress(e)));
            }

            debug!(stage = stage.name(), progress = checkpoint.progress, "Stage started");
            state = match stage.run(deps, state).await {
                Ok(next) => next,
                Err(failure) => return Self::fail(stage.as_ref(), failure),
            };
        }
        state
    }

    fn fail(stage: &dyn Stage, failure: StageFailure) -> WorkflowState {
        error!(stage = stage.name(), error = %failure.error, "Stage failed");
        let mut state = *failure.state;
        state.error = Some(failure.error.to_string());
        state
    }
}

/// Errors that prevent a workflow from starting at all.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),
}

/// Registry of workflows by task type.
pub struct WorkflowEngine {
    deps: WorkflowDeps,
    workflows: HashMap<String, Workflow>,
}

impl WorkflowEngine {
    /// Engine with no workflows registered.
    pub fn new(deps: WorkflowDeps) -> Self {
        Self {
            deps,
            workflows: HashMap::new(),
        }
    }

    /// Engine with the built-in workflows registered.
    pub fn with_builtin(deps: WorkflowDeps) -> Self {
        let mut engine = Self::new(deps);
        engine.register(DAILY_WAREHOUSE_REPORT, warehouse_report::workflow());
        engine
    }

    pub fn register(&mut self, task_type: impl Into<String>, workflow: Workflow) {
        self.workflows.insert(task_type.into(), workflow);
    }

    pub fn supports(&self, task_type: &str) -> bool {
        self.workflows.contains_key(task_type)
    }

    /// Run the workflow registered for the task's type.
    pub async fn execute(&self, task: &Task) -> Result<WorkflowState, WorkflowError> {
        let workflow = self
            .workflows
            .get(&task.task_type)
            .ok_or_else(|| WorkflowError::UnknownTaskType(task.task_type.clone()))?;

        Ok(workflow.run(&self.deps, WorkflowState::new(task)).await)
    }
}
