//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::clients::{
    Analyzer, AnalyzerError, CoreApi, CoreApiClient, CoreApiError, DigestAnalyzer, LogNotifier,
    Notifier, NotifyError, OpenAiAnalyzer, SlackWebhookNotifier, SmtpNotifier,
};
use crate::config::Config;
use crate::coordinator::TaskRunCoordinator;
use crate::store::{LivenessRegistry, TaskStore, ToolQueue};
use crate::workflow::{WorkflowDeps, WorkflowEngine};

/// Errors building the external service clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("core API client: {0}")]
    CoreApi(#[from] CoreApiError),

    #[error("analyzer: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("notifier: {0}")]
    Notify(#[from] NotifyError),
}

/// External collaborators of the workflows.
#[derive(Clone)]
pub struct Services {
    pub core_api: Arc<dyn CoreApi>,
    pub analyzer: Arc<dyn Analyzer>,
    pub slack: Arc<dyn Notifier>,
    pub email: Arc<dyn Notifier>,
}

impl Services {
    /// Build the production clients described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let core_api = CoreApiClient::new(
            &config.core_api_url,
            Duration::from_secs(config.core_api_timeout_secs),
        )?;

        let analyzer: Arc<dyn Analyzer> = match &config.openai_api_key {
            Some(key) => Arc::new(OpenAiAnalyzer::new(
                &config.openai_base_url,
                key,
                &config.openai_model,
            )?),
            None => {
                info!("No OpenAI API key configured, using offline digest analyzer");
                Arc::new(DigestAnalyzer)
            }
        };

        let slack: Arc<dyn Notifier> = match &config.slack_webhook_url {
            Some(url) => Arc::new(SlackWebhookNotifier::new(url, config.notify_timeout())?),
            None => Arc::new(LogNotifier),
        };

        let email: Arc<dyn Notifier> = match config.smtp() {
            Some(smtp) => Arc::new(SmtpNotifier::new(&smtp)?),
            None => {
                info!("No SMTP credentials configured, emails are only logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self {
            core_api: Arc::new(core_api),
            analyzer,
            slack,
            email,
        })
    }
}

/// Shared application state.
pub struct AppState {
    /// Tasks, their events and metrics.
    pub tasks: Arc<TaskStore>,

    /// Tool tasks addressed to local agents.
    pub tools: Arc<ToolQueue>,

    /// Local agents known by heartbeat.
    pub agents: Arc<LivenessRegistry>,

    /// Starts and finalizes workflow runs.
    pub coordinator: TaskRunCoordinator,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(config: &Config, services: Services) -> Arc<Self> {
        let tasks = Arc::new(TaskStore::new());
        let tools = Arc::new(ToolQueue::new(tasks.clone()));
        let agents = Arc::new(LivenessRegistry::new(config.staleness()));

        let deps = WorkflowDeps {
            tasks: tasks.clone(),
            tools: tools.clone(),
            agents: agents.clone(),
            core_api: services.core_api.clone(),
            analyzer: services.analyzer,
            slack: services.slack,
            email: services.email,
            retry: config.retry,
            dispatch: config.dispatch,
            notify_timeout: config.notify_timeout(),
        };
        let engine = Arc::new(WorkflowEngine::with_builtin(deps));

        let coordinator = TaskRunCoordinator::new(
            tasks.clone(),
            engine,
            services.core_api,
            config.retry,
            config.task_timeout(),
        );

        Arc::new(Self {
            tasks,
            tools,
            agents,
            coordinator,
        })
    }
}
