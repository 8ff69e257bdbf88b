//! Work loop and heartbeat loop of a local agent.
//!
//! Both loops run until the cancellation token fires. A failed poll, tool run,
//! callback or heartbeat is logged and the loop carries on with its next tick.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use phi_core::wire::{HeartbeatRequest, PendingToolTask, ToolCallbackRequest};
use phi_core::{AgentId, LocalAgentId, LocalAgentStatus, OrgId};

use crate::client::{ClientError, DispatchApi};
use crate::config::{AgentFile, WorkerConfig};
use crate::tools::ToolRegistry;

/// Who this process reports as.
#[derive(Debug, Clone)]
pub struct Identity {
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub name: String,
    pub capabilities: Value,
}

impl Identity {
    /// Identity from the agent file. Capabilities list the tools that
    /// actually loaded, not every key in the file.
    pub fn new(file: &AgentFile, tools: &ToolRegistry) -> Self {
        Self {
            agent_id: file.agent_id.clone(),
            org_id: file.org_id.clone(),
            name: file.name.clone(),
            capabilities: json!({ "tools": tools.names() }),
        }
    }

    fn heartbeat(&self, local_agent_id: Option<LocalAgentId>) -> HeartbeatRequest {
        HeartbeatRequest {
            local_agent_id,
            agent_id: self.agent_id.clone(),
            org_id: self.org_id.clone(),
            name: self.name.clone(),
            capabilities: self.capabilities.clone(),
            status: LocalAgentStatus::Active,
        }
    }
}

/// A registered local agent.
pub struct Worker {
    api: Arc<dyn DispatchApi>,
    tools: ToolRegistry,
    identity: Identity,
    config: WorkerConfig,
    local_agent_id: watch::Sender<LocalAgentId>,
}

impl Worker {
    /// Register with the orchestrator, retrying with doubling delays.
    pub async fn register(
        api: Arc<dyn DispatchApi>,
        tools: ToolRegistry,
        identity: Identity,
        config: WorkerConfig,
    ) -> Result<Self, ClientError> {
        let mut delay = config.register_delay;
        let mut attempt = 1;

        let response = loop {
            match api.heartbeat(&identity.heartbeat(None)).await {
                Ok(response) => break response,
                Err(e) if attempt < config.register_attempts => {
                    warn!(
                        attempt,
                        max_attempts = config.register_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Registration failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, "Registration failed");
                    return Err(e);
                }
            }
        };

        info!(
            local_agent_id = %response.id,
            agent_id = %identity.agent_id,
            tools = ?tools.names(),
            "Registered with orchestrator"
        );

        let (local_agent_id, _) = watch::channel(response.id);
        Ok(Self {
            api,
            tools,
            identity,
            config,
            local_agent_id,
        })
    }

    pub fn local_agent_id(&self) -> LocalAgentId {
        self.local_agent_id.borrow().clone()
    }

    /// Run one tool task and build its callback. Never fails: errors become
    /// the callback's `error`.
    pub async fn process(&self, task: &PendingToolTask) -> ToolCallbackRequest {
        let outcome = match self.tools.get(&task.tool_name) {
            None => Err(format!("Tool {} not available", task.tool_name)),
            Some(tool) => tool.execute(&task.payload).await.map_err(|e| e.to_string()),
        };

        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => {
                warn!(
                    task_id = %task.task_id,
                    step_id = %task.step_id,
                    tool_name = %task.tool_name,
                    error = %error,
                    "Tool execution failed"
                );
                (None, Some(error))
            }
        };

        ToolCallbackRequest {
            task_id: task.task_id.clone(),
            step_id: task.step_id.clone(),
            tool_name: task.tool_name.clone(),
            result,
            error,
        }
    }

    /// Fetch pending work once and report every task. Returns how many tasks
    /// were handled.
    pub async fn poll_once(&self) -> Result<usize, ClientError> {
        let local_agent_id = self.local_agent_id();
        let tasks = self.api.pending_tasks(&local_agent_id).await?;
        if !tasks.is_empty() {
            debug!(count = tasks.len(), "Pending tool tasks");
        }

        for task in &tasks {
            let callback = self.process(task).await;
            if let Err(e) = self.api.send_callback(&callback).await {
                error!(
                    task_id = %task.task_id,
                    step_id = %task.step_id,
                    error = %e,
                    "Failed to send tool callback"
                );
            }
        }
        Ok(tasks.len())
    }

    /// Poll for work every `poll_interval` until cancelled.
    pub async fn run_work_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "Error in work loop");
                    }
                }
            }
        }
        info!("Work loop stopped");
    }

    /// Send a heartbeat every `heartbeat_interval` until cancelled.
    ///
    /// If the orchestrator answers with a different id (it lost our record),
    /// the work loop switches to the new id.
    pub async fn run_heartbeat_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Registration just reported in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.heartbeat_once().await,
            }
        }
        info!("Heartbeat loop stopped");
    }

    async fn heartbeat_once(&self) {
        let current = self.local_agent_id();
        match self
            .api
            .heartbeat(&self.identity.heartbeat(Some(current.clone())))
            .await
        {
            Ok(response) if response.id != current => {
                warn!(
                    previous = %current,
                    local_agent_id = %response.id,
                    "Orchestrator assigned a new local agent id"
                );
                self.local_agent_id.send_replace(response.id);
            }
            Ok(_) => debug!(local_agent_id = %current, "Heartbeat sent"),
            Err(e) => warn!(error = %e, "Heartbeat error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use phi_core::wire::HeartbeatResponse;
    use phi_core::{TaskId, ToolTaskId};

    use crate::tools::{FileTool, Tool, ToolError};

    /// In-memory orchestrator.
    #[derive(Default)]
    struct FakeOrchestrator {
        pending: Mutex<Vec<PendingToolTask>>,
        callbacks: Mutex<Vec<ToolCallbackRequest>>,
        heartbeats: Mutex<Vec<HeartbeatRequest>>,
        fail_heartbeats: AtomicU32,
        fail_polls: AtomicU32,
        fail_callback_for_step: Option<String>,
        assign_id: Mutex<Option<String>>,
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn unavailable(path: &str) -> ClientError {
        ClientError::Status {
            status: 503,
            path: path.to_string(),
        }
    }

    #[async_trait]
    impl DispatchApi for FakeOrchestrator {
        async fn heartbeat(
            &self,
            request: &HeartbeatRequest,
        ) -> Result<HeartbeatResponse, ClientError> {
            self.heartbeats.lock().unwrap().push(request.clone());
            if take_failure(&self.fail_heartbeats) {
                return Err(unavailable("/local-agents/heartbeat"));
            }
            let id = match self.assign_id.lock().unwrap().take() {
                Some(id) => LocalAgentId::new(id),
                None => request
                    .local_agent_id
                    .clone()
                    .unwrap_or_else(|| LocalAgentId::new("la-1")),
            };
            Ok(HeartbeatResponse {
                id,
                status: LocalAgentStatus::Active,
            })
        }

        async fn pending_tasks(
            &self,
            _local_agent_id: &LocalAgentId,
        ) -> Result<Vec<PendingToolTask>, ClientError> {
            if take_failure(&self.fail_polls) {
                return Err(unavailable("/local-agents/la-1/pending-tasks"));
            }
            Ok(std::mem::take(&mut *self.pending.lock().unwrap()))
        }

        async fn send_callback(&self, callback: &ToolCallbackRequest) -> Result<(), ClientError> {
            if self.fail_callback_for_step.as_deref() == Some(callback.step_id.as_str()) {
                return Err(unavailable("/tool-callbacks"));
            }
            self.callbacks.lock().unwrap().push(callback.clone());
            Ok(())
        }
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, payload: &Value) -> Result<Value, ToolError> {
            if payload.get("fail").is_some() {
                return Err(ToolError::InvalidPayload("asked to fail".into()));
            }
            Ok(json!({ "echo": payload }))
        }
    }

    fn pending(step_id: &str, tool_name: &str, payload: Value) -> PendingToolTask {
        PendingToolTask {
            id: ToolTaskId::new(format!("tt-{step_id}")),
            step_id: step_id.to_string(),
            task_id: TaskId::new("task-1"),
            tool_name: tool_name.to_string(),
            payload,
        }
    }

    fn identity() -> Identity {
        Identity {
            agent_id: AgentId::new("agent-1"),
            org_id: OrgId::new("org-1"),
            name: "dock-pc".into(),
            capabilities: json!({ "tools": ["echo"] }),
        }
    }

    async fn worker(api: Arc<FakeOrchestrator>) -> Arc<Worker> {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Echo));
        let worker = Worker::register(api, tools, identity(), WorkerConfig::default())
            .await
            .unwrap();
        Arc::new(worker)
    }

    #[test]
    fn test_identity_declares_only_loaded_tools() {
        let file = AgentFile::from_yaml(
            "agent_id: agent-1\norg_id: org-1\nname: dock-pc\ntools:\n  - key: file\n  - key: erp\n  - key: http\n",
        )
        .unwrap();
        let tools = ToolRegistry::from_specs(&file.tools).unwrap();

        let identity = Identity::new(&file, &tools);

        assert_eq!(identity.capabilities, json!({ "tools": ["file", "http"] }));
        assert_eq!(identity.heartbeat(None).capabilities, identity.capabilities);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_not_raised() {
        let api = Arc::new(FakeOrchestrator::default());
        let worker = worker(api).await;

        let callback = worker.process(&pending("s1", "web", json!({}))).await;

        assert!(callback.result.is_none());
        assert_eq!(callback.error.as_deref(), Some("Tool web not available"));
        assert_eq!(callback.step_id, "s1");
    }

    #[tokio::test]
    async fn test_poll_once_reports_every_task() {
        let api = Arc::new(FakeOrchestrator {
            fail_callback_for_step: Some("s1".into()),
            ..FakeOrchestrator::default()
        });
        *api.pending.lock().unwrap() = vec![
            pending("s1", "echo", json!({ "n": 1 })),
            pending("s2", "echo", json!({ "fail": true })),
            pending("s3", "echo", json!({ "n": 3 })),
        ];
        let worker = worker(api.clone()).await;

        let handled = worker.poll_once().await.unwrap();
        assert_eq!(handled, 3);

        let callbacks = api.callbacks.lock().unwrap();
        assert_eq!(callbacks.len(), 2);
        assert_eq!(callbacks[0].step_id, "s2");
        assert_eq!(callbacks[0].error.as_deref(), Some("invalid payload: asked to fail"));
        assert_eq!(callbacks[1].result, Some(json!({ "echo": { "n": 3 } })));
    }

    #[tokio::test]
    async fn test_file_tool_through_worker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wms.json"), r#"{"throughput": 1100}"#).unwrap();

        let api = Arc::new(FakeOrchestrator::default());
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(FileTool::new(dir.path())));
        let worker = Worker::register(api, tools, identity(), WorkerConfig::default())
            .await
            .unwrap();

        let callback = worker
            .process(&pending("fetch_wms_data", "file", json!({ "path": "wms.json" })))
            .await;
        assert_eq!(callback.result, Some(json!({ "throughput": 1100 })));
        assert!(callback.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_retries_then_succeeds() {
        let api = Arc::new(FakeOrchestrator {
            fail_heartbeats: AtomicU32::new(2),
            ..FakeOrchestrator::default()
        });

        let worker = worker(api.clone()).await;

        assert_eq!(worker.local_agent_id().as_str(), "la-1");
        let heartbeats = api.heartbeats.lock().unwrap();
        assert_eq!(heartbeats.len(), 3);
        assert!(heartbeats.iter().all(|h| h.local_agent_id.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_gives_up() {
        let api = Arc::new(FakeOrchestrator {
            fail_heartbeats: AtomicU32::new(10),
            ..FakeOrchestrator::default()
        });

        let result = Worker::register(api.clone(), ToolRegistry::new(), identity(), WorkerConfig::default()).await;

        assert!(result.is_err());
        assert_eq!(api.heartbeats.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_loop_survives_poll_failures() {
        let api = Arc::new(FakeOrchestrator {
            fail_polls: AtomicU32::new(2),
            ..FakeOrchestrator::default()
        });
        *api.pending.lock().unwrap() = vec![pending("s1", "echo", json!({}))];
        let worker = worker(api.clone()).await;

        let cancel = CancellationToken::new();
        let running = {
            let worker = worker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { worker.run_work_loop(cancel).await })
        };

        // Polls at 0s and 5s fail, the one at 10s delivers.
        tokio::time::sleep(Duration::from_secs(12)).await;
        cancel.cancel();
        running.await.unwrap();

        assert_eq!(api.callbacks.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_loop_keeps_going_after_errors() {
        let api = Arc::new(FakeOrchestrator::default());
        let worker = worker(api.clone()).await;
        api.fail_heartbeats.store(1, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let running = {
            let worker = worker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { worker.run_heartbeat_loop(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(95)).await;
        cancel.cancel();
        running.await.unwrap();

        let heartbeats = api.heartbeats.lock().unwrap();
        // Registration plus ticks at 30s, 60s and 90s.
        assert_eq!(heartbeats.len(), 4);
        assert!(heartbeats[1..]
            .iter()
            .all(|h| h.local_agent_id.as_ref().map(|id| id.as_str()) == Some("la-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_adopts_reassigned_id() {
        let api = Arc::new(FakeOrchestrator::default());
        let worker = worker(api.clone()).await;
        *api.assign_id.lock().unwrap() = Some("la-2".into());

        let cancel = CancellationToken::new();
        let running = {
            let worker = worker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { worker.run_heartbeat_loop(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(31)).await;
        cancel.cancel();
        running.await.unwrap();

        assert_eq!(worker.local_agent_id().as_str(), "la-2");
    }
}
