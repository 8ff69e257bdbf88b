//! Stub collaborators and helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use phi_core::{AgentId, OrgId, TaskEvent, TaskEventType, TaskSpec};
use phi_orchestrator::clients::{
    AgentProfile, Analysis, AnalysisRequest, Analyzer, AnalyzerError, CoreApi, CoreApiError,
    DocChunk, Notification, Notifier, NotifyError,
};
use phi_orchestrator::{AppState, Config, Services};

pub const AGENT: &str = "agent-1";
pub const ORG: &str = "org-1";

pub struct StubCoreApi {
    pub profile: AgentProfile,
    pub fail_profile_with: Option<u16>,
    pub profile_calls: AtomicU32,
    pub fail_search_with: Option<u16>,
    pub search_calls: AtomicU32,
}

impl Default for StubCoreApi {
    fn default() -> Self {
        Self {
            profile: AgentProfile {
                org_id: Some(OrgId::new(ORG)),
                system_prompt: Some("You are the night-shift analyst.".into()),
                config: json!({
                    "communication": {
                        "can_slack": true,
                        "slack_channel": "#ops",
                        "can_email": true,
                        "default_recipients": ["ops@example.com"]
                    }
                }),
            },
            fail_profile_with: None,
            profile_calls: AtomicU32::new(0),
            fail_search_with: None,
            search_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl CoreApi for StubCoreApi {
    async fn get_agent(&self, _agent_id: &AgentId) -> Result<AgentProfile, CoreApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_profile_with {
            return Err(CoreApiError::Status {
                status,
                path: "/internal/agents/agent-1".into(),
            });
        }
        Ok(self.profile.clone())
    }

    async fn search_documents(
        &self,
        _agent_id: &AgentId,
        _query: &str,
        _top_k: u32,
    ) -> Result<Vec<DocChunk>, CoreApiError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_search_with {
            return Err(CoreApiError::Status {
                status,
                path: "/internal/agents/agent-1/documents/search-docs".into(),
            });
        }
        Ok(vec![DocChunk {
            id: Some("c1".into()),
            document_id: Some("d1".into()),
            chunk_text: "Packing stations must be cleared every two hours.".into(),
            metadata: json!({}),
        }])
    }
}

/// Answers every request with a fixed text after an optional delay.
#[derive(Default)]
pub struct StubAnalyzer {
    pub delay: Option<Duration>,
    pub requests: Mutex<Vec<AnalysisRequest>>,
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, AnalyzerError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Analysis {
            content: "Throughput is steady; packing station 3 is the bottleneck.".into(),
            tokens_used: 42,
        })
    }
}

/// Records every notification, optionally answering only after a delay.
#[derive(Default)]
pub struct RecordingNotifier {
    pub delay: Option<Duration>,
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub core_api: Arc<StubCoreApi>,
    pub analyzer: Arc<StubAnalyzer>,
    pub slack: Arc<RecordingNotifier>,
    pub email: Arc<RecordingNotifier>,
}

pub fn harness_with(config: Config, core_api: StubCoreApi, analyzer: StubAnalyzer) -> Harness {
    harness_with_slack(config, core_api, analyzer, RecordingNotifier::default())
}

pub fn harness_with_slack(
    config: Config,
    core_api: StubCoreApi,
    analyzer: StubAnalyzer,
    slack: RecordingNotifier,
) -> Harness {
    let core_api = Arc::new(core_api);
    let analyzer = Arc::new(analyzer);
    let slack = Arc::new(slack);
    let email = Arc::new(RecordingNotifier::default());
    let state = AppState::new(
        &config,
        Services {
            core_api: core_api.clone(),
            analyzer: analyzer.clone(),
            slack: slack.clone(),
            email: email.clone(),
        },
    );
    Harness {
        state,
        core_api,
        analyzer,
        slack,
        email,
    }
}

pub fn harness() -> Harness {
    harness_with(
        Config::default(),
        StubCoreApi::default(),
        StubAnalyzer::default(),
    )
}

pub fn report_spec() -> TaskSpec {
    spec("DAILY_WAREHOUSE_REPORT")
}

pub fn spec(task_type: &str) -> TaskSpec {
    TaskSpec {
        agent_id: AgentId::new(AGENT),
        org_id: OrgId::new(ORG),
        task_type: task_type.to_string(),
        input: json!({}),
    }
}

pub fn event_types(events: &[TaskEvent]) -> Vec<TaskEventType> {
    events.iter().map(|e| e.event_type).collect()
}

pub fn progress_values(events: &[TaskEvent]) -> Vec<u64> {
    events
        .iter()
        .filter(|e| e.event_type == TaskEventType::ProgressUpdate)
        .filter_map(|e| e.payload.get("progress").and_then(Value::as_u64))
        .collect()
}
