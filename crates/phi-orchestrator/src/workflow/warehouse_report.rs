//! Daily warehouse report workflow.
//!
//! load configuration -> fetch context documents -> fetch warehouse data (on
//! the agent's local machine) -> analyze -> format report -> notify.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::dispatch::{call_remote, DispatchOutcome, RemoteCall};
use super::{
    Checkpoint, DataSource, Stage, StageError, StageFailure, StageResult, Workflow, WorkflowDeps,
    WorkflowState,
};
use crate::clients::{AnalysisRequest, CoreApiError, Notification, Notifier};

/// Task type served by this workflow.
pub const DAILY_WAREHOUSE_REPORT: &str = "DAILY_WAREHOUSE_REPORT";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a warehouse analyst.";

const DOCS_QUERY: &str = "warehouse daily performance SOP procedures";
const DOCS_TOP_K: u32 = 5;
const DOCS_RETRY_DELAY: Duration = Duration::from_millis(500);

const PROMPT_CHUNKS: usize = 3;
const PROMPT_CHUNK_CHARS: usize = 200;
const SUMMARY_CHARS: usize = 500;

pub const WMS_STEP_ID: &str = "fetch_wms_data";
const WMS_TOOL: &str = "db";
const WMS_QUERY: &str = "\
SELECT
    DATE(created_at) as date,
    COUNT(*) as throughput,
    SUM(CASE WHEN type = 'pick' THEN 1 ELSE 0 END) as picks,
    SUM(CASE WHEN type = 'pack' THEN 1 ELSE 0 END) as packs
FROM orders
WHERE created_at >= CURRENT_DATE - INTERVAL '1 day'
GROUP BY DATE(created_at)
ORDER BY date DESC
LIMIT 1";

/// Warehouse data used when no local agent delivers any.
pub fn fallback_wms_data() -> Value {
    json!({
        "date": "2024-01-15",
        "throughput": 1250,
        "picks": 850,
        "packs": 400,
        "anomalies": [
            { "type": "delayed_pick", "count": 3 },
            { "type": "missing_item", "count": 1 }
        ],
        "bottlenecks": ["packing_station_3"]
    })
}

pub fn workflow() -> Workflow {
    Workflow::new(vec![
        Box::new(LoadConfiguration),
        Box::new(FetchContextDocuments),
        Box::new(FetchWarehouseData),
        Box::new(Analyze),
        Box::new(FormatReport),
        Box::new(Notify),
    ])
}

/// Loads the agent's system prompt and configuration. Falls back to defaults
/// when the core API is unreachable.
pub struct LoadConfiguration;

#[async_trait]
impl Stage for LoadConfiguration {
    fn name(&self) -> &'static str {
        "load_agent_config"
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            progress: 10,
            label: "Loading agent configuration",
        }
    }

    async fn run(&self, deps: &WorkflowDeps, mut state: WorkflowState) -> StageResult {
        let profile = deps
            .retry
            .run_if("get_agent", CoreApiError::is_transient, || {
                deps.core_api.get_agent(&state.agent_id)
            })
            .await;

        match profile {
            Ok(profile) => {
                state.system_prompt = profile
                    .system_prompt
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
                if profile.config.is_object() {
                    state.agent_config = profile.config;
                }
                info!("Fetched agent config from core API");
            }
            Err(e) => {
                warn!(error = %e, "Could not fetch agent config, using defaults");
                state.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
            }
        }
        Ok(state)
    }
}

/// Searches the agent's documents for operating procedures.
pub struct FetchContextDocuments;

#[async_trait]
impl Stage for FetchContextDocuments {
    fn name(&self) -> &'static str {
        "fetch_docs"
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            progress: 25,
            label: "Fetching relevant documents",
        }
    }

    async fn run(&self, deps: &WorkflowDeps, mut state: WorkflowState) -> StageResult {
        let search = deps
            .retry
            .with_delay(DOCS_RETRY_DELAY)
            .run_if("search_documents", CoreApiError::is_transient, || {
                deps.core_api
                    .search_documents(&state.agent_id, DOCS_QUERY, DOCS_TOP_K)
            })
            .await;

        match search {
            Ok(chunks) => {
                info!(chunks = chunks.len(), "Fetched document chunks");
                state.doc_chunks = chunks;
                Ok(state)
            }
            Err(e) => Err(StageFailure::new(state, StageError::ContextDocuments(e))),
        }
    }
}

/// Asks a local agent for the day's warehouse figures.
///
/// Remote failure is never fatal: a failed, timed out or impossible dispatch
/// falls back to [`fallback_wms_data`].
pub struct FetchWarehouseData;

impl FetchWarehouseData {
    /// `agent_config.wms = {tool, payload}` overrides the default db query.
    fn remote_call(agent_config: &Value) -> RemoteCall {
        let custom = agent_config.get("wms");
        let tool_name = custom
            .and_then(|w| w.get("tool"))
            .and_then(Value::as_str)
            .unwrap_or(WMS_TOOL)
            .to_string();
        let payload = custom
            .and_then(|w| w.get("payload"))
            .cloned()
            .unwrap_or_else(|| json!({ "query": WMS_QUERY }));

        RemoteCall {
            step_id: WMS_STEP_ID.to_string(),
            tool_name,
            payload,
        }
    }
}

#[async_trait]
impl Stage for FetchWarehouseData {
    fn name(&self) -> &'static str {
        "fetch_wms_data"
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            progress: 40,
            label: "Fetching WMS data from local agent",
        }
    }

    async fn run(&self, deps: &WorkflowDeps, mut state: WorkflowState) -> StageResult {
        let call = Self::remote_call(&state.agent_config);
        let outcome = call_remote(deps, &state, call).await;
        if outcome.was_dispatched() {
            state.counters.tool_calls += 1;
        }

        match outcome {
            DispatchOutcome::Completed(result) => {
                info!("Received WMS data from local agent");
                state.external_data = if result.is_null() { json!({}) } else { result };
                state.data_source = DataSource::LocalAgent;
            }
            other => {
                info!(outcome = ?other, "Using fallback WMS data");
                state.external_data = fallback_wms_data();
                state.data_source = DataSource::Fallback;
            }
        }
        Ok(state)
    }
}

/// Runs the LLM analysis over the warehouse data and document context.
pub struct Analyze;

impl Analyze {
    fn request(state: &WorkflowState) -> AnalysisRequest {
        let context: Vec<String> = state
            .doc_chunks
            .iter()
            .take(PROMPT_CHUNKS)
            .map(|c| c.chunk_text.chars().take(PROMPT_CHUNK_CHARS).collect())
            .collect();

        let data = serde_json::to_string_pretty(&state.external_data)
            .unwrap_or_else(|_| state.external_data.to_string());

        let prompt = format!(
            "Based on the following warehouse data and context, provide a comprehensive analysis:\n\n\
             Warehouse Data:\n{data}\n\n\
             Context from Documents:\n{}\n\n\
             Please analyze:\n\
             1. Overall throughput and performance\n\
             2. Identified bottlenecks\n\
             3. Anomalies and their potential causes\n\
             4. Recommendations for improvement\n\n\
             Provide a structured analysis.",
            context.join("\n")
        );

        AnalysisRequest {
            system_prompt: state.system_prompt.clone(),
            prompt,
            data: state.external_data.clone(),
            context,
        }
    }
}

#[async_trait]
impl Stage for Analyze {
    fn name(&self) -> &'static str {
        "llm_analysis"
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            progress: 60,
            label: "Analyzing data with LLM",
        }
    }

    async fn run(&self, deps: &WorkflowDeps, mut state: WorkflowState) -> StageResult {
        let request = Self::request(&state);
        let mut attempts = 0u32;

        let result = deps
            .retry
            .run("llm_analysis", || {
                attempts += 1;
                deps.analyzer.analyze(&request)
            })
            .await;
        state.counters.llm_calls += attempts;

        match result {
            Ok(analysis) => {
                state.counters.llm_tokens_used += analysis.tokens_used;
                state.analysis = Some(analysis.content);
                info!(tokens = analysis.tokens_used, "LLM analysis completed");
                Ok(state)
            }
            Err(e) => Err(StageFailure::new(state, StageError::Analysis(e))),
        }
    }
}

/// Renders the final report, which becomes the task output.
pub struct FormatReport;

impl FormatReport {
    fn render(state: &WorkflowState) -> Result<Value, StageError> {
        let analysis = state
            .analysis
            .as_deref()
            .unwrap_or("Analysis not available");
        let data = serde_json::to_string_pretty(&state.external_data)
            .map_err(|e| StageError::Format(e.to_string()))?;
        let generated_at = Utc::now().to_rfc3339();

        let full_report_md = format!(
            "# Daily Warehouse Report\n\n\
             ## Summary\n{analysis}\n\n\
             ## Data\n```json\n{data}\n```\n\n\
             ## Generated at\n{generated_at} (task {})\n",
            state.task_id
        );

        Ok(json!({
            "full_report_md": full_report_md,
            "summary_text": summarize(analysis, SUMMARY_CHARS),
            "wms_data": state.external_data,
            "data_source": state.data_source.as_str(),
            "generated_at": generated_at,
        }))
    }
}

/// First `max_chars` characters, with an ellipsis when cut.
fn summarize(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[async_trait]
impl Stage for FormatReport {
    fn name(&self) -> &'static str {
        "format_report"
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            progress: 85,
            label: "Formatting report",
        }
    }

    async fn run(&self, _deps: &WorkflowDeps, mut state: WorkflowState) -> StageResult {
        match Self::render(&state) {
            Ok(report) => {
                state.report = Some(report);
                Ok(state)
            }
            Err(e) => Err(StageFailure::new(state, e)),
        }
    }
}

/// Sends the summary to the channels enabled in `agent_config.communication`.
/// Delivery problems, slow ones included, are logged and never fail the run.
pub struct Notify;

impl Notify {
    fn email(state: &WorkflowState, communication: &Value, summary: &str) -> Notification {
        let recipients = communication
            .get("default_recipients")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Notification {
            subject: format!("Daily Warehouse Report - {}", state.agent_id),
            text: format!(
                "Daily Warehouse Report\n\n{summary}\n\nTask ID: {}",
                state.task_id
            ),
            channel: None,
            recipients,
        }
    }

    fn slack(state: &WorkflowState, communication: &Value, summary: &str) -> Notification {
        Notification {
            subject: String::new(),
            text: format!(
                "Daily Warehouse Report\n\n{summary}\n\nTask: {}",
                state.task_id
            ),
            channel: communication
                .get("slack_channel")
                .and_then(Value::as_str)
                .map(str::to_string),
            recipients: Vec::new(),
        }
    }

    async fn deliver(
        notifier: &dyn Notifier,
        notification: &Notification,
        limit: Duration,
        kind: &'static str,
    ) {
        match tokio::time::timeout(limit, notifier.notify(notification)).await {
            Ok(Ok(())) => info!(kind, channel = ?notification.channel, "Sent notification"),
            Ok(Err(e)) => warn!(kind, error = %e, "Failed to send notification"),
            Err(_) => warn!(
                kind,
                timeout_secs = limit.as_secs(),
                "Notification timed out"
            ),
        }
    }
}

#[async_trait]
impl Stage for Notify {
    fn name(&self) -> &'static str {
        "send_notification"
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            progress: 95,
            label: "Sending notifications",
        }
    }

    async fn run(&self, deps: &WorkflowDeps, state: WorkflowState) -> StageResult {
        let communication = state
            .agent_config
            .get("communication")
            .cloned()
            .unwrap_or(Value::Null);
        let enabled = |flag: &str| communication.get(flag).and_then(Value::as_bool) == Some(true);

        let summary = state
            .report
            .as_ref()
            .and_then(|r| r.get("summary_text"))
            .and_then(Value::as_str)
            .unwrap_or("Report generated successfully");

        if enabled("can_email") {
            let email = Self::email(&state, &communication, summary);
            if email.recipients.is_empty() {
                info!("Email enabled but no default_recipients, skipping");
            } else {
                Self::deliver(deps.email.as_ref(), &email, deps.notify_timeout, "email").await;
            }
        }

        if enabled("can_slack") {
            let slack = Self::slack(&state, &communication, summary);
            Self::deliver(deps.slack.as_ref(), &slack, deps.notify_timeout, "slack").await;
        }

        Ok(state)
    }
}
