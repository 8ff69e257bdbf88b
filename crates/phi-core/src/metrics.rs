//! Per-run summary metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, OrgId, TaskId};

/// Counters accumulated while a workflow runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub llm_calls: u32,
    pub llm_tokens_used: u64,
    pub tool_calls: u32,
}

/// Append-only summary written once per run, when it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub task_id: TaskId,
    pub org_id: OrgId,
    pub agent_id: AgentId,
    pub task_type: String,
    pub duration_seconds: f64,
    pub llm_calls: u32,
    pub llm_tokens_used: u64,
    pub tool_calls: u32,
    pub created_at: DateTime<Utc>,
}
