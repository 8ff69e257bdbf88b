//! Local agent liveness records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AgentId, LocalAgentId, LocalAgentStatus, OrgId};

/// A heartbeat as reported by a local agent process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Absent on the very first heartbeat of a process.
    pub local_agent_id: Option<LocalAgentId>,
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub name: String,
    /// Declared tool set, e.g. `{"tools": ["db", "file"]}`.
    pub capabilities: Value,
    pub status: LocalAgentStatus,
}

/// What the orchestrator knows about one local agent process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalAgent {
    pub id: LocalAgentId,
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub name: String,
    pub status: LocalAgentStatus,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub capabilities: Value,
}

impl LocalAgent {
    /// First-seen registration. A fresh id is always generated.
    pub fn register(heartbeat: Heartbeat) -> Self {
        Self {
            id: LocalAgentId::generate(),
            agent_id: heartbeat.agent_id,
            org_id: heartbeat.org_id,
            name: heartbeat.name,
            status: heartbeat.status,
            last_heartbeat_at: Some(Utc::now()),
            capabilities: heartbeat.capabilities,
        }
    }

    /// Apply a heartbeat for an already known agent. Capabilities are
    /// replaced, not merged; identity fields are left alone.
    pub fn refresh(&mut self, heartbeat: Heartbeat) {
        self.status = heartbeat.status;
        self.capabilities = heartbeat.capabilities;
        self.last_heartbeat_at = Some(Utc::now());
    }

    /// Whether the last heartbeat is no older than `max_age` at `now`.
    pub fn heartbeat_within(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.last_heartbeat_at
            .map(|seen| now.signed_duration_since(seen) <= max_age)
            .unwrap_or(false)
    }
}
