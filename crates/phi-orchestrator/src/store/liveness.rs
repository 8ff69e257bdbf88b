//! Liveness registry of local agent processes.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use phi_core::{AgentId, Heartbeat, LocalAgent, LocalAgentId, LocalAgentStatus};

/// How readers judge whether an ACTIVE record is still trustworthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Ignore agents whose last heartbeat is older than this. `None` trusts
    /// the stored status alone.
    pub max_heartbeat_age: Option<Duration>,
}

impl StalenessPolicy {
    fn is_fresh(&self, agent: &LocalAgent) -> bool {
        let Some(max_age) = self.max_heartbeat_age else {
            return true;
        };
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => agent.heartbeat_within(Utc::now(), max_age),
            Err(_) => true,
        }
    }
}

/// Registry of local agents, keyed by local agent id.
#[derive(Default)]
pub struct LivenessRegistry {
    agents: RwLock<HashMap<LocalAgentId, LocalAgent>>,
    policy: StalenessPolicy,
}

impl LivenessRegistry {
    pub fn new(policy: StalenessPolicy) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Register or refresh a local agent.
    ///
    /// An absent or unknown id creates a new record with a generated id.
    pub async fn heartbeat(&self, heartbeat: Heartbeat) -> LocalAgent {
        let mut agents = self.agents.write().await;

        let known = heartbeat.local_agent_id.clone();
        if let Some(existing) = known.as_ref().and_then(|id| agents.get_mut(id)) {
            existing.refresh(heartbeat);
            debug!(local_agent_id = %existing.id, status = %existing.status, "Heartbeat");
            return existing.clone();
        }

        let agent = LocalAgent::register(heartbeat);
        info!(
            local_agent_id = %agent.id,
            agent_id = %agent.agent_id,
            org_id = %agent.org_id,
            name = %agent.name,
            "Local agent registered"
        );
        agents.insert(agent.id.clone(), agent.clone());
        agent
    }

    pub async fn get(&self, id: &LocalAgentId) -> Option<LocalAgent> {
        self.agents.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<LocalAgent> {
        self.agents.read().await.values().cloned().collect()
    }

    /// An ACTIVE local agent serving `agent_id`, preferring the most recent
    /// heartbeat.
    pub async fn find_active_for(&self, agent_id: &AgentId) -> Option<LocalAgent> {
        self.agents
            .read()
            .await
            .values()
            .filter(|a| &a.agent_id == agent_id)
            .filter(|a| a.status.accepts_work())
            .filter(|a| self.policy.is_fresh(a))
            .max_by_key(|a| a.last_heartbeat_at)
            .cloned()
    }

    pub async fn count_by_status(&self) -> HashMap<LocalAgentStatus, usize> {
        let agents = self.agents.read().await;
        let mut counts = HashMap::new();
        for agent in agents.values() {
            *counts.entry(agent.status).or_insert(0) += 1;
        }
        counts
    }
}
