//! Local agent configuration: timing settings and the YAML agent file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use phi_core::{AgentId, OrgId};

pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://localhost:8001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Worker timing configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Orchestrator base URL.
    pub orchestrator_url: String,

    /// Work loop interval.
    pub poll_interval: Duration,

    /// Heartbeat loop interval.
    pub heartbeat_interval: Duration,

    /// Attempts made to register before giving up.
    pub register_attempts: u32,

    /// Delay before the first registration retry; doubles each time.
    pub register_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            orchestrator_url: DEFAULT_ORCHESTRATOR_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            register_attempts: 4,
            register_delay: Duration::from_secs(1),
        }
    }
}

/// One tool enabled in the agent file.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    pub key: String,
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub base_url: Option<String>,
}

/// The YAML file describing which agent this process serves.
///
/// ```yaml
/// agent_id: 3f2a...
/// org_id: 91bc...
/// name: Dock PC
/// tools:
///   - key: file
///     settings: { base_path: /srv/exports }
/// server:
///   base_url: http://orchestrator:8001
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AgentFile {
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub name: String,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

impl AgentFile {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Orchestrator URL from the `server` section, if any.
    pub fn server_url(&self) -> Option<&str> {
        self.server.as_ref().and_then(|s| s.base_url.as_deref())
    }
}
