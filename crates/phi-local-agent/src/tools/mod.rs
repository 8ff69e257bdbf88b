//! Local tools the orchestrator can invoke on this machine.

mod db;
mod file;
mod http;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ToolSpec;

pub use db::DbTool;
pub use file::FileTool;
pub use http::HttpTool;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unsupported action: {0}")]
    Unsupported(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// A named capability invoked with a JSON payload.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, payload: &Value) -> Result<Value, ToolError>;
}

/// Tools available to this process, by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the agent file. Keys without a local
    /// implementation are skipped.
    pub fn from_specs(specs: &[ToolSpec]) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for spec in specs {
            match spec.key.as_str() {
                "db" => registry.register(Arc::new(DbTool::from_settings(&spec.settings)?)),
                "file" => registry.register(Arc::new(FileTool::from_settings(&spec.settings))),
                "http" => registry.register(Arc::new(HttpTool::from_settings(&spec.settings)?)),
                other => {
                    warn!(tool = other, "No local implementation for tool, skipping");
                    continue;
                }
            }
            info!(tool = %spec.key, "Tool enabled");
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}
