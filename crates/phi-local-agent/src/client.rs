//! HTTP client for the orchestrator's local agent endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use phi_core::wire::{
    HeartbeatRequest, HeartbeatResponse, PendingTasksResponse, PendingToolTask,
    ToolCallbackRequest,
};
use phi_core::LocalAgentId;

/// Errors talking to the orchestrator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport or decoding failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status.
    #[error("HTTP {status}: {path}")]
    Status { status: u16, path: String },
}

/// The orchestrator operations a local agent uses.
#[async_trait]
pub trait DispatchApi: Send + Sync {
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatResponse, ClientError>;

    async fn pending_tasks(
        &self,
        local_agent_id: &LocalAgentId,
    ) -> Result<Vec<PendingToolTask>, ClientError>;

    async fn send_callback(&self, callback: &ToolCallbackRequest) -> Result<(), ClientError>;
}

/// `reqwest` implementation of [`DispatchApi`].
pub struct OrchestratorClient {
    inner: reqwest::Client,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, ClientError> {
        if !response.status().is_success() {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DispatchApi for OrchestratorClient {
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatResponse, ClientError> {
        let path = "/local-agents/heartbeat";
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Sending heartbeat");

        let response = self.inner.post(&url).json(request).send().await?;
        Self::decode(response, path).await
    }

    async fn pending_tasks(
        &self,
        local_agent_id: &LocalAgentId,
    ) -> Result<Vec<PendingToolTask>, ClientError> {
        let path = format!("/local-agents/{local_agent_id}/pending-tasks");
        let url = format!("{}{}", self.base_url, path);

        let response = self.inner.get(&url).send().await?;
        let body: PendingTasksResponse = Self::decode(response, &path).await?;
        Ok(body.tasks)
    }

    async fn send_callback(&self, callback: &ToolCallbackRequest) -> Result<(), ClientError> {
        let path = "/tool-callbacks";
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, step_id = %callback.step_id, "Sending tool callback");

        let response = self.inner.post(&url).json(callback).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }
        Ok(())
    }
}
