//! Client for the core API: agent profiles and document search.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use phi_core::{AgentId, OrgId};

/// Errors from the core API.
#[derive(Debug, Error)]
pub enum CoreApiError {
    /// Transport failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status.
    #[error("HTTP {status}: {path}")]
    Status { status: u16, path: String },

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl CoreApiError {
    /// Whether retrying could help. Client errors other than 408/429 are final.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Decode(_) => false,
        }
    }
}

/// An agent's profile as served by the core API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    #[serde(default)]
    pub org_id: Option<OrgId>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Free-form agent configuration (communication, wms override, ...).
    #[serde(default)]
    pub config: Value,
}

/// One ranked chunk from a document search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    pub chunk_text: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    chunks: Vec<DocChunk>,
}

/// Operations the workflow needs from the core API.
#[async_trait]
pub trait CoreApi: Send + Sync {
    async fn get_agent(&self, agent_id: &AgentId) -> Result<AgentProfile, CoreApiError>;

    async fn search_documents(
        &self,
        agent_id: &AgentId,
        query: &str,
        top_k: u32,
    ) -> Result<Vec<DocChunk>, CoreApiError>;
}

/// `reqwest` implementation of [`CoreApi`].
pub struct CoreApiClient {
    inner: reqwest::Client,
    base_url: String,
}

impl CoreApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreApiError> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, CoreApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(CoreApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| CoreApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CoreApi for CoreApiClient {
    async fn get_agent(&self, agent_id: &AgentId) -> Result<AgentProfile, CoreApiError> {
        let path = format!("/internal/agents/{agent_id}");
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Fetching agent profile");

        let response = self.inner.get(&url).send().await?;
        Self::decode(response, &path).await
    }

    async fn search_documents(
        &self,
        agent_id: &AgentId,
        query: &str,
        top_k: u32,
    ) -> Result<Vec<DocChunk>, CoreApiError> {
        let path = format!("/internal/agents/{agent_id}/documents/search-docs");
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, top_k, "Searching documents");

        let response = self
            .inner
            .post(&url)
            .json(&json!({ "query": query, "top_k": top_k }))
            .send()
            .await?;
        let body: SearchResponse = Self::decode(response, &path).await?;
        Ok(body.chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server_error = CoreApiError::Status {
            status: 503,
            path: "/x".into(),
        };
        let not_found = CoreApiError::Status {
            status: 404,
            path: "/x".into(),
        };
        assert!(server_error.is_transient());
        assert!(!not_found.is_transient());
        assert!(!CoreApiError::Decode("bad".into()).is_transient());
    }

    #[test]
    fn test_profile_tolerates_missing_fields() {
        let profile: AgentProfile = serde_json::from_str(r#"{"system_prompt": null}"#).unwrap();
        assert!(profile.org_id.is_none());
        assert!(profile.config.is_null());

        let search: SearchResponse = serde_json::from_str(
            r#"{"query": "q", "chunks": [{"id": "c1", "document_id": "d1", "chunk_text": "Pick SOP", "metadata": {}}]}"#,
        )
        .unwrap();
        assert_eq!(search.chunks[0].chunk_text, "Pick SOP");
    }
}
