//! Stub collaborators for unit tests.

use async_trait::async_trait;

use phi_core::AgentId;

use crate::clients::{AgentProfile, CoreApi, CoreApiError, DocChunk};

/// Serves one fixed profile and no documents.
#[derive(Default)]
pub struct StaticCoreApi {
    pub profile: AgentProfile,
}

#[async_trait]
impl CoreApi for StaticCoreApi {
    async fn get_agent(&self, _agent_id: &AgentId) -> Result<AgentProfile, CoreApiError> {
        Ok(self.profile.clone())
    }

    async fn search_documents(
        &self,
        _agent_id: &AgentId,
        _query: &str,
        _top_k: u32,
    ) -> Result<Vec<DocChunk>, CoreApiError> {
        Ok(Vec::new())
    }
}
