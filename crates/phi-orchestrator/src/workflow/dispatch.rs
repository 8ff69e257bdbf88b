//! Delegating one step of a workflow to a local agent.

use serde_json::Value;
use tracing::{info, warn};

use phi_core::ToolRequest;

use super::{WorkflowDeps, WorkflowState};
use crate::store::Resolution;

/// A tool invocation to run on the agent's local machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub step_id: String,
    pub tool_name: String,
    pub payload: Value,
}

/// How a remote call ended. Only `Completed` carries usable data.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed(Value),
    Failed(String),
    TimedOut,
    NoActiveAgent,
    /// The queue refused the request.
    Rejected(String),
}

impl DispatchOutcome {
    /// Whether a tool task was actually handed to a local agent.
    pub fn was_dispatched(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::TimedOut)
    }
}

/// Enqueue `call` for an active local agent of the run's agent and wait for
/// its callback within the configured dispatch window.
pub async fn call_remote(
    deps: &WorkflowDeps,
    state: &WorkflowState,
    call: RemoteCall,
) -> DispatchOutcome {
    let Some(local_agent) = deps.agents.find_active_for(&state.agent_id).await else {
        info!(agent_id = %state.agent_id, "No active local agent");
        return DispatchOutcome::NoActiveAgent;
    };

    let request = ToolRequest {
        task_id: state.task_id.clone(),
        local_agent_id: local_agent.id.clone(),
        step_id: call.step_id,
        tool_name: call.tool_name,
        payload: call.payload,
    };

    let tool_task = match deps.tools.enqueue(request).await {
        Ok(tool_task) => tool_task,
        Err(e) => {
            warn!(error = %e, "Tool task rejected");
            return DispatchOutcome::Rejected(e.to_string());
        }
    };

    let resolution = deps
        .tools
        .wait_for_resolution(
            &tool_task.id,
            deps.dispatch.poll_interval,
            deps.dispatch.max_wait,
        )
        .await;

    match resolution {
        Ok(Resolution::Completed(result)) => DispatchOutcome::Completed(result),
        Ok(Resolution::Failed(error)) => {
            warn!(tool_task_id = %tool_task.id, error = %error, "Tool task failed");
            DispatchOutcome::Failed(error)
        }
        Ok(Resolution::TimedOut) => {
            warn!(
                tool_task_id = %tool_task.id,
                max_wait_secs = deps.dispatch.max_wait.as_secs(),
                "Timed out waiting for tool task"
            );
            DispatchOutcome::TimedOut
        }
        Err(e) => DispatchOutcome::Rejected(e.to_string()),
    }
}
