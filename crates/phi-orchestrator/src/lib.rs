//! Phi Agents Orchestrator Library
//!
//! Runs agent workflows as background tasks and delegates tool calls to
//! local agents running on customer machines. The HTTP API is the only way in;
//! task progress and results are observed by polling.

pub mod clients;
pub mod config;
pub mod coordinator;
pub mod http;
pub mod metrics;
pub mod retry;
pub mod state;
pub mod store;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, DispatchConfig};
pub use coordinator::{CoordinatorError, TaskRunCoordinator};
pub use retry::RetryPolicy;
pub use state::{AppState, Services};
pub use store::{LivenessRegistry, Resolution, StalenessPolicy, TaskStore, ToolQueue};
pub use workflow::{WorkflowDeps, WorkflowEngine, WorkflowState};
