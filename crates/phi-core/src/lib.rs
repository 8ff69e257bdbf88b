//! Phi Agents Core Domain Types
//!
//! This crate contains the domain model shared by the orchestrator and the
//! local agent process. It has no dependencies on:
//! - Network/HTTP
//! - Storage
//! - Runtime specifics
//!
//! The wire module holds the JSON request/response bodies both sides of the
//! tool dispatch protocol agree on.

pub mod error;
pub mod event;
pub mod ids;
pub mod local_agent;
pub mod metrics;
pub mod status;
pub mod task;
pub mod tool_task;
pub mod wire;

// Re-export commonly used types
pub use error::CoreError;
pub use event::{TaskEvent, TaskEventType};
pub use ids::{AgentId, EventId, LocalAgentId, OrgId, TaskId, ToolTaskId};
pub use local_agent::{Heartbeat, LocalAgent};
pub use metrics::{RunCounters, TaskMetrics};
pub use status::{LocalAgentStatus, TaskStatus, ToolTaskStatus};
pub use task::{StatusChange, Task, TaskSpec};
pub use tool_task::{ToolOutcome, ToolRequest, ToolTask};
