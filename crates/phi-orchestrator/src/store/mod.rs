//! In-memory stores shared by the coordinator, the workflow engine and the
//! HTTP handlers.
//!
//! Every write is one critical section under a single lock, so a reader never
//! observes a row change without its matching event.

mod liveness;
mod tasks;
mod tool_queue;

pub use liveness::{LivenessRegistry, StalenessPolicy};
pub use tasks::TaskStore;
pub use tool_queue::{Resolution, ToolQueue};
