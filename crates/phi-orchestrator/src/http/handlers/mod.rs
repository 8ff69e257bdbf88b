//! HTTP request handlers.

mod health;
mod local_agents;
mod tasks;

pub use health::{health_check, metrics_handler};
pub use local_agents::{heartbeat, pending_tasks, tool_callback};
pub use tasks::{get_task, get_task_metrics, run_task};
