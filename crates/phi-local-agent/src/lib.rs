//! Phi Agents Local Agent Library
//!
//! The local agent runs next to a customer's systems. It registers with the
//! orchestrator by heartbeat, polls for tool tasks addressed to it, runs them
//! with its configured tools and reports each result by callback.

pub mod client;
pub mod config;
pub mod tools;
pub mod worker;

pub use client::{ClientError, DispatchApi, OrchestratorClient};
pub use config::{AgentFile, ConfigError, WorkerConfig};
pub use tools::{Tool, ToolError, ToolRegistry};
pub use worker::{Identity, Worker};
