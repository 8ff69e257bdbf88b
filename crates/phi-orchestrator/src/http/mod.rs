//! HTTP server for the orchestrator.
//!
//! Provides endpoints for:
//! - Task runs (`/agents/:agent_id/run-task`, `/tasks/:task_id`)
//! - Local agent dispatch (`/local-agents/...`, `/tool-callbacks`)
//! - Health and Prometheus metrics (`/health`, `/metrics`)

pub mod error;
pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use error::ApiError;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Task runs
        .route("/agents/:agent_id/run-task", post(handlers::run_task))
        .route("/tasks/:task_id", get(handlers::get_task))
        .route("/tasks/:task_id/metrics", get(handlers::get_task_metrics))
        // Local agent protocol
        .route("/local-agents/heartbeat", post(handlers::heartbeat))
        .route(
            "/local-agents/:local_agent_id/pending-tasks",
            get(handlers::pending_tasks),
        )
        .route("/tool-callbacks", post(handlers::tool_callback))
        // Operations
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
