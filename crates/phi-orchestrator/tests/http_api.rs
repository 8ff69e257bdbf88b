//! HTTP API tests driven through the axum router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use phi_core::{LocalAgentId, ToolRequest};
use phi_orchestrator::clients::AgentProfile;
use phi_orchestrator::http::create_router;
use phi_orchestrator::Config;

use common::*;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, value)
}

fn heartbeat_body(local_agent_id: Option<&str>) -> Value {
    json!({
        "local_agent_id": local_agent_id,
        "agent_id": AGENT,
        "org_id": ORG,
        "name": "dock-pc",
        "capabilities": { "tools": ["db"] },
        "status": "ACTIVE"
    })
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let app = create_router(h.state.clone());

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_heartbeat_registers_then_refreshes() {
    let h = harness();
    let app = create_router(h.state.clone());

    let (status, first) = send(&app, "POST", "/local-agents/heartbeat", Some(heartbeat_body(None))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "ACTIVE");
    let id = first["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let registered = h.state.agents.get(&LocalAgentId::new(id.clone())).await.unwrap();

    let (status, second) = send(
        &app,
        "POST",
        "/local-agents/heartbeat",
        Some(heartbeat_body(Some(&id))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], id.as_str());

    let agents = h.state.agents.list().await;
    assert_eq!(agents.len(), 1);
    assert!(agents[0].last_heartbeat_at >= registered.last_heartbeat_at);
}

#[tokio::test]
async fn test_pending_tasks_and_callbacks() {
    let h = harness();
    let app = create_router(h.state.clone());

    let task = h.state.tasks.create(report_spec()).await;
    h.state
        .tools
        .enqueue(ToolRequest {
            task_id: task.id.clone(),
            local_agent_id: LocalAgentId::new("la-1"),
            step_id: "fetch_wms_data".into(),
            tool_name: "db".into(),
            payload: json!({ "query": "SELECT 1" }),
        })
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/local-agents/la-1/pending-tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["step_id"], "fetch_wms_data");
    assert_eq!(tasks[0]["task_id"], task.id.as_str());
    assert_eq!(tasks[0]["tool_name"], "db");
    assert_eq!(tasks[0]["payload"]["query"], "SELECT 1");

    let callback = json!({
        "task_id": task.id,
        "step_id": "fetch_wms_data",
        "tool_name": "db",
        "result": { "throughput": 10 }
    });
    let (status, body) = send(&app, "POST", "/tool-callbacks", Some(callback.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let late = json!({
        "task_id": task.id,
        "step_id": "fetch_wms_data",
        "tool_name": "db",
        "error": "late duplicate"
    });
    let (status, body) = send(&app, "POST", "/tool-callbacks", Some(late)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already resolved"));

    let (_, body) = send(&app, "GET", "/local-agents/la-1/pending-tasks", None).await;
    assert!(body["tasks"].as_array().unwrap().is_empty());

    let unknown = json!({
        "task_id": task.id,
        "step_id": "nope",
        "tool_name": "db",
        "result": {}
    });
    let (status, _) = send(&app, "POST", "/tool-callbacks", Some(unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_task_returns_pending_task() {
    let h = harness();
    let app = create_router(h.state.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/agents/agent-1/run-task",
        Some(json!({ "type": "DAILY_WAREHOUSE_REPORT", "input": { "date": "today" } })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["org_id"], ORG);
    assert_eq!(body["type"], "DAILY_WAREHOUSE_REPORT");

    let task_id = body["id"].as_str().unwrap();
    let (status, detail) = send(&app, "GET", &format!("/tasks/{task_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["id"], task_id);
    assert_eq!(detail["events"][0]["event_type"], "TASK_CREATED");
}

#[tokio::test]
async fn test_run_task_without_resolvable_org_is_bad_gateway() {
    let core_api = StubCoreApi {
        profile: AgentProfile::default(),
        ..StubCoreApi::default()
    };
    let h = harness_with(Config::default(), core_api, StubAnalyzer::default());
    let app = create_router(h.state.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/agents/agent-1/run-task",
        Some(json!({ "type": "DAILY_WAREHOUSE_REPORT" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("no org_id"));
    assert!(h.state.tasks.count_by_status().await.is_empty());
}

#[tokio::test]
async fn test_run_task_rejects_unknown_type() {
    let h = harness();
    let app = create_router(h.state.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/agents/agent-1/run-task",
        Some(json!({ "type": "WEEKLY_INVENTORY", "org_id": ORG })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown task type: WEEKLY_INVENTORY");
    assert!(h.state.tasks.count_by_status().await.is_empty());
}

#[tokio::test]
async fn test_unknown_task_and_missing_metrics() {
    let h = harness();
    let app = create_router(h.state.clone());

    let (status, body) = send(&app, "GET", "/tasks/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));

    let task = h.state.tasks.create(report_spec()).await;
    let (status, _) = send(&app, "GET", &format!("/tasks/{}/metrics", task.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let h = harness();
    let app = create_router(h.state.clone());
    h.state.tasks.create(report_spec()).await;

    let (status, body) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .as_str()
        .unwrap()
        .contains("phi_tasks_total{status=\"pending\"} 1"));
}
