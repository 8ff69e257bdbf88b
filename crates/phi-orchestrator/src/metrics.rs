//! Prometheus metrics in text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use phi_core::{LocalAgentStatus, TaskStatus, ToolTaskStatus};

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    let tasks = state.tasks.count_by_status().await;
    write_gauge(
        &mut output,
        "phi_tasks_total",
        "Number of tasks by status",
        [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Success,
            TaskStatus::Failed,
        ]
        .iter()
        .map(|s| (s.as_str(), tasks.get(s).copied().unwrap_or(0))),
    );

    let tools = state.tools.count_by_status().await;
    writeln!(output).ok();
    write_gauge(
        &mut output,
        "phi_tool_tasks_total",
        "Number of tool tasks by status",
        [
            ToolTaskStatus::Pending,
            ToolTaskStatus::Completed,
            ToolTaskStatus::Failed,
        ]
        .iter()
        .map(|s| (s.as_str(), tools.get(s).copied().unwrap_or(0))),
    );

    let agents = state.agents.count_by_status().await;
    writeln!(output).ok();
    write_gauge(
        &mut output,
        "phi_local_agents",
        "Number of known local agents by status",
        [
            LocalAgentStatus::Enrolled,
            LocalAgentStatus::Active,
            LocalAgentStatus::Offline,
        ]
        .iter()
        .map(|s| (s.as_str(), agents.get(s).copied().unwrap_or(0))),
    );

    output
}

fn write_gauge<'a>(
    output: &mut String,
    name: &str,
    help: &str,
    values: impl Iterator<Item = (&'a str, usize)>,
) {
    writeln!(output, "# HELP {name} {help}").ok();
    writeln!(output, "# TYPE {name} gauge").ok();
    for (status, count) in values {
        let status = status.to_lowercase();
        writeln!(output, "{name}{{status=\"{status}\"}} {count}").ok();
    }
}
