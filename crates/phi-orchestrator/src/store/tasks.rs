//! Task rows, their event log and per-run metrics.

use std::collections::HashMap;

use serde_json::{json, Value};
use tokio::sync::RwLock;

use phi_core::{
    CoreError, StatusChange, Task, TaskEvent, TaskEventType, TaskId, TaskMetrics, TaskSpec,
    TaskStatus,
};

#[derive(Default)]
struct TaskTables {
    tasks: HashMap<TaskId, Task>,
    events: HashMap<TaskId, Vec<TaskEvent>>,
    metrics: HashMap<TaskId, TaskMetrics>,
}

impl TaskTables {
    fn task_mut(&mut self, task_id: &TaskId) -> Result<&mut Task, CoreError> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }

    fn push_event(&mut self, event: TaskEvent) {
        self.events.entry(event.task_id.clone()).or_default().push(event);
    }
}

/// Store of Tasks and their append-only TaskEvent log.
#[derive(Default)]
pub struct TaskStore {
    tables: RwLock<TaskTables>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a PENDING task and log TASK_CREATED.
    pub async fn create(&self, spec: TaskSpec) -> Task {
        let task = Task::new(spec);
        let event = TaskEvent::new(
            task.id.clone(),
            TaskEventType::TaskCreated,
            json!({ "type": task.task_type }),
        );

        let mut tables = self.tables.write().await;
        tables.tasks.insert(task.id.clone(), task.clone());
        tables.push_event(event);
        task
    }

    pub async fn get(&self, task_id: &TaskId) -> Option<Task> {
        self.tables.read().await.tasks.get(task_id).cloned()
    }

    /// A task together with its events in append order.
    pub async fn get_with_events(&self, task_id: &TaskId) -> Option<(Task, Vec<TaskEvent>)> {
        let tables = self.tables.read().await;
        let task = tables.tasks.get(task_id)?.clone();
        let events = tables.events.get(task_id).cloned().unwrap_or_default();
        Some((task, events))
    }

    pub async fn events(&self, task_id: &TaskId) -> Vec<TaskEvent> {
        self.tables
            .read()
            .await
            .events
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Apply a status change and append `event_type` in the same write.
    ///
    /// Changes out of a terminal status are rejected and leave the row and the
    /// log untouched.
    pub async fn transition(
        &self,
        task_id: &TaskId,
        change: StatusChange,
        event_type: TaskEventType,
        payload: Value,
    ) -> Result<Task, CoreError> {
        let mut tables = self.tables.write().await;
        let task = tables.task_mut(task_id)?;
        task.apply(change)?;
        let updated = task.clone();
        tables.push_event(TaskEvent::new(task_id.clone(), event_type, payload));
        Ok(updated)
    }

    /// Record a progress checkpoint and its PROGRESS_UPDATE event.
    pub async fn update_progress(
        &self,
        task_id: &TaskId,
        progress: i64,
        eta_seconds: Option<u32>,
        current_step: Option<&str>,
    ) -> Result<Task, CoreError> {
        let mut tables = self.tables.write().await;
        let task = tables.task_mut(task_id)?;
        let stored = task.record_progress(progress, eta_seconds, current_step.map(str::to_string))?;
        let updated = task.clone();
        tables.push_event(TaskEvent::progress_update(
            task_id.clone(),
            stored,
            eta_seconds,
            current_step,
        ));
        Ok(updated)
    }

    /// Append a free-standing event to an existing task.
    pub async fn append_event(
        &self,
        task_id: &TaskId,
        event_type: TaskEventType,
        payload: Value,
    ) -> Result<TaskEvent, CoreError> {
        self.append(TaskEvent::new(task_id.clone(), event_type, payload))
            .await
    }

    pub(crate) async fn append(&self, event: TaskEvent) -> Result<TaskEvent, CoreError> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.contains_key(&event.task_id) {
            return Err(CoreError::TaskNotFound(event.task_id.to_string()));
        }
        tables.push_event(event.clone());
        Ok(event)
    }

    /// Write the run summary. Each task gets exactly one row.
    pub async fn record_metrics(&self, metrics: TaskMetrics) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.contains_key(&metrics.task_id) {
            return Err(CoreError::TaskNotFound(metrics.task_id.to_string()));
        }
        if tables.metrics.contains_key(&metrics.task_id) {
            return Err(CoreError::MetricsAlreadyRecorded(metrics.task_id.to_string()));
        }
        tables.metrics.insert(metrics.task_id.clone(), metrics);
        Ok(())
    }

    pub async fn metrics(&self, task_id: &TaskId) -> Option<TaskMetrics> {
        self.tables.read().await.metrics.get(task_id).cloned()
    }

    pub async fn count_by_status(&self) -> HashMap<TaskStatus, usize> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for task in tables.tasks.values() {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        counts
    }
}
