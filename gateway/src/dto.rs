//! Wire-format response shapes (§6). Internal domain types
//! (`relay_types::Task`, `relay_types::ProgressEvent`) use `snake_case`
//! fields because that's what matches their Postgres columns and JSONB
//! queue payloads; everything that crosses the HTTP/SSE boundary to a
//! browser goes through one of these `camelCase` DTOs instead, so the two
//! concerns (storage shape, wire shape) never have to agree with each
//! other by accident.

use chrono::{DateTime, Utc};
use relay_types::{ProgressEvent, Task, TaskStatus};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub task_id: Uuid,
    pub owner_kind: String,
    pub owner_id: String,
    pub tool_slug: String,
    pub input_params: JsonValue,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub attempts_made: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_tasks: Option<Vec<TaskDto>>,
}

impl From<&Task> for TaskDto {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            owner_kind: task.owner.kind.to_string(),
            owner_id: task.owner.id.clone(),
            tool_slug: task.tool_slug.clone(),
            input_params: task.input_params.clone(),
            status: task.status,
            progress: task.progress,
            output_data: task.output_data.clone(),
            error_message: task.error_message.clone(),
            attempts_made: task.attempts_made,
            parent_task_id: task.parent_task_id,
            idempotency_key: task.idempotency_key.clone(),
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            updated_at: task.updated_at,
            child_tasks: None,
        }
    }
}

impl TaskDto {
    pub fn with_children(mut self, children: Vec<Task>) -> Self {
        self.child_tasks = Some(children.iter().map(TaskDto::from).collect());
        self
    }
}

/// Response body for `POST /tasks` (§6).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub message: String,
}

/// The body of a single SSE event (§4.8: "Published message: {taskId,
/// ownerId, status, progress, outputData?, error?, timestamp}"), whether it
/// came from the Progress Bus or was synthesized from the current Task row
/// on attach (§4.9).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEventDto {
    pub task_id: Uuid,
    pub owner_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&ProgressEvent> for ProgressEventDto {
    fn from(event: &ProgressEvent) -> Self {
        Self {
            task_id: event.task_id,
            owner_id: event.owner_id.clone(),
            status: event.status,
            progress: event.progress,
            output_data: event.output_data.clone(),
            error: event.error.clone(),
            timestamp: event.timestamp,
        }
    }
}

impl From<&Task> for ProgressEventDto {
    /// Builds the synthetic "current state" event the SSE gateway sends
    /// before ever subscribing to the bus (§4.9).
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            owner_id: task.owner.id.clone(),
            status: task.status,
            progress: task.progress,
            output_data: task.output_data.clone(),
            error: task.error_message.clone(),
            timestamp: task.updated_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use relay_types::{Owner, UserKind};

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::now_v7(),
            owner: Owner::new(UserKind::Web, "user-1"),
            tool_slug: "background-remove".to_string(),
            input_params: JsonValue::Null,
            status: TaskStatus::Processing,
            progress: 40,
            output_data: None,
            error_message: None,
            attempts_made: 1,
            parent_task_id: None,
            idempotency_key: None,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn task_dto_serializes_camel_case() {
        let task = sample_task();
        let dto = TaskDto::from(&task);
        let body = serde_json::to_value(&dto).unwrap();
        assert!(body.get("taskId").is_some());
        assert!(body.get("toolSlug").is_some());
        assert!(body.get("task_id").is_none());
        assert!(dto.child_tasks.is_none());
    }

    #[test]
    fn with_children_nests_child_dtos() {
        let parent = sample_task();
        let mut child = sample_task();
        child.parent_task_id = Some(parent.id);
        let dto = TaskDto::from(&parent).with_children(vec![child.clone()]);
        assert_eq!(dto.child_tasks.unwrap().len(), 1);
    }

    #[test]
    fn progress_event_dto_from_task_uses_updated_at_as_timestamp() {
        let task = sample_task();
        let dto = ProgressEventDto::from(&task);
        assert_eq!(dto.timestamp, task.updated_at);
        assert_eq!(dto.progress, task.progress);
    }
}
