use chrono::{DateTime, Utc};
use relay_types::{Owner, Task, TaskStatus, UserKind};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Wire shape of the `tasks` table; translated into the public [`Task`]
/// type so the rest of the workspace never needs to know the column names.
#[derive(Debug, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub owner_kind: String,
    pub owner_id: String,
    pub tool_slug: String,
    pub input_params: JsonValue,
    pub status: String,
    pub progress: i16,
    pub output_data: Option<JsonValue>,
    pub error_message: Option<String>,
    pub attempts_made: i32,
    pub parent_task_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn into_task(self) -> Task {
        Task {
            id: self.id,
            owner: Owner {
                kind: if self.owner_kind == "admin" {
                    UserKind::Admin
                } else {
                    UserKind::Web
                },
                id: self.owner_id,
            },
            tool_slug: self.tool_slug,
            input_params: self.input_params,
            status: parse_status(&self.status),
            progress: self.progress.clamp(0, 100) as u8,
            output_data: self.output_data,
            error_message: self.error_message,
            attempts_made: self.attempts_made.max(0) as u32,
            parent_task_id: self.parent_task_id,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
        }
    }
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "processing" => TaskStatus::Processing,
        "success" => TaskStatus::Success,
        "failed" => TaskStatus::Failed,
        _ => TaskStatus::Pending,
    }
}

pub fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Processing => "processing",
        TaskStatus::Success => "success",
        TaskStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Success,
            TaskStatus::Failed,
        ] {
            assert_eq!(parse_status(status_str(status)), status);
        }
    }

    #[test]
    fn unknown_status_string_falls_back_to_pending() {
        assert_eq!(parse_status("something-unexpected"), TaskStatus::Pending);
    }
}
