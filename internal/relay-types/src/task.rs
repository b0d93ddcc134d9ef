use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::owner::Owner;

/// `pending -> processing -> (success | failed)`, per §4.11.
///
/// `success` and `failed` are absorbing: nothing in this crate or its
/// siblings constructs a `Task` that moves out of either back to `pending`
/// or `processing` (see [`Task::transition_to`] for the only place that
/// checks this).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

/// A durable record of one task, its lineage, inputs, outputs and
/// timestamps. §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner: Owner,
    pub tool_slug: String,
    pub input_params: JsonValue,
    pub status: TaskStatus,
    pub progress: u8,
    pub output_data: Option<JsonValue>,
    pub error_message: Option<String>,
    pub attempts_made: u32,
    pub parent_task_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Clamp a handler-reported percentage into `[0, 100]` and refuse to
    /// move it backwards within the same attempt (§4.4, §8 boundary
    /// behaviors: "progress values outside [0,100] are clamped; monotonic
    /// regressions are ignored").
    pub fn clamp_progress(current: u8, reported: i64) -> u8 {
        let clamped = reported.clamp(0, 100) as u8;
        clamped.max(current)
    }

    /// Whether `self` may currently be the subject of a new `parentTaskId`
    /// reference (§4.2 step 3, invariant 4 in §8): must be the same owner
    /// and terminal-successful.
    pub fn can_parent(&self, would_be_owner: &Owner) -> bool {
        self.status == TaskStatus::Success && &self.owner == would_be_owner
    }
}
