//! Task Store (C1): the durable record of every task, its lineage, inputs,
//! outputs, status and timestamps (§3).
//!
//! `TaskStore` is a trait so that `relay-handlers` and the queue sweeper can
//! be exercised against an in-memory fake in tests without a live Postgres
//! instance, mirroring how `durable_tools` exposes a `MockTensorZeroClient`
//! behind its `test-support` feature for the same reason.

mod postgres;
mod row;

pub use postgres::PgTaskStore;
pub use row::TaskRow;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_types::{RelayResult, Task};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A task creation request as accepted by the Task Store, already validated
/// by the Intake Service (§4.2).
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: Uuid,
    pub owner: relay_types::Owner,
    pub tool_slug: String,
    pub input_params: JsonValue,
    pub idempotency_key: Option<String>,
    pub parent_task_id: Option<Uuid>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Cheap liveness probe for `GET /health` (§10.2).
    async fn ping(&self) -> RelayResult<()>;

    /// Insert a new task row with `status = pending, progress = 0` (§4.2
    /// step 5).
    async fn insert(&self, task: NewTask) -> RelayResult<Task>;

    async fn get(&self, id: Uuid) -> RelayResult<Option<Task>>;

    /// All direct children of `id`, ordered by creation (§6 `GET
    /// /tasks/{id}?includeChildren=true`).
    async fn children(&self, id: Uuid) -> RelayResult<Vec<Task>>;

    async fn list(&self, filter: TaskListFilter) -> RelayResult<Vec<Task>>;

    /// Look up a live-or-terminal task for (owner, tool, idempotency key)
    /// (§4.2 step 2, §8 invariant 5).
    async fn find_by_idempotency_key(
        &self,
        owner: &relay_types::Owner,
        tool_slug: &str,
        key: &str,
    ) -> RelayResult<Option<Task>>;

    /// `pending -> processing`; sets `started_at`. Returns the updated task,
    /// or `None` if the task was not in `pending` (another worker already
    /// claimed it, or it was never created — both are treated as "not
    /// mine", not an error).
    async fn transition_to_processing(&self, id: Uuid, attempts_made: u32) -> RelayResult<Option<Task>>;

    /// Monotonic progress update within `processing` (§4.4, §8 boundary
    /// behaviors). `progress` must already be clamped by the caller via
    /// [`relay_types::Task::clamp_progress`].
    async fn update_progress(&self, id: Uuid, progress: u8) -> RelayResult<()>;

    /// `processing -> success`. `output_data` is persisted in the same
    /// statement that flips the status, so no reader can observe `status =
    /// success` with `output_data = null` (§3 invariant, §8 invariant 2).
    async fn complete_success(&self, id: Uuid, output_data: JsonValue) -> RelayResult<Task>;

    /// `processing -> failed`.
    async fn complete_failed(&self, id: Uuid, error_message: String, attempts_made: u32) -> RelayResult<Task>;

    /// `processing -> pending`, for a handler throw the Queue Broker decided
    /// to retry rather than route to the DLQ (§4.11). Leaves the task
    /// reservable again by [`TaskStore::transition_to_processing`] once the
    /// backoff delay the broker scheduled elapses.
    async fn revert_to_pending(&self, id: Uuid, error_message: String) -> RelayResult<()>;

    /// Tasks stuck in `pending` with no live job, older than `older_than`
    /// (§4.2's sweeper, §9 open question resolved: implemented here as a
    /// plain read so the caller — the gateway's scheduled sweeper — decides
    /// what to do with them).
    async fn find_orphaned_pending(&self, older_than: DateTime<Utc>) -> RelayResult<Vec<Task>>;
}

#[derive(Debug, Clone, Default)]
pub struct TaskListFilter {
    pub owner: Option<relay_types::Owner>,
    pub tool_slug: Option<String>,
    pub root_only: bool,
    pub include_children: bool,
    pub limit: i64,
}
