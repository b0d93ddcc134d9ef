use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_types::{Owner, RelayError, RelayResult, Task};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::row::TaskRow;
use crate::{NewTask, TaskListFilter, TaskStore};

/// Postgres-backed [`TaskStore`]. Owns no connection-pool lifecycle logic
/// of its own — the pool is created once at process start (by the
/// `gateway` or `worker` binary) and shared with `relay-queue`, matching
/// the teacher's `ToolExecutorBuilder::build` pattern of handing the same
/// `PgPool` to both the durable client and the app state.
#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> RelayResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::Database {
                message: e.to_string(),
            })
    }
}

fn db_err(e: sqlx::Error) -> RelayError {
    RelayError::Database {
        message: e.to_string(),
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn ping(&self) -> RelayResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn insert(&self, task: NewTask) -> RelayResult<Task> {
        let row: TaskRow = sqlx::query_as(
            r"
            INSERT INTO tasks (
                id, owner_kind, owner_id, tool_slug, input_params, status,
                progress, parent_task_id, idempotency_key
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, $6, $7)
            RETURNING *
            ",
        )
        .bind(task.id)
        .bind(task.owner.kind.to_string())
        .bind(&task.owner.id)
        .bind(&task.tool_slug)
        .bind(&task.input_params)
        .bind(task.parent_task_id)
        .bind(&task.idempotency_key)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.into_task())
    }

    async fn get(&self, id: Uuid) -> RelayResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(TaskRow::into_task))
    }

    async fn children(&self, id: Uuid) -> RelayResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks WHERE parent_task_id = $1 ORDER BY created_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(TaskRow::into_task).collect())
    }

    async fn list(&self, filter: TaskListFilter) -> RelayResult<Vec<Task>> {
        let owner_kind = filter.owner.as_ref().map(|o| o.kind.to_string());
        let owner_id = filter.owner.as_ref().map(|o| o.id.clone());
        let limit = if filter.limit <= 0 { 50 } else { filter.limit };
        let rows: Vec<TaskRow> = sqlx::query_as(
            r"
            SELECT * FROM tasks
            WHERE ($1::text IS NULL OR owner_kind = $1)
              AND ($2::text IS NULL OR owner_id = $2)
              AND ($3::text IS NULL OR tool_slug = $3)
              AND ($4 = false OR parent_task_id IS NULL)
            ORDER BY created_at DESC
            LIMIT $5
            ",
        )
        .bind(owner_kind)
        .bind(owner_id)
        .bind(&filter.tool_slug)
        .bind(filter.root_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(TaskRow::into_task).collect())
    }

    async fn find_by_idempotency_key(
        &self,
        owner: &Owner,
        tool_slug: &str,
        key: &str,
    ) -> RelayResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            r"
            SELECT * FROM tasks
            WHERE owner_kind = $1 AND owner_id = $2 AND tool_slug = $3 AND idempotency_key = $4
            ",
        )
        .bind(owner.kind.to_string())
        .bind(&owner.id)
        .bind(tool_slug)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(TaskRow::into_task))
    }

    async fn transition_to_processing(&self, id: Uuid, attempts_made: u32) -> RelayResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            r"
            UPDATE tasks
            SET status = 'processing', progress = 0, attempts_made = $2,
                started_at = COALESCE(started_at, now()), updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(attempts_made as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(TaskRow::into_task))
    }

    async fn update_progress(&self, id: Uuid, progress: u8) -> RelayResult<()> {
        sqlx::query(
            r"
            UPDATE tasks
            SET progress = GREATEST(progress, $2), updated_at = now()
            WHERE id = $1 AND status = 'processing'
            ",
        )
        .bind(id)
        .bind(i16::from(progress))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn complete_success(&self, id: Uuid, output_data: JsonValue) -> RelayResult<Task> {
        let row: Option<TaskRow> = sqlx::query_as(
            r"
            UPDATE tasks
            SET status = 'success', progress = 100, output_data = $2,
                completed_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'processing'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&output_data)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        match row {
            Some(r) => Ok(r.into_task()),
            None => self.existing_or_not_found(id).await,
        }
    }

    async fn complete_failed(&self, id: Uuid, error_message: String, attempts_made: u32) -> RelayResult<Task> {
        let row: Option<TaskRow> = sqlx::query_as(
            r"
            UPDATE tasks
            SET status = 'failed', error_message = $2, attempts_made = $3,
                completed_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'processing'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&error_message)
        .bind(attempts_made as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        match row {
            Some(r) => Ok(r.into_task()),
            None => self.existing_or_not_found(id).await,
        }
    }

    async fn revert_to_pending(&self, id: Uuid, error_message: String) -> RelayResult<()> {
        sqlx::query(
            r"
            UPDATE tasks
            SET status = 'pending', error_message = $2, updated_at = now()
            WHERE id = $1 AND status = 'processing'
            ",
        )
        .bind(id)
        .bind(&error_message)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_orphaned_pending(&self, older_than: DateTime<Utc>) -> RelayResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks WHERE status = 'pending' AND created_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(TaskRow::into_task).collect())
    }
}

impl PgTaskStore {
    /// A terminal state never moves; if the guarded `UPDATE` above matched
    /// zero rows because the task was already terminal, return its current
    /// state rather than erroring, so a duplicate handler completion (two
    /// workers racing on a lost lease, §4.3) is a no-op rather than a
    /// crash.
    async fn existing_or_not_found(&self, id: Uuid) -> RelayResult<Task> {
        self.get(id).await?.ok_or(RelayError::TaskNotFound {
            id: id.to_string(),
        })
    }
}
