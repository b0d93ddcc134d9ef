//! Read-only dead-letter queue access (DESIGN.md Open Question 2). There is
//! no requeue-from-DLQ path: an operator who wants to retry a dead job
//! re-submits it through intake (§4.2) with a fresh idempotency key.

use chrono::{DateTime, Utc};
use relay_types::{QueueJob, RelayError, RelayResult};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub queue_name: String,
    pub job: QueueJob,
    pub attempts_made: u32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct DeadLetterRow {
    id: Uuid,
    queue_name: String,
    payload: JsonValue,
    attempts_made: i32,
    last_error: String,
    failed_at: DateTime<Utc>,
}

/// List dead-lettered jobs for `queue_name`, newest failure first, capped at
/// `limit`.
pub async fn list(pool: &PgPool, queue_name: &str, limit: i64) -> RelayResult<Vec<DeadLetterEntry>> {
    let rows: Vec<DeadLetterRow> = sqlx::query_as(
        r"
        SELECT id, queue_name, payload, attempts_made, last_error, failed_at
        FROM dead_letter_jobs
        WHERE queue_name = $1
        ORDER BY failed_at DESC
        LIMIT $2
        ",
    )
    .bind(queue_name)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| RelayError::Database {
        message: e.to_string(),
    })?;

    rows.into_iter()
        .map(|row| {
            let job: QueueJob = serde_json::from_value(row.payload).map_err(|e| RelayError::Internal {
                message: format!("corrupt dead-letter row: {e}"),
            })?;
            Ok(DeadLetterEntry {
                id: row.id,
                queue_name: row.queue_name,
                job,
                attempts_made: row.attempts_made.max(0) as u32,
                last_error: row.last_error,
                failed_at: row.failed_at,
            })
        })
        .collect()
}
