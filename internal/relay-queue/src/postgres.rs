use async_trait::async_trait;
use relay_types::{BackoffPolicy, EnqueueOptions, QueueJob, RelayError, RelayResult};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::queue_name::QueueName;
use crate::{QueueBroker, ReservedJob};

#[derive(Clone)]
pub struct PgQueueBroker {
    pool: PgPool,
}

impl PgQueueBroker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> RelayResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(db_err)
    }
}

fn db_err(e: sqlx::Error) -> RelayError {
    RelayError::Database {
        message: e.to_string(),
    }
}

fn decode_err(e: serde_json::Error) -> RelayError {
    RelayError::Internal {
        message: format!("corrupt queue row: {e}"),
    }
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    payload: JsonValue,
    attempts_made: i32,
    max_attempts: i32,
    backoff: JsonValue,
}

#[async_trait]
impl QueueBroker for PgQueueBroker {
    async fn ping(&self) -> RelayResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn enqueue(
        &self,
        queue_name: &QueueName,
        job: QueueJob,
        opts: EnqueueOptions,
    ) -> RelayResult<Uuid> {
        let job_id = Uuid::now_v7();
        let payload = serde_json::to_value(&job).map_err(decode_err)?;
        let backoff = serde_json::to_value(opts.backoff).map_err(decode_err)?;
        let delay = chrono::Duration::milliseconds(opts.delay_ms as i64);
        sqlx::query(
            r"
            INSERT INTO queue_jobs (
                id, queue_name, payload, priority, available_at, max_attempts, backoff
            )
            VALUES ($1, $2, $3, $4, now() + $5::interval, $6, $7)
            ",
        )
        .bind(job_id)
        .bind(queue_name.as_wire())
        .bind(&payload)
        .bind(opts.priority)
        .bind(format!("{} milliseconds", delay.num_milliseconds()))
        .bind(opts.max_attempts as i32)
        .bind(&backoff)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(job_id)
    }

    async fn reserve(
        &self,
        queue_name: &QueueName,
        worker_id: &str,
        visibility_timeout_ms: u64,
    ) -> RelayResult<Option<ReservedJob>> {
        let row: Option<JobRow> = sqlx::query_as(
            r"
            UPDATE queue_jobs
            SET reserved_until = now() + ($2 || ' milliseconds')::interval,
                reserved_by = $3,
                attempts_made = attempts_made + 1
            WHERE id = (
                SELECT id FROM queue_jobs
                WHERE queue_name = $1
                  AND available_at <= now()
                  AND (reserved_until IS NULL OR reserved_until < now())
                ORDER BY priority DESC, available_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, payload, attempts_made, max_attempts, backoff
            ",
        )
        .bind(queue_name.as_wire())
        .bind(visibility_timeout_ms.to_string())
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: QueueJob = serde_json::from_value(row.payload).map_err(decode_err)?;
        Ok(Some(ReservedJob {
            job_id: row.id,
            queue_name: queue_name.clone(),
            payload,
            attempt: row.attempts_made.max(1) as u32,
            max_attempts: row.max_attempts.max(1) as u32,
        }))
    }

    async fn renew(&self, job_id: Uuid, worker_id: &str, visibility_timeout_ms: u64) -> RelayResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE queue_jobs
            SET reserved_until = now() + ($2 || ' milliseconds')::interval
            WHERE id = $1 AND reserved_by = $3
            ",
        )
        .bind(job_id)
        .bind(visibility_timeout_ms.to_string())
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn ack(&self, job_id: Uuid) -> RelayResult<()> {
        sqlx::query("DELETE FROM queue_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn nack(&self, job_id: Uuid, error: String, fatal: bool) -> RelayResult<bool> {
        let row: Option<JobRow> = sqlx::query_as(
            "SELECT id, payload, attempts_made, max_attempts, backoff FROM queue_jobs WHERE id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(false);
        };

        if fatal || row.attempts_made >= row.max_attempts {
            let queue_name: String = sqlx::query_scalar("SELECT queue_name FROM queue_jobs WHERE id = $1")
                .bind(job_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            sqlx::query(
                r"
                INSERT INTO dead_letter_jobs (id, queue_name, payload, attempts_made, last_error, failed_at)
                VALUES ($1, $2, $3, $4, $5, now())
                ",
            )
            .bind(job_id)
            .bind(&queue_name)
            .bind(&row.payload)
            .bind(row.attempts_made)
            .bind(&error)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            sqlx::query("DELETE FROM queue_jobs WHERE id = $1")
                .bind(job_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            tx.commit().await.map_err(db_err)?;
            return Ok(true);
        }

        let backoff: BackoffPolicy = serde_json::from_value(row.backoff).map_err(decode_err)?;
        let delay_ms = backoff.delay_for(row.attempts_made.max(0) as u32);
        sqlx::query(
            r"
            UPDATE queue_jobs
            SET available_at = now() + ($2 || ' milliseconds')::interval,
                reserved_until = NULL,
                reserved_by = NULL,
                last_error = $3
            WHERE id = $1
            ",
        )
        .bind(job_id)
        .bind(delay_ms.to_string())
        .bind(&error)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(false)
    }
}
