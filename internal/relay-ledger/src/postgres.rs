use async_trait::async_trait;
use relay_types::{RelayError, RelayResult, TaskResponseRow, UsageLog, UsageStatus};
use sqlx::PgPool;

use crate::sanitize::sanitize_json;
use crate::UsageLedger;

pub struct PgUsageLedger {
    pool: PgPool,
}

impl PgUsageLedger {
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

#[async_trait]
impl UsageLedger for PgUsageLedger {
    async fn try_record_usage(&self, entry: UsageLog) -> RelayResult<()> {
        let status = match entry.status {
            UsageStatus::Success => "success",
            UsageStatus::Failed => "failed",
        };
        sqlx::query(
            r"
            INSERT INTO usage_logs (
                id, task_id, owner_id, provider_id, tool_id, model_name, model_version,
                price_config, usage_data, latency_ms, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(entry.id)
        .bind(entry.task_id)
        .bind(&entry.owner_id)
        .bind(&entry.provider_id)
        .bind(&entry.tool_id)
        .bind(&entry.model_name)
        .bind(&entry.model_version)
        .bind(&entry.price_config)
        .bind(sanitize_json(entry.usage_data))
        .bind(entry.latency_ms)
        .bind(status)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RelayError::Database {
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn try_record_response(&self, entry: TaskResponseRow) -> RelayResult<()> {
        sqlx::query(
            r"
            INSERT INTO task_responses (
                id, task_id, step_name, provider, model, raw_request, raw_response,
                latency_ms, status_code, error_message, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(entry.id)
        .bind(entry.task_id)
        .bind(&entry.step_name)
        .bind(&entry.provider)
        .bind(&entry.model)
        .bind(sanitize_json(entry.raw_request))
        .bind(sanitize_json(entry.raw_response))
        .bind(entry.latency_ms)
        .bind(entry.status_code.map(|code| code as i32))
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| RelayError::Database {
            message: e.to_string(),
        })?;
        Ok(())
    }
}
