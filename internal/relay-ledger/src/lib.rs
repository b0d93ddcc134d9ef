//! Usage & Response Ledger (C11): append-only records of every provider
//! call (§4.10). Writes are best-effort — a ledger failure MUST NOT fail the
//! task it's recording, so the fallible `try_*` methods are wrapped by a
//! default `record_*` that only logs on error.

mod postgres;
mod sanitize;

pub use postgres::PgUsageLedger;
pub use sanitize::sanitize_json;

use async_trait::async_trait;
use relay_types::{RelayResult, TaskResponseRow, UsageLog};

#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn try_record_usage(&self, entry: UsageLog) -> RelayResult<()>;
    async fn try_record_response(&self, entry: TaskResponseRow) -> RelayResult<()>;

    /// Best-effort variant (§4.10): swallows and logs any error instead of
    /// propagating it into the handler's own result.
    async fn record_usage(&self, entry: UsageLog) {
        let task_id = entry.task_id;
        if let Err(err) = self.try_record_usage(entry).await {
            tracing::error!(%task_id, error = %err, "usage ledger write failed");
        }
    }

    async fn record_response(&self, entry: TaskResponseRow) {
        let task_id = entry.task_id;
        if let Err(err) = self.try_record_response(entry).await {
            tracing::error!(%task_id, error = %err, "response ledger write failed");
        }
    }
}
