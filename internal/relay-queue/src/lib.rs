//! Queue Broker (C4): named, prefix-scoped priority queues with retries,
//! delayed retries, and a dead-letter queue (§4.1).
//!
//! Backed by Postgres (`FOR UPDATE SKIP LOCKED`) rather than a separate
//! broker process, so that the Task Store and the job that will move a task
//! out of `pending` commit in the same database — see DESIGN.md's Open
//! Question 5.

pub mod dlq;
mod postgres;
mod queue_name;

pub use postgres::PgQueueBroker;
pub use queue_name::QueueName;

use async_trait::async_trait;
use relay_types::{EnqueueOptions, QueueJob, RelayResult};
use uuid::Uuid;

/// A job handed back by [`QueueBroker::reserve`]: invisible to other
/// workers until `reserved_until`, which the worker extends with
/// [`QueueBroker::renew`] while a long provider poll runs (§5).
#[derive(Debug, Clone)]
pub struct ReservedJob {
    pub job_id: Uuid,
    pub queue_name: QueueName,
    pub payload: QueueJob,
    /// 1-indexed: this is the `attempt`-th time this job has been reserved.
    pub attempt: u32,
    pub max_attempts: u32,
}

#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Cheap liveness probe for `GET /health` (§10.2).
    async fn ping(&self) -> RelayResult<()>;

    async fn enqueue(
        &self,
        queue_name: &QueueName,
        job: QueueJob,
        opts: EnqueueOptions,
    ) -> RelayResult<Uuid>;

    /// Reserve the next eligible job, if any, with the given visibility
    /// timeout (§4.1).
    async fn reserve(
        &self,
        queue_name: &QueueName,
        worker_id: &str,
        visibility_timeout_ms: u64,
    ) -> RelayResult<Option<ReservedJob>>;

    /// Extend the lease on a reserved job. Workers MUST call this while
    /// executing a provider poll that outlasts half the visibility timeout
    /// (§4.1, §5).
    async fn renew(&self, job_id: Uuid, worker_id: &str, visibility_timeout_ms: u64) -> RelayResult<bool>;

    async fn ack(&self, job_id: Uuid) -> RelayResult<()>;

    /// Decrement remaining attempts; re-enqueue with backoff, or route to
    /// the DLQ if attempts are exhausted or `fatal` is set (§4.1, §4.11 —
    /// a handler's fatal error skips the remaining retry budget entirely).
    /// Returns `true` if the job was routed to the DLQ.
    async fn nack(&self, job_id: Uuid, error: String, fatal: bool) -> RelayResult<bool>;
}
