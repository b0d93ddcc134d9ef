//! Exercises the [`QueueBroker`] contract (reserve/ack/nack, retry backoff,
//! dead-lettering) against an in-memory fake rather than a live Postgres
//! instance — the same `SKIP LOCKED`/attempts/backoff semantics
//! `PgQueueBroker` implements in SQL, reimplemented over a `Mutex<HashMap>`
//! so the contract itself can be pinned down without a database.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use relay_queue::{QueueBroker, QueueName, ReservedJob};
use relay_types::{BackoffPolicy, EnqueueOptions, Owner, QueueJob, RelayResult, UserKind};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

struct JobState {
    queue_name: QueueName,
    payload: QueueJob,
    attempts_made: u32,
    max_attempts: u32,
    backoff: BackoffPolicy,
    available_at: Instant,
    reserved_until: Option<Instant>,
    reserved_by: Option<String>,
}

struct DeadLetterEntry {
    attempts_made: u32,
    last_error: String,
}

#[derive(Default)]
struct FakeQueueBroker {
    jobs: Mutex<HashMap<Uuid, JobState>>,
    dead_letters: Mutex<HashMap<Uuid, DeadLetterEntry>>,
}

#[async_trait]
impl QueueBroker for FakeQueueBroker {
    async fn ping(&self) -> RelayResult<()> {
        Ok(())
    }

    async fn enqueue(&self, queue_name: &QueueName, job: QueueJob, opts: EnqueueOptions) -> RelayResult<Uuid> {
        let job_id = Uuid::now_v7();
        self.jobs.lock().unwrap().insert(
            job_id,
            JobState {
                queue_name: queue_name.clone(),
                payload: job,
                attempts_made: 0,
                max_attempts: opts.max_attempts,
                backoff: opts.backoff,
                available_at: Instant::now() + Duration::from_millis(opts.delay_ms),
                reserved_until: None,
                reserved_by: None,
            },
        );
        Ok(job_id)
    }

    async fn reserve(
        &self,
        queue_name: &QueueName,
        worker_id: &str,
        visibility_timeout_ms: u64,
    ) -> RelayResult<Option<ReservedJob>> {
        let now = Instant::now();
        let mut jobs = self.jobs.lock().unwrap();
        let candidate = jobs.iter_mut().find(|(_, job)| {
            &job.queue_name == queue_name
                && job.available_at <= now
                && job.reserved_until.is_none_or(|until| until < now)
        });
        let Some((job_id, job)) = candidate else {
            return Ok(None);
        };
        job.attempts_made += 1;
        job.reserved_until = Some(now + Duration::from_millis(visibility_timeout_ms));
        job.reserved_by = Some(worker_id.to_string());
        Ok(Some(ReservedJob {
            job_id: *job_id,
            queue_name: queue_name.clone(),
            payload: job.payload.clone(),
            attempt: job.attempts_made,
            max_attempts: job.max_attempts,
        }))
    }

    async fn renew(&self, job_id: Uuid, worker_id: &str, visibility_timeout_ms: u64) -> RelayResult<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job_id) {
            Some(job) if job.reserved_by.as_deref() == Some(worker_id) => {
                job.reserved_until = Some(Instant::now() + Duration::from_millis(visibility_timeout_ms));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ack(&self, job_id: Uuid) -> RelayResult<()> {
        self.jobs.lock().unwrap().remove(&job_id);
        Ok(())
    }

    async fn nack(&self, job_id: Uuid, error: String, fatal: bool) -> RelayResult<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(false);
        };

        if fatal || job.attempts_made >= job.max_attempts {
            let attempts_made = job.attempts_made;
            jobs.remove(&job_id);
            self.dead_letters.lock().unwrap().insert(
                job_id,
                DeadLetterEntry {
                    attempts_made,
                    last_error: error,
                },
            );
            return Ok(true);
        }

        let delay_ms = job.backoff.delay_for(job.attempts_made);
        job.available_at = Instant::now() + Duration::from_millis(delay_ms);
        job.reserved_until = None;
        job.reserved_by = None;
        Ok(false)
    }
}

fn sample_job() -> QueueJob {
    QueueJob {
        task_id: Uuid::now_v7(),
        owner: Owner::new(UserKind::Web, "owner-1"),
        tool_id: "tool-1".to_string(),
        tool_slug: "test-tool".to_string(),
        input_params: serde_json::json!({}),
        price_config_snapshot: relay_types::PriceConfig {
            currency: "usd".to_string(),
            unit_price: 0.0,
            extra: serde_json::json!({}),
        },
        steps_snapshot: Vec::new(),
        parent_task_id: None,
    }
}

#[tokio::test(start_paused = true)]
async fn reserved_job_is_invisible_until_nacked_or_acked() {
    let broker = FakeQueueBroker::default();
    let queue = QueueName::default_for(UserKind::Web);
    broker.enqueue(&queue, sample_job(), EnqueueOptions::default()).await.unwrap();

    let reserved = broker.reserve(&queue, "worker-a", 60_000).await.unwrap().unwrap();
    assert_eq!(reserved.attempt, 1);

    // Still leased: a second worker gets nothing.
    assert!(broker.reserve(&queue, "worker-b", 60_000).await.unwrap().is_none());

    broker.ack(reserved.job_id).await.unwrap();
    assert!(broker.reserve(&queue, "worker-b", 60_000).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn nack_reschedules_with_backoff_until_attempts_are_exhausted() {
    let broker = FakeQueueBroker::default();
    let queue = QueueName::default_for(UserKind::Web);
    let opts = EnqueueOptions {
        max_attempts: 3,
        backoff: BackoffPolicy::Exponential {
            base_ms: 2_000,
            max_ms: 60_000,
        },
        ..EnqueueOptions::default()
    };
    broker.enqueue(&queue, sample_job(), opts).await.unwrap();

    for attempt in 1..=3u32 {
        let reserved = broker.reserve(&queue, "worker-a", 60_000).await.unwrap().unwrap();
        assert_eq!(reserved.attempt, attempt);

        let routed_to_dlq = broker.nack(reserved.job_id, "boom".to_string(), false).await.unwrap();
        if attempt < 3 {
            assert!(!routed_to_dlq, "attempt {attempt} should still have retry budget");
            // Not yet due for retry.
            assert!(broker.reserve(&queue, "worker-a", 60_000).await.unwrap().is_none());
            tokio::time::advance(Duration::from_millis(opts.backoff.delay_for(attempt))).await;
        } else {
            assert!(routed_to_dlq, "final attempt should route to the DLQ");
        }
    }

    assert!(broker.jobs.lock().unwrap().is_empty());
    assert_eq!(broker.dead_letters.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_skips_the_retry_budget_entirely() {
    let broker = FakeQueueBroker::default();
    let queue = QueueName::default_for(UserKind::Web);
    let opts = EnqueueOptions {
        max_attempts: 5,
        ..EnqueueOptions::default()
    };
    broker.enqueue(&queue, sample_job(), opts).await.unwrap();

    let reserved = broker.reserve(&queue, "worker-a", 60_000).await.unwrap().unwrap();
    assert_eq!(reserved.attempt, 1);

    let routed_to_dlq = broker.nack(reserved.job_id, "unsupported tool".to_string(), true).await.unwrap();
    assert!(routed_to_dlq, "a fatal error must not consume retry budget first");
    assert_eq!(broker.dead_letters.lock().unwrap().get(&reserved.job_id).unwrap().attempts_made, 1);
}

#[tokio::test(start_paused = true)]
async fn renew_extends_the_lease_only_for_the_owning_worker() {
    let broker = FakeQueueBroker::default();
    let queue = QueueName::default_for(UserKind::Web);
    broker.enqueue(&queue, sample_job(), EnqueueOptions::default()).await.unwrap();
    let reserved = broker.reserve(&queue, "worker-a", 1_000).await.unwrap().unwrap();

    assert!(!broker.renew(reserved.job_id, "worker-b", 1_000).await.unwrap());
    assert!(broker.renew(reserved.job_id, "worker-a", 1_000).await.unwrap());

    tokio::time::advance(Duration::from_millis(500)).await;
    assert!(broker.reserve(&queue, "worker-b", 1_000).await.unwrap().is_none(), "renewed lease still holding");
}
