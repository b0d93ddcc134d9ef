//! Per-job execution (§4.3 steps 1-3): handler lookup, state transitions,
//! progress publication, lease renewal, and the terminal success/failure
//! envelope around a single [`relay_handlers::ToolHandler::execute`] call.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use relay_artifacts::ArtifactStore;
use relay_db::TaskStore;
use relay_handlers::{HandlerContext, HandlerRegistry, ProgressSink};
use relay_ledger::UsageLedger;
use relay_progress::ProgressBus;
use relay_providers::ProviderRegistry;
use relay_queue::{QueueBroker, QueueName, ReservedJob};
use relay_types::{
    ProgressEvent, QueueJob, RelayResult, Task, TaskStatus, UsageLog, UsageStatus, UserKind,
};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

pub struct ProcessorDeps {
    pub task_store: Arc<dyn TaskStore>,
    pub queue_broker: Arc<dyn QueueBroker>,
    pub providers: Arc<dyn ProviderRegistry>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub ledger: Arc<dyn UsageLedger>,
    pub progress_bus: Arc<dyn ProgressBus>,
    pub registry: Arc<HandlerRegistry>,
    /// This worker process's own configured queue prefix (§4.5) — the
    /// catalog credentials get resolved against, never the job payload's
    /// `owner.kind`.
    pub worker_kind: UserKind,
    pub http: reqwest::Client,
    pub visibility_timeout_ms: u64,
}

/// Pushes a handler's reported percentage into the Task row and onto the
/// Progress Bus, clamping regressions (§4.4) and tracking the last-published
/// value so a later failure can report it (§4.3 step 3: "failed/<last
/// progress>/error").
struct WorkerProgressSink {
    task_id: Uuid,
    owner_id: String,
    current: AtomicU8,
    task_store: Arc<dyn TaskStore>,
    progress_bus: Arc<dyn ProgressBus>,
}

#[async_trait]
impl ProgressSink for WorkerProgressSink {
    async fn report(&self, pct: u8, message: Option<String>) -> RelayResult<()> {
        let clamped = Task::clamp_progress(self.current.load(Ordering::SeqCst), i64::from(pct));
        self.current.store(clamped, Ordering::SeqCst);
        if let Some(message) = message {
            tracing::debug!(task_id = %self.task_id, %message, progress = clamped, "handler progress");
        }
        self.task_store.update_progress(self.task_id, clamped).await?;
        self.progress_bus
            .publish(&ProgressEvent {
                task_id: self.task_id,
                owner_id: self.owner_id.clone(),
                status: TaskStatus::Processing,
                progress: clamped,
                output_data: None,
                error: None,
                timestamp: Utc::now(),
            })
            .await
    }
}

pub async fn reserve_loop(
    deps: Arc<ProcessorDeps>,
    queue_name: QueueName,
    worker_id: String,
    semaphore: Arc<tokio::sync::Semaphore>,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        let permit = tokio::select! {
            () = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let reserved = deps.queue_broker.reserve(&queue_name, &worker_id, deps.visibility_timeout_ms).await;
        let job = match reserved {
            Ok(Some(job)) => job,
            Ok(None) => {
                drop(permit);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(Duration::from_millis(500)) => {}
                }
                continue;
            }
            Err(err) => {
                drop(permit);
                tracing::error!(error = %err, queue = %queue_name.as_wire(), "reserve failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let deps = deps.clone();
        let worker_id = worker_id.clone();
        tracker.spawn(async move {
            process_job(&deps, job, &worker_id).await;
            drop(permit);
        });
    }
}

async fn process_job(deps: &ProcessorDeps, reserved: ReservedJob, worker_id: &str) {
    let job = reserved.payload;
    let task_id = job.task_id;

    let Some(handler) = deps.registry.get(&job.tool_slug) else {
        tracing::warn!(tool_slug = %job.tool_slug, %task_id, "unsupported tool: no handler registered");
        if let Err(err) = deps.task_store.complete_failed(task_id, "unsupported-tool".to_string(), reserved.attempt).await {
            tracing::error!(%task_id, error = %err, "failed to mark unsupported-tool task failed");
        }
        publish_failure(deps, &job, 0, "unsupported-tool").await;
        if let Err(err) = deps.queue_broker.ack(reserved.job_id).await {
            tracing::error!(%task_id, error = %err, "failed to ack unsupported-tool job");
        }
        return;
    };

    match deps.task_store.transition_to_processing(task_id, reserved.attempt).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            // Another worker already claimed it, or it no longer exists.
            // Both are "not mine" — ack and move on rather than retry.
            if let Err(err) = deps.queue_broker.ack(reserved.job_id).await {
                tracing::error!(%task_id, error = %err, "failed to ack already-claimed job");
            }
            return;
        }
        Err(err) => {
            tracing::error!(%task_id, error = %err, "failed to transition task to processing");
            return;
        }
    }

    if let Err(err) = deps
        .progress_bus
        .publish(&ProgressEvent {
            task_id,
            owner_id: job.owner.id.clone(),
            status: TaskStatus::Processing,
            progress: 0,
            output_data: None,
            error: None,
            timestamp: Utc::now(),
        })
        .await
    {
        tracing::warn!(%task_id, error = %err, "failed to publish initial processing event");
    }

    let sink = Arc::new(WorkerProgressSink {
        task_id,
        owner_id: job.owner.id.clone(),
        current: AtomicU8::new(0),
        task_store: deps.task_store.clone(),
        progress_bus: deps.progress_bus.clone(),
    });

    let ctx = HandlerContext::new(
        task_id,
        job.owner.clone(),
        deps.worker_kind,
        job.parent_task_id,
        job.tool_slug.clone(),
        job.input_params.clone(),
        job.price_config_snapshot.clone(),
        job.steps_snapshot.clone(),
        deps.providers.clone(),
        deps.artifacts.clone(),
        deps.ledger.clone(),
        sink.clone(),
        deps.http.clone(),
    );

    let renew_cancel = CancellationToken::new();
    let renew_handle = spawn_renewal(
        deps.queue_broker.clone(),
        reserved.job_id,
        worker_id.to_string(),
        deps.visibility_timeout_ms,
        renew_cancel.clone(),
    );

    let started = Instant::now();
    let result = handler.execute(&ctx).await;
    renew_cancel.cancel();
    let _ = renew_handle.await;
    let latency_ms = started.elapsed().as_millis() as i64;

    match result {
        Ok(output) => {
            let task = match deps.task_store.complete_success(task_id, output.output_data.clone()).await {
                Ok(task) => task,
                Err(err) => {
                    tracing::error!(%task_id, error = %err, "failed to record task success");
                    return;
                }
            };
            if let Err(err) = deps
                .progress_bus
                .publish(&ProgressEvent {
                    task_id,
                    owner_id: job.owner.id.clone(),
                    status: TaskStatus::Success,
                    progress: 100,
                    output_data: task.output_data.clone(),
                    error: None,
                    timestamp: Utc::now(),
                })
                .await
            {
                tracing::warn!(%task_id, error = %err, "failed to publish success event");
            }

            let usage_log = UsageLog {
                id: Uuid::now_v7(),
                task_id,
                owner_id: job.owner.id.clone(),
                provider_id: output
                    .usage_data
                    .get("provider")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                tool_id: job.tool_slug.clone(),
                model_name: output.usage_data.get("model").and_then(JsonValue::as_str).map(str::to_string),
                model_version: None,
                price_config: serde_json::to_value(&job.price_config_snapshot).unwrap_or(JsonValue::Null),
                usage_data: output.usage_data,
                latency_ms,
                status: UsageStatus::Success,
                created_at: Utc::now(),
            };
            deps.ledger.record_usage(usage_log).await;
            crate::metrics::record_job_completed(&job.tool_slug, "success", latency_ms);

            if let Err(err) = deps.queue_broker.ack(reserved.job_id).await {
                tracing::error!(%task_id, error = %err, "failed to ack completed job");
            }
        }
        Err(err) => {
            let last_progress = sink.current.load(Ordering::SeqCst);
            let error_message = err.to_string();
            let fatal = err.is_fatal();

            // The broker alone knows whether this job still has retry
            // budget left; only once it says "no" (DLQ, or the error is
            // fatal and skips the budget entirely) does the task move to
            // its terminal `failed` state. Until then the Task Store must
            // stay in a retryable shape, or the next reservation's
            // `transition_to_processing` (which only matches `pending`)
            // would silently ack the job without ever running it again.
            let routed_to_dlq = match deps.queue_broker.nack(reserved.job_id, error_message.clone(), fatal).await {
                Ok(routed) => routed,
                Err(nack_err) => {
                    tracing::error!(%task_id, error = %nack_err, "failed to nack job");
                    false
                }
            };

            if routed_to_dlq {
                tracing::warn!(%task_id, tool_slug = %job.tool_slug, fatal, "job routed to dead-letter queue");
                if let Err(store_err) = deps
                    .task_store
                    .complete_failed(task_id, error_message.clone(), reserved.attempt)
                    .await
                {
                    tracing::error!(%task_id, error = %store_err, "failed to record task failure");
                }
                publish_failure(deps, &job, last_progress, &error_message).await;

                let usage_log = UsageLog {
                    id: Uuid::now_v7(),
                    task_id,
                    owner_id: job.owner.id.clone(),
                    provider_id: "unknown".to_string(),
                    tool_id: job.tool_slug.clone(),
                    model_name: None,
                    model_version: None,
                    price_config: serde_json::to_value(&job.price_config_snapshot).unwrap_or(JsonValue::Null),
                    usage_data: serde_json::json!({ "error": error_message }),
                    latency_ms,
                    status: UsageStatus::Failed,
                    created_at: Utc::now(),
                };
                deps.ledger.record_usage(usage_log).await;
                crate::metrics::record_job_completed(&job.tool_slug, "failed", latency_ms);
            } else {
                if let Err(store_err) = deps.task_store.revert_to_pending(task_id, error_message.clone()).await {
                    tracing::error!(%task_id, error = %store_err, "failed to revert task to pending for retry");
                }
                tracing::info!(%task_id, tool_slug = %job.tool_slug, attempt = reserved.attempt, "job will be retried");
                crate::metrics::record_job_completed(&job.tool_slug, "retrying", latency_ms);
            }
        }
    }
}

async fn publish_failure(deps: &ProcessorDeps, job: &QueueJob, last_progress: u8, error: &str) {
    if let Err(err) = deps
        .progress_bus
        .publish(&ProgressEvent {
            task_id: job.task_id,
            owner_id: job.owner.id.clone(),
            status: TaskStatus::Failed,
            progress: last_progress,
            output_data: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        })
        .await
    {
        tracing::warn!(task_id = %job.task_id, error = %err, "failed to publish failure event");
    }
}

fn spawn_renewal(
    queue_broker: Arc<dyn QueueBroker>,
    job_id: Uuid,
    worker_id: String,
    visibility_timeout_ms: u64,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_millis((visibility_timeout_ms / 2).max(1_000));
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            if cancel.is_cancelled() {
                break;
            }
            match queue_broker.renew(job_id, &worker_id, visibility_timeout_ms).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(%job_id, "lease renewal failed: job no longer owned by this worker");
                    break;
                }
                Err(err) => tracing::error!(%job_id, error = %err, "lease renewal error"),
            }
        }
    })
}
