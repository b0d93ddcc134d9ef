//! Pending-task sweeper (§4.2 failure-mode recovery), run as a background
//! loop inside the gateway process rather than a separate binary (DESIGN.md
//! Open Question 3).
//!
//! The Task Store row doesn't carry the `priceConfigSnapshot`/`stepsSnapshot`
//! that went into the original `QueueJob`, so a re-enqueue here rebuilds the
//! job from the *current* catalog entry instead of replaying the original
//! snapshot — a task orphaned long enough for the sweeper to find it is
//! already outside the "retroactive catalog edit" window the snapshot
//! exists to guard against during normal intake (DESIGN.md).

use std::time::Duration;

use chrono::Utc;
use relay_queue::QueueName;
use relay_types::{BackoffPolicy, EnqueueOptions, QueueJob};
use tokio_util::sync::CancellationToken;

use crate::metrics;
use crate::state::AppState;

pub async fn run(state: AppState, cancel: CancellationToken) {
    let interval = Duration::from_millis(state.config.sweeper_interval_ms);
    let orphan_age = chrono::Duration::milliseconds(state.config.sweeper_orphan_age_ms);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let older_than = Utc::now() - orphan_age;
        let orphans = match state.task_store.find_orphaned_pending(older_than).await {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::error!(error = %err, "sweeper: failed to query orphaned tasks");
                continue;
            }
        };
        if orphans.is_empty() {
            continue;
        }

        let mut requeued = 0u64;
        for task in orphans {
            let tool = match state.catalog.get(&task.tool_slug).await {
                Ok(tool) => tool,
                Err(err) => {
                    tracing::warn!(task_id = %task.id, tool_slug = %task.tool_slug, error = %err, "sweeper: tool no longer resolvable, skipping");
                    continue;
                }
            };
            let job = QueueJob {
                task_id: task.id,
                owner: task.owner.clone(),
                tool_id: task.tool_slug.clone(),
                tool_slug: task.tool_slug.clone(),
                input_params: task.input_params.clone(),
                price_config_snapshot: tool.price_config,
                steps_snapshot: tool.steps,
                parent_task_id: task.parent_task_id,
            };
            let queue_name = QueueName::default_for(task.owner.kind);
            let opts = EnqueueOptions {
                priority: 0,
                delay_ms: 0,
                max_attempts: state.config.default_max_attempts,
                backoff: BackoffPolicy::Exponential {
                    base_ms: state.config.backoff_base_ms,
                    max_ms: state.config.backoff_max_ms,
                },
            };
            match state.queue_broker.enqueue(&queue_name, job, opts).await {
                Ok(_) => {
                    requeued += 1;
                    tracing::info!(task_id = %task.id, "sweeper: re-enqueued orphaned pending task");
                }
                Err(err) => {
                    tracing::error!(task_id = %task.id, error = %err, "sweeper: re-enqueue failed, will retry next sweep");
                }
            }
        }
        if requeued > 0 {
            metrics::record_sweeper_requeued(requeued);
        }
    }
}
