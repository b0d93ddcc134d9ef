//! Intake Service (C5), §4.2.

use axum::extract::State;
use axum::Json;
use relay_db::NewTask;
use relay_queue::QueueName;
use relay_types::{
    BackoffPolicy, EnqueueOptions, QueueJob, RelayError, RelayResult, Task, TaskStatus,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::dto::IntakeResponse;
use crate::owner::ResolvedOwner;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub tool_id: Option<String>,
    pub tool_slug: Option<String>,
    #[serde(default)]
    pub input_params: JsonValue,
    pub idempotency_key: Option<String>,
    pub parent_task_id: Option<Uuid>,
}

/// `POST /tasks` (§6, §4.2). `toolId` and `toolSlug` are accepted as
/// synonyms — the Tool Catalog (§4.6) is keyed solely by slug, so a caller
/// that only has the admin-CRUD-assigned id passes it through unchanged
/// rather than the gateway needing a second lookup table for something
/// that's out of the core's scope (§1).
pub async fn create_task(
    State(state): State<AppState>,
    ResolvedOwner(owner): ResolvedOwner,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<IntakeResponse>, RelayError> {
    if !state.config.accepted_owners.accepts(owner.kind) {
        return Err(RelayError::InvalidRequest {
            message: format!("this gateway does not accept {} intake", owner.kind),
        });
    }

    let tool_slug = body
        .tool_slug
        .or(body.tool_id)
        .ok_or_else(|| RelayError::InvalidRequest {
            message: "one of toolId or toolSlug is required".to_string(),
        })?;

    // Step 1: resolve the tool; `unknown-tool` if absent or inactive (§4.2).
    let tool = state.catalog.get(&tool_slug).await?;

    // Step 2: idempotency lookup (§4.2 step 2, §8 invariant 5).
    if let Some(key) = &body.idempotency_key {
        if let Some(existing) = state
            .task_store
            .find_by_idempotency_key(&owner, &tool_slug, key)
            .await?
        {
            if existing.status == TaskStatus::Failed {
                return Err(RelayError::IdempotencyConflict {
                    key: key.clone(),
                    existing_task_id: existing.id.to_string(),
                });
            }
            return Ok(Json(IntakeResponse {
                task_id: existing.id,
                status: existing.status,
                message: "existing task returned for idempotency key".to_string(),
            }));
        }
    }

    // Step 3: parent-task validation (§4.2 step 3, §8 invariant 4).
    if let Some(parent_id) = body.parent_task_id {
        let parent = state
            .task_store
            .get(parent_id)
            .await?
            .ok_or_else(|| RelayError::InvalidParent {
                message: format!("parent task {parent_id} does not exist"),
            })?;
        if !parent.can_parent(&owner) {
            return Err(RelayError::InvalidParent {
                message: format!(
                    "parent task {parent_id} must belong to the same owner and be status=success"
                ),
            });
        }
    }

    // Step 4: snapshot price config and steps so later catalog edits never
    // retroactively alter in-flight work.
    let task_id = Uuid::now_v7();
    let new_task = NewTask {
        id: task_id,
        owner: owner.clone(),
        tool_slug: tool_slug.clone(),
        input_params: body.input_params.clone(),
        idempotency_key: body.idempotency_key.clone(),
        parent_task_id: body.parent_task_id,
    };

    // Step 5: insert the task row with status=pending, progress=0.
    let task: Task = state.task_store.insert(new_task).await?;

    // Step 6: enqueue on the owner-appropriate queue, maxAttempts=3,
    // exponential backoff base 2s (§4.2 step 6).
    let queue_name = QueueName::default_for(owner.kind);
    let job = QueueJob {
        task_id,
        owner: owner.clone(),
        tool_id: tool_slug.clone(),
        tool_slug: tool_slug.clone(),
        input_params: body.input_params,
        price_config_snapshot: tool.price_config,
        steps_snapshot: tool.steps,
        parent_task_id: body.parent_task_id,
    };
    let opts = EnqueueOptions {
        priority: 0,
        delay_ms: 0,
        max_attempts: state.config.default_max_attempts,
        backoff: BackoffPolicy::Exponential {
            base_ms: state.config.backoff_base_ms,
            max_ms: state.config.backoff_max_ms,
        },
    };

    enqueue_or_leave_for_sweeper(&state, &queue_name, job, opts).await?;
    crate::metrics::record_task_enqueued(&tool_slug);

    Ok(Json(IntakeResponse {
        task_id: task.id,
        status: task.status,
        message: "task accepted".to_string(),
    }))
}

/// Enqueue failure after the task row is already written is recovered by
/// the sweeper (§4.2's failure modes) rather than rolled back — the task
/// stays `pending` and is picked up once it's old enough. The caller still
/// sees a 503, matching §6's documented error.
async fn enqueue_or_leave_for_sweeper(
    state: &AppState,
    queue_name: &QueueName,
    job: QueueJob,
    opts: EnqueueOptions,
) -> RelayResult<()> {
    state
        .queue_broker
        .enqueue(queue_name, job, opts)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "enqueue failed after task insert; leaving for the sweeper");
            RelayError::EnqueueUnavailable {
                message: err.to_string(),
            }
        })?;
    Ok(())
}
