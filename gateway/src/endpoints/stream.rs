//! SSE Gateway (C9), §4.9.
//!
//! On connect, always sends a synthetic event built from the current Task
//! row *before* subscribing to the bus, so a client that attaches after
//! completion still observes the terminal state exactly once (§8 invariant
//! 2, scenario S5). Ordering for a given task's stream is the order a
//! single worker emitted its updates (§4.8); cross-attempt ordering is by
//! publish time and is not this endpoint's concern.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::StreamExt;
use relay_types::{RelayError, TaskStatus};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::dto::ProgressEventDto;
use crate::owner::ResolvedOwner;
use crate::state::AppState;

const CHANNEL_CAPACITY: usize = 32;

fn to_event(dto: &ProgressEventDto) -> Event {
    match serde_json::to_string(dto) {
        Ok(body) => Event::default().data(body),
        Err(err) => error_event(&err.to_string()),
    }
}

fn error_event(message: &str) -> Event {
    Event::default()
        .event("error")
        .data(serde_json::json!({ "error": message }).to_string())
}

pub async fn stream_task(
    State(state): State<AppState>,
    ResolvedOwner(owner): ResolvedOwner,
    Path(id): Path<Uuid>,
) -> Result<Sse<ReceiverStream<Result<Event, Infallible>>>, RelayError> {
    let task = state
        .task_store
        .get(id)
        .await?
        .ok_or_else(|| RelayError::TaskNotFound { id: id.to_string() })?;
    if task.owner != owner {
        return Err(RelayError::TaskNotFound { id: id.to_string() });
    }

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let already_terminal = task.status.is_terminal();
    let initial = ProgressEventDto::from(&task);

    let progress_bus = state.progress_bus.clone();
    tokio::spawn(async move {
        if tx.send(Ok(to_event(&initial))).await.is_err() {
            return;
        }
        if already_terminal {
            return;
        }

        let mut bus_stream = match progress_bus.subscribe(id).await {
            Ok(stream) => stream,
            Err(err) => {
                let _ = tx.send(Ok(error_event(&err.to_string()))).await;
                return;
            }
        };

        while let Some(event) = bus_stream.next().await {
            let dto = ProgressEventDto::from(&event);
            let is_terminal = event.status == TaskStatus::Success || event.status == TaskStatus::Failed;
            if tx.send(Ok(to_event(&dto))).await.is_err() {
                return;
            }
            if is_terminal {
                return;
            }
        }
        // The bus stream ended without a terminal event — a transport-level
        // disconnect from the bus itself (§4.9: "On bus/transport error,
        // the gateway emits an error event and closes").
        let _ = tx
            .send(Ok(error_event("progress bus stream ended unexpectedly")))
            .await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}
