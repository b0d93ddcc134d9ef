//! Liveness/readiness/metrics endpoints (§10.2), mirroring the teacher's
//! `status_handler`/`health_handler` split: `/status` never touches
//! dependencies, `/health` probes them.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

const RELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn status_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "version": RELAY_VERSION }))
}

pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let db_ok = state.task_store.ping().await.is_ok();
    let queue_ok = state.queue_broker.ping().await.is_ok();

    if db_ok && queue_ok {
        Ok(Json(json!({ "gateway": "ok", "database": "ok", "queue": "ok" })))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "gateway": "ok",
                "database": if db_ok { "ok" } else { "error" },
                "queue": if queue_ok { "ok" } else { "error" },
            })),
        ))
    }
}
