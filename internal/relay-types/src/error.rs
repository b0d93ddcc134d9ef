use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// The shared error type every crate in the workspace converts into at its
/// boundary, so a failure raised deep inside a handler can be returned all
/// the way out through an axum endpoint without a per-crate translation
/// layer — mirrors how `durable_tools::ToolError` composes from
/// `durable::TaskError` plus its own variants.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("unknown tool: {slug}")]
    UnknownTool { slug: String },

    #[error("unsupported tool (no handler registered): {slug}")]
    UnsupportedTool { slug: String },

    #[error("invalid parent task: {message}")]
    InvalidParent { message: String },

    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("idempotency conflict for key {key}: existing task {existing_task_id} is failed")]
    IdempotencyConflict {
        key: String,
        existing_task_id: String,
    },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("queue broker unavailable: {message}")]
    EnqueueUnavailable { message: String },

    #[error("provider not found: {slug}")]
    ProviderNotFound { slug: String },

    #[error("provider {slug} has no usable credentials")]
    ProviderNoApiKey { slug: String },

    #[error("database error: {message}")]
    Database { message: String },

    #[error("artifact store error: {message}")]
    Artifact { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("no route for {method} {path}")]
    RouteNotFound { path: String, method: String },
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    /// Fatal configuration errors are never retried (§7); everything else
    /// that reaches this point after a handler failure is transient and
    /// goes back through the broker's retry/backoff path.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::UnknownTool { .. }
                | RelayError::UnsupportedTool { .. }
                | RelayError::ProviderNotFound { .. }
                | RelayError::ProviderNoApiKey { .. }
                | RelayError::InvalidParent { .. }
                | RelayError::InvalidRequest { .. }
        )
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::UnknownTool { .. }
            | RelayError::InvalidParent { .. }
            | RelayError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            RelayError::TaskNotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::IdempotencyConflict { .. } => StatusCode::CONFLICT,
            RelayError::EnqueueUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::UnsupportedTool { .. }
            | RelayError::ProviderNotFound { .. }
            | RelayError::ProviderNoApiKey { .. }
            | RelayError::Database { .. }
            | RelayError::Artifact { .. }
            | RelayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
