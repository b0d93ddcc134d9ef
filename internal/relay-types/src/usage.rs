use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Success,
    Failed,
}

/// Append-only usage row (§3): exactly one per terminal task attempt that
/// reached a provider (invariant 3 in §8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLog {
    pub id: Uuid,
    pub task_id: Uuid,
    pub owner_id: String,
    pub provider_id: String,
    pub tool_id: String,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub price_config: JsonValue,
    pub usage_data: JsonValue,
    pub latency_ms: i64,
    pub status: UsageStatus,
    pub created_at: DateTime<Utc>,
}

/// Append-only per-provider-call row (§3), never mutated after insert.
/// `raw_request`/`raw_response` have already had base64-shaped blobs
/// elided by the time they reach this struct — see
/// `relay-ledger::sanitize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponseRow {
    pub id: Uuid,
    pub task_id: Uuid,
    pub step_name: Option<String>,
    pub provider: String,
    pub model: Option<String>,
    pub raw_request: JsonValue,
    pub raw_response: JsonValue,
    pub latency_ms: i64,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
