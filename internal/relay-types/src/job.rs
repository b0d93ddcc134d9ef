use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::owner::Owner;
use crate::tool::{PriceConfig, ToolStep};

/// Backoff shape for retries (§4.1). `base_ms` is the initial delay;
/// `max_ms` caps it so a flaky provider can't push a retry out for hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    Exponential { base_ms: u64, max_ms: u64 },
    Fixed { delay_ms: u64 },
}

impl BackoffPolicy {
    /// Delay before the `attempt`-th retry (1-indexed: the delay before
    /// the *second* attempt is `delay_for(1)`).
    pub fn delay_for(self, attempt: u32) -> u64 {
        match self {
            BackoffPolicy::Fixed { delay_ms } => delay_ms,
            BackoffPolicy::Exponential { base_ms, max_ms } => {
                let shift = attempt.saturating_sub(1).min(32);
                let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
                base_ms.saturating_mul(factor).min(max_ms)
            }
        }
    }
}

/// Options passed to `enqueue` (§4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnqueueOptions {
    pub priority: i32,
    pub delay_ms: u64,
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            delay_ms: 0,
            max_attempts: 3,
            backoff: BackoffPolicy::Exponential {
                base_ms: 2_000,
                max_ms: 60_000,
            },
        }
    }
}

/// The payload carried by a single queue job (§4.1). `price_config_snapshot`
/// and `steps_snapshot` are captured at intake time so that later catalog
/// edits never retroactively alter in-flight work (§4.2 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub task_id: Uuid,
    pub owner: Owner,
    pub tool_id: String,
    pub tool_slug: String,
    pub input_params: JsonValue,
    pub price_config_snapshot: PriceConfig,
    pub steps_snapshot: Vec<ToolStep>,
    pub parent_task_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = BackoffPolicy::Exponential {
            base_ms: 2_000,
            max_ms: 10_000,
        };
        assert_eq!(policy.delay_for(1), 2_000);
        assert_eq!(policy.delay_for(2), 4_000);
        assert_eq!(policy.delay_for(3), 8_000);
        assert_eq!(policy.delay_for(4), 10_000, "capped at max_ms");
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = BackoffPolicy::Fixed { delay_ms: 500 };
        assert_eq!(policy.delay_for(1), 500);
        assert_eq!(policy.delay_for(9), 500);
    }
}
