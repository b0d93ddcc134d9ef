use async_trait::async_trait;
use relay_types::RelayResult;

/// `progressSink(pct, message?)` from §4.4. The worker's concrete
/// implementation updates the Task row and publishes on the Progress Bus;
/// handlers only ever see this trait, never the store or bus directly.
///
/// `pct` MUST be monotonically non-decreasing within a task attempt — the
/// implementation is responsible for clamping regressions (§4.4), not the
/// handler calling it.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, pct: u8, message: Option<String>) -> RelayResult<()>;
}
