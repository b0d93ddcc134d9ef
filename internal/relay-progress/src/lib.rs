//! Progress Bus (C8): a pub/sub channel, topic-per-task, carrying
//! task-update messages from workers to the SSE Gateway (§4.8).
//!
//! At-least-once delivery; there is no retained "last value" in the bus
//! itself — a late subscriber may miss intermediate progress but must see
//! any subsequent update. The SSE Gateway compensates by reading the
//! current Task row before subscribing (§4.9).

mod redis_bus;
mod topic;

pub use redis_bus::RedisProgressBus;
pub use topic::topic_for_task;

use async_trait::async_trait;
use futures::stream::BoxStream;
use relay_types::{ProgressEvent, RelayResult};
use uuid::Uuid;

#[async_trait]
pub trait ProgressBus: Send + Sync {
    async fn publish(&self, event: &ProgressEvent) -> RelayResult<()>;

    /// Subscribe to a single task's topic. The returned stream yields
    /// decoded [`ProgressEvent`]s only — malformed bus messages are logged
    /// and dropped rather than surfaced as stream errors, since a producer
    /// bug on one message must not kill every other subscriber's stream.
    async fn subscribe(&self, task_id: Uuid) -> RelayResult<BoxStream<'static, ProgressEvent>>;
}
