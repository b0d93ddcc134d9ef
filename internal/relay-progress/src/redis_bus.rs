use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use relay_types::{ProgressEvent, RelayError, RelayResult};
use uuid::Uuid;

use crate::topic::topic_for_task;
use crate::ProgressBus;

/// `ConnectionManager` handles the publish side (cheap to clone, auto
/// reconnects); each `subscribe` opens its own dedicated pubsub connection,
/// since a subscribed connection can't also run other Redis commands.
#[derive(Clone)]
pub struct RedisProgressBus {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisProgressBus {
    pub async fn connect(redis_url: &str) -> RelayResult<Self> {
        let client = Client::open(redis_url).map_err(|e| RelayError::Internal {
            message: format!("invalid redis url: {e}"),
        })?;
        let publisher = client.get_connection_manager().await.map_err(|e| RelayError::Internal {
            message: format!("failed to connect to redis: {e}"),
        })?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl ProgressBus for RedisProgressBus {
    async fn publish(&self, event: &ProgressEvent) -> RelayResult<()> {
        let payload = serde_json::to_string(event).map_err(|e| RelayError::Internal {
            message: format!("failed to encode progress event: {e}"),
        })?;
        let mut conn = self.publisher.clone();
        let _: i64 = conn
            .publish(topic_for_task(event.task_id), payload)
            .await
            .map_err(|e| RelayError::Internal {
                message: format!("redis publish failed: {e}"),
            })?;
        Ok(())
    }

    async fn subscribe(&self, task_id: Uuid) -> RelayResult<BoxStream<'static, ProgressEvent>> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| RelayError::Internal {
            message: format!("failed to open pubsub connection: {e}"),
        })?;
        pubsub
            .subscribe(topic_for_task(task_id))
            .await
            .map_err(|e| RelayError::Internal {
                message: format!("redis subscribe failed: {e}"),
            })?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(error = %err, "dropped non-UTF8 progress bus message");
                    return None;
                }
            };
            match serde_json::from_str::<ProgressEvent>(&payload) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(error = %err, "dropped malformed progress bus message");
                    None
                }
            }
        });

        Ok(stream.boxed())
    }
}
