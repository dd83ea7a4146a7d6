use super::{ChannelRegistry, RealtimeBus, RealtimeEvent, PAIR_CHANNEL_PREFIX, USER_CHANNEL_PREFIX};
use crate::error::{AppError, AppResult};
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Publishes events with Redis `PUBLISH`; every node's listener fans them out.
#[derive(Clone)]
pub struct RedisBus {
    conn: ConnectionManager,
}

impl RedisBus {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl RealtimeBus for RedisBus {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> AppResult<()> {
        let payload = event
            .to_json()
            .map_err(|e| AppError::Internal(format!("serialize realtime event: {e}")))?;

        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(channel, payload).await?;

        tracing::debug!(
            channel,
            event = event.event_name(),
            receivers,
            "published realtime event"
        );
        Ok(())
    }
}

/// Forward every `chat:*` and `user:*` message into the local registry.
///
/// Runs until the pub/sub connection closes. Payloads that do not parse as a
/// [`RealtimeEvent`] are skipped.
pub async fn start_pubsub_listener(client: Client, registry: ChannelRegistry) -> AppResult<()> {
    // PubSub requires a dedicated connection, not the shared manager
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(format!("{PAIR_CHANNEL_PREFIX}*")).await?;
    pubsub.psubscribe(format!("{USER_CHANNEL_PREFIX}*")).await?;
    tracing::info!("realtime pub/sub listener subscribed");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "unreadable pub/sub payload");
                continue;
            }
        };

        match RealtimeEvent::from_json(&payload) {
            Ok(event) => {
                registry.broadcast(&channel, &event).await;
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "skipping malformed realtime payload");
            }
        }
    }

    tracing::warn!("realtime pub/sub stream ended");
    Ok(())
}
