use super::{RealtimeBus, RealtimeEvent};
use crate::error::AppResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

/// What a subscriber receives: the event plus the channel it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub channel: String,
    pub event: RealtimeEvent,
}

/// Local subscribers keyed by channel name.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    // channel -> list of subscriber senders
    inner: Arc<RwLock<HashMap<String, Vec<UnboundedSender<ChannelMessage>>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, channel: &str) -> UnboundedReceiver<ChannelMessage> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.entry(channel.to_string()).or_default().push(tx);
        rx
    }

    /// Deliver to every live subscriber of `channel`, pruning closed ones.
    /// Returns how many subscribers received the event.
    pub async fn broadcast(&self, channel: &str, event: &RealtimeEvent) -> usize {
        let mut guard = self.inner.write().await;
        let Some(list) = guard.get_mut(channel) else {
            return 0;
        };

        let msg = ChannelMessage {
            channel: channel.to_string(),
            event: event.clone(),
        };
        list.retain(|sender| sender.send(msg.clone()).is_ok());
        let delivered = list.len();
        if list.is_empty() {
            guard.remove(channel);
        }
        delivered
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .read()
            .await
            .get(channel)
            .map_or(0, |list| list.len())
    }
}

/// In-process bus for single-node deployments.
#[derive(Default, Clone)]
pub struct LocalBus {
    registry: ChannelRegistry,
}

impl LocalBus {
    pub fn new(registry: ChannelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }
}

#[async_trait::async_trait]
impl RealtimeBus for LocalBus {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> AppResult<()> {
        let delivered = self.registry.broadcast(channel, event).await;
        tracing::trace!(channel, delivered, "local fan-out");
        Ok(())
    }
}
