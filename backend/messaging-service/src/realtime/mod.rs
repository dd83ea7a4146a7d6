//! Realtime fan-out.
//!
//! Channels are plain strings: `chat:{min}:{max}` for a conversation and
//! `user:{id}` for a single user. Delivery is at-most-once; a failed or slow
//! publish is logged and dropped, never surfaced to the caller.

pub mod events;
pub mod pubsub;
pub mod registry;

use crate::error::AppResult;
use crate::metrics::{self, PublishResult};
use crate::models::UserId;
use std::time::Duration;

pub use events::RealtimeEvent;
pub use pubsub::{start_pubsub_listener, RedisBus};
pub use registry::{ChannelMessage, ChannelRegistry, LocalBus};

pub const PAIR_CHANNEL_PREFIX: &str = "chat:";
pub const USER_CHANNEL_PREFIX: &str = "user:";

/// Conversation channel; identical for either argument order.
pub fn channel_for_pair(a: &UserId, b: &UserId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{PAIR_CHANNEL_PREFIX}{low}:{high}")
}

pub fn channel_for_user(user: &UserId) -> String {
    format!("{USER_CHANNEL_PREFIX}{user}")
}

#[async_trait::async_trait]
pub trait RealtimeBus: Send + Sync {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> AppResult<()>;
}

/// Publish under `timeout`, logging instead of returning any failure.
pub async fn publish_best_effort(
    bus: &dyn RealtimeBus,
    channel: &str,
    event: &RealtimeEvent,
    timeout: Duration,
) {
    match tokio::time::timeout(timeout, bus.publish(channel, event)).await {
        Ok(Ok(())) => {
            metrics::record_realtime_publish(event.event_name(), PublishResult::Ok);
            tracing::debug!(channel, event = event.event_name(), "realtime event published");
        }
        Ok(Err(e)) => {
            metrics::record_realtime_publish(event.event_name(), PublishResult::Error);
            tracing::warn!(channel, event = event.event_name(), error = %e, "realtime publish failed");
        }
        Err(_) => {
            metrics::record_realtime_publish(event.event_name(), PublishResult::Timeout);
            tracing::warn!(
                channel,
                event = event.event_name(),
                timeout_ms = timeout.as_millis() as u64,
                "realtime publish timed out"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_channel_is_order_independent() {
        let alice = UserId::parse("alice").unwrap();
        let bob = UserId::parse("bob").unwrap();

        assert_eq!(channel_for_pair(&alice, &bob), "chat:alice:bob");
        assert_eq!(channel_for_pair(&bob, &alice), "chat:alice:bob");
        assert_eq!(channel_for_user(&bob), "user:bob");
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl RealtimeBus for Unreachable {
        async fn publish(&self, _: &str, _: &RealtimeEvent) -> AppResult<()> {
            Err(crate::error::AppError::Transport("redis down".into()))
        }
    }

    #[tokio::test]
    async fn test_swallowed_failures_are_counted() {
        let event = RealtimeEvent::UserOffline(events::PresencePayload {
            user_id: UserId::parse("alice").unwrap(),
            last_seen: chrono::Utc::now(),
        });
        let before = metrics::realtime_publish_count("user-offline", PublishResult::Error);

        publish_best_effort(&Unreachable, "user:alice", &event, Duration::from_millis(50)).await;

        assert!(metrics::realtime_publish_count("user-offline", PublishResult::Error) > before);
    }
}
