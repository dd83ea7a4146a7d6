use crate::error::AppResult;
use crate::metrics;
use crate::models::{PresenceRecord, UserId};
use crate::realtime::events::PresencePayload;
use crate::realtime::{channel_for_user, publish_best_effort, RealtimeBus, RealtimeEvent};
use crate::repository::PresenceStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const DEFAULT_PRESENCE_TTL_SECS: i64 = 300;

/// Online/offline tracking with staleness correction.
///
/// Presence is display-only; nothing in the messaging path consults it for
/// authorization.
#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn PresenceStore>,
    bus: Arc<dyn RealtimeBus>,
    ttl: Duration,
    publish_timeout: std::time::Duration,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn PresenceStore>, bus: Arc<dyn RealtimeBus>) -> Self {
        Self {
            store,
            bus,
            ttl: Duration::seconds(DEFAULT_PRESENCE_TTL_SECS),
            publish_timeout: std::time::Duration::from_millis(500),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn heartbeat(&self, user: &UserId) -> AppResult<()> {
        let now = Utc::now();
        let was_online = self
            .store
            .get(user)
            .await?
            .map_or(false, |r| r.is_effectively_online(now, self.ttl));

        self.store
            .upsert(&PresenceRecord::online(user.clone(), now))
            .await?;

        if !was_online {
            tracing::debug!(user_id = %user, "user came online");
            self.publish(RealtimeEvent::UserOnline(PresencePayload {
                user_id: user.clone(),
                last_seen: now,
            }))
            .await;
        }
        Ok(())
    }

    pub async fn mark_offline(&self, user: &UserId) -> AppResult<()> {
        let now = Utc::now();
        self.store
            .upsert(&PresenceRecord::offline(user.clone(), now))
            .await?;

        tracing::debug!(user_id = %user, "user went offline");
        self.publish(RealtimeEvent::UserOffline(PresencePayload {
            user_id: user.clone(),
            last_seen: now,
        }))
        .await;
        Ok(())
    }

    pub async fn is_effectively_online(&self, user: &UserId) -> AppResult<bool> {
        Ok(self.presence(user).await?.map_or(false, |r| r.is_online))
    }

    /// Current presence with staleness already corrected in the store.
    pub async fn presence(&self, user: &UserId) -> AppResult<Option<PresenceRecord>> {
        let Some(mut record) = self.store.get(user).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if record.is_stale(now, self.ttl) {
            // Conditional so a heartbeat landing in between is kept
            let cutoff = now - self.ttl;
            if self.store.mark_offline_if_stale(user, cutoff).await? {
                tracing::info!(user_id = %user, last_seen = %record.last_seen, "stale presence corrected");
                self.publish_offline(user, record.last_seen).await;
                record.is_online = false;
            } else {
                // A heartbeat won the race; report what the store holds now
                record = self.store.get(user).await?.unwrap_or(record);
                record.is_online = record.is_effectively_online(now, self.ttl);
            }
        }
        Ok(Some(record))
    }

    /// Flip every stale online record to offline. Returns the users flipped.
    pub async fn sweep_stale(&self) -> AppResult<Vec<UserId>> {
        self.sweep_stale_at(Utc::now()).await
    }

    pub async fn sweep_stale_at(&self, now: DateTime<Utc>) -> AppResult<Vec<UserId>> {
        let flipped = match self.store.mark_all_stale_offline(now - self.ttl).await {
            Ok(flipped) => flipped,
            Err(e) => {
                metrics::record_presence_sweep_run("error");
                return Err(e);
            }
        };
        metrics::record_presence_sweep_run("success");
        metrics::record_presence_sweep_flipped(flipped.len() as u64);
        for user in &flipped {
            self.publish_offline(user, now).await;
        }
        if !flipped.is_empty() {
            tracing::info!(count = flipped.len(), "presence sweep marked users offline");
        }
        Ok(flipped)
    }

    async fn publish_offline(&self, user: &UserId, last_seen: DateTime<Utc>) {
        self.publish(RealtimeEvent::UserOffline(PresencePayload {
            user_id: user.clone(),
            last_seen,
        }))
        .await;
    }

    async fn publish(&self, event: RealtimeEvent) {
        let user = match &event {
            RealtimeEvent::UserOnline(p) | RealtimeEvent::UserOffline(p) => &p.user_id,
            _ => return,
        };
        let channel = channel_for_user(user);
        publish_best_effort(self.bus.as_ref(), &channel, &event, self.publish_timeout).await;
    }
}

/// Periodically run [`PresenceTracker::sweep_stale`] until the task is aborted.
pub fn spawn_presence_sweeper(
    tracker: PresenceTracker,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = tracker.sweep_stale().await {
                tracing::warn!(error = %e, "presence sweep failed");
            }
        }
    })
}
