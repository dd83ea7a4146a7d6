use crate::models::ids::UserId;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Last known presence of a user, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

impl PresenceRecord {
    pub fn online(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            is_online: true,
            last_seen: at,
        }
    }

    pub fn offline(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            is_online: false,
            last_seen: at,
        }
    }

    /// Online flag is set but the last heartbeat is at least `ttl` old.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_online && now - self.last_seen >= ttl
    }

    pub fn is_effectively_online(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_online && now - self.last_seen < ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_boundary() {
        let now = Utc::now();
        let ttl = Duration::minutes(5);
        let user = UserId::parse("alice").unwrap();

        let fresh = PresenceRecord::online(user.clone(), now - Duration::minutes(4));
        assert!(fresh.is_effectively_online(now, ttl));
        assert!(!fresh.is_stale(now, ttl));

        let exact = PresenceRecord::online(user.clone(), now - ttl);
        assert!(exact.is_stale(now, ttl));
        assert!(!exact.is_effectively_online(now, ttl));

        let offline = PresenceRecord::offline(user, now - Duration::minutes(10));
        assert!(!offline.is_stale(now, ttl));
        assert!(!offline.is_effectively_online(now, ttl));
    }
}
