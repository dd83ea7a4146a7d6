use super::PresenceStore;
use crate::error::{AppError, AppResult};
use crate::models::{PresenceRecord, UserId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

#[derive(Debug, FromRow)]
struct PresenceRow {
    user_id: String,
    is_online: bool,
    last_seen: DateTime<Utc>,
}

fn stored_user_id(raw: &str) -> AppResult<UserId> {
    UserId::parse(raw).map_err(|e| AppError::Database(format!("corrupt user id in store: {e}")))
}

#[derive(Clone)]
pub struct PgPresenceStore {
    pool: PgPool,
}

impl PgPresenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PresenceStore for PgPresenceStore {
    async fn get(&self, user: &UserId) -> AppResult<Option<PresenceRecord>> {
        let row = sqlx::query_as::<_, PresenceRow>(
            "SELECT user_id, is_online, last_seen FROM user_presence WHERE user_id = $1",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(PresenceRecord {
                user_id: stored_user_id(&r.user_id)?,
                is_online: r.is_online,
                last_seen: r.last_seen,
            })
        })
        .transpose()
    }

    async fn upsert(&self, record: &PresenceRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_presence (user_id, is_online, last_seen) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE \
             SET is_online = EXCLUDED.is_online, last_seen = EXCLUDED.last_seen",
        )
        .bind(record.user_id.as_str())
        .bind(record.is_online)
        .bind(record.last_seen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_offline_if_stale(
        &self,
        user: &UserId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE user_presence SET is_online = FALSE \
             WHERE user_id = $1 AND is_online = TRUE AND last_seen <= $2",
        )
        .bind(user.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_stale_offline(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<UserId>> {
        let users: Vec<String> = sqlx::query_scalar(
            "UPDATE user_presence SET is_online = FALSE \
             WHERE is_online = TRUE AND last_seen <= $1 \
             RETURNING user_id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        users.iter().map(|u| stored_user_id(u)).collect()
    }
}
