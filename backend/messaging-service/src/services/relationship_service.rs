//! Who may message whom, and who they are.
//!
//! Both collaborators are owned by other subsystems; the Postgres adapters
//! below only read their tables.

use crate::error::{AppError, AppResult};
use crate::models::{UserId, UserSummary};
use sqlx::{FromRow, PgPool};

#[async_trait::async_trait]
pub trait FriendGraph: Send + Sync {
    async fn is_friend(&self, a: &UserId, b: &UserId) -> AppResult<bool>;

    /// Receiver-side setting: accept messages from anyone
    async fn allows_messages_from_non_friends(&self, user: &UserId) -> AppResult<bool>;
}

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_summary(&self, user: &UserId) -> AppResult<Option<UserSummary>>;
}

/// Exchange is allowed when the two are friends or the receiver accepts
/// messages from non-friends.
pub async fn can_exchange(
    graph: &dyn FriendGraph,
    sender: &UserId,
    receiver: &UserId,
) -> AppResult<bool> {
    if graph.is_friend(sender, receiver).await? {
        return Ok(true);
    }
    graph.allows_messages_from_non_friends(receiver).await
}

pub async fn ensure_can_exchange(
    graph: &dyn FriendGraph,
    sender: &UserId,
    receiver: &UserId,
) -> AppResult<()> {
    if can_exchange(graph, sender, receiver).await? {
        Ok(())
    } else {
        tracing::debug!(sender = %sender, receiver = %receiver, "exchange denied");
        Err(AppError::not_friends())
    }
}

/// Reading history is allowed when either side could have sent into it: the
/// two are friends, or either participant accepts messages from non-friends.
pub async fn can_view_conversation(
    graph: &dyn FriendGraph,
    requester: &UserId,
    counterpart: &UserId,
) -> AppResult<bool> {
    if can_exchange(graph, requester, counterpart).await? {
        return Ok(true);
    }
    graph.allows_messages_from_non_friends(requester).await
}

pub async fn ensure_can_view_conversation(
    graph: &dyn FriendGraph,
    requester: &UserId,
    counterpart: &UserId,
) -> AppResult<()> {
    if can_view_conversation(graph, requester, counterpart).await? {
        Ok(())
    } else {
        tracing::debug!(requester = %requester, counterpart = %counterpart, "conversation read denied");
        Err(AppError::not_friends())
    }
}

/// Reads `friendships` (accepted rows, either direction) and
/// `user_settings.allow_non_friend_messages`.
#[derive(Clone)]
pub struct PgFriendGraph {
    pool: PgPool,
}

impl PgFriendGraph {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FriendGraph for PgFriendGraph {
    async fn is_friend(&self, a: &UserId, b: &UserId) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
                 SELECT 1 FROM friendships \
                 WHERE status = 'accepted' \
                   AND ((user_id = $1 AND friend_id = $2) OR (user_id = $2 AND friend_id = $1)) \
             )",
        )
        .bind(a.as_str())
        .bind(b.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn allows_messages_from_non_friends(&self, user: &UserId) -> AppResult<bool> {
        let allowed: Option<bool> = sqlx::query_scalar(
            "SELECT allow_non_friend_messages FROM user_settings WHERE user_id = $1",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        // No settings row means the default: friends only
        Ok(allowed.unwrap_or(false))
    }
}

#[derive(Debug, FromRow)]
struct UserSummaryRow {
    display_name: String,
    avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_summary(&self, user: &UserId) -> AppResult<Option<UserSummary>> {
        let row = sqlx::query_as::<_, UserSummaryRow>(
            "SELECT display_name, avatar_url FROM users WHERE id::text = $1",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UserSummary {
            name: r.display_name,
            avatar: r.avatar_url,
        }))
    }
}
