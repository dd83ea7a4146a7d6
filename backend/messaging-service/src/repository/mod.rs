//! Storage seams for messages and presence.
//!
//! Each trait has a Postgres implementation used in production and an
//! in-memory one used by single-node setups and the test suites.

pub mod memory_repository;
pub mod postgres_repository;
pub mod presence_repository;

use crate::error::AppResult;
use crate::models::{
    ConversationSummaryRecord, MessageId, MessageRecord, NewMessage, PresenceRecord, UserId,
};
use chrono::{DateTime, Utc};

pub use memory_repository::{InMemoryMessageStore, InMemoryPresenceStore};
pub use postgres_repository::PgMessageStore;
pub use presence_repository::PgPresenceStore;

#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new unread message and return it with id, seq and timestamps
    async fn append(&self, message: NewMessage) -> AppResult<MessageRecord>;

    async fn find_by_id(&self, id: MessageId) -> AppResult<Option<MessageRecord>>;

    /// One page of the pair's messages in either orientation, newest first.
    /// `page` is 1-based.
    async fn find_conversation(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<MessageRecord>>;

    async fn count_conversation(&self, user_a: &UserId, user_b: &UserId) -> AppResult<i64>;

    /// Replace the envelope and flag the message as edited
    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> AppResult<Option<MessageRecord>>;

    /// Hard delete. Returns false when nothing matched.
    async fn delete(&self, id: MessageId) -> AppResult<bool>;

    /// Flip every unread message from `counterpart` to `reader`; returns the flipped ids
    async fn mark_conversation_read(
        &self,
        reader: &UserId,
        counterpart: &UserId,
    ) -> AppResult<Vec<MessageId>>;

    /// Flip the given ids, restricted to unread messages addressed to `reader`
    async fn mark_read(&self, reader: &UserId, ids: &[MessageId]) -> AppResult<Vec<MessageId>>;

    async fn unread_count(&self, user: &UserId, from: Option<&UserId>) -> AppResult<i64>;

    /// Latest message per counterpart, most recent conversation first
    async fn recent_conversations(
        &self,
        user: &UserId,
        limit: u32,
    ) -> AppResult<Vec<ConversationSummaryRecord>>;
}

#[async_trait::async_trait]
pub trait PresenceStore: Send + Sync {
    async fn get(&self, user: &UserId) -> AppResult<Option<PresenceRecord>>;

    async fn upsert(&self, record: &PresenceRecord) -> AppResult<()>;

    /// Set `is_online = false` only if the user is still online with
    /// `last_seen <= cutoff`. Returns whether a row changed.
    async fn mark_offline_if_stale(&self, user: &UserId, cutoff: DateTime<Utc>)
        -> AppResult<bool>;

    /// Bulk form of [`PresenceStore::mark_offline_if_stale`]; returns the users flipped
    async fn mark_all_stale_offline(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<UserId>>;
}
