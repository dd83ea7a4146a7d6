use super::MessageStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    ConversationSummaryRecord, MessageId, MessageRecord, MessageType, NewMessage, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, seq, sender_id, receiver_id, content, message_type, \
     is_read, is_edited, edited_at, reply_to, created_at, updated_at";

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    seq: i64,
    sender_id: String,
    receiver_id: String,
    content: String,
    message_type: String,
    is_read: bool,
    is_edited: bool,
    edited_at: Option<DateTime<Utc>>,
    reply_to: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = AppError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(MessageRecord {
            id: MessageId::from_uuid(row.id),
            seq: row.seq,
            sender_id: stored_user_id(&row.sender_id)?,
            receiver_id: stored_user_id(&row.receiver_id)?,
            content: row.content,
            message_type: row
                .message_type
                .parse::<MessageType>()
                .map_err(|e| AppError::Database(format!("corrupt message row {}: {e}", row.id)))?,
            is_read: row.is_read,
            is_edited: row.is_edited,
            edited_at: row.edited_at,
            reply_to: row.reply_to.map(MessageId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    counterpart_id: String,
    unread_count: i64,
    #[sqlx(flatten)]
    message: MessageRow,
}

fn stored_user_id(raw: &str) -> AppResult<UserId> {
    UserId::parse(raw).map_err(|e| AppError::Database(format!("corrupt user id in store: {e}")))
}

fn to_records(rows: Vec<MessageRow>) -> AppResult<Vec<MessageRecord>> {
    rows.into_iter().map(MessageRecord::try_from).collect()
}

/// Postgres-backed message store over the `direct_messages` table.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, message: NewMessage) -> AppResult<MessageRecord> {
        let sql = format!(
            "INSERT INTO direct_messages (id, sender_id, receiver_id, content, message_type, reply_to) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(message.sender_id.as_str())
            .bind(message.receiver_id.as_str())
            .bind(&message.content)
            .bind(message.message_type.as_str())
            .bind(message.reply_to.map(|id| id.as_uuid()))
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn find_by_id(&self, id: MessageId) -> AppResult<Option<MessageRecord>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM direct_messages WHERE id = $1");
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(MessageRecord::try_from).transpose()
    }

    async fn find_conversation(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<MessageRecord>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM direct_messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY seq DESC \
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(user_a.as_str())
            .bind(user_b.as_str())
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        to_records(rows)
    }

    async fn count_conversation(&self, user_a: &UserId, user_b: &UserId) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM direct_messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1)",
        )
        .bind(user_a.as_str())
        .bind(user_b.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> AppResult<Option<MessageRecord>> {
        let sql = format!(
            "UPDATE direct_messages \
             SET content = $2, is_edited = TRUE, edited_at = $3, updated_at = $3 \
             WHERE id = $1 \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id.as_uuid())
            .bind(content)
            .bind(edited_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MessageRecord::try_from).transpose()
    }

    async fn delete(&self, id: MessageId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM direct_messages WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_conversation_read(
        &self,
        reader: &UserId,
        counterpart: &UserId,
    ) -> AppResult<Vec<MessageId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE direct_messages SET is_read = TRUE \
             WHERE receiver_id = $1 AND sender_id = $2 AND is_read = FALSE \
             RETURNING id",
        )
        .bind(reader.as_str())
        .bind(counterpart.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(MessageId::from_uuid).collect())
    }

    async fn mark_read(&self, reader: &UserId, ids: &[MessageId]) -> AppResult<Vec<MessageId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(MessageId::as_uuid).collect();

        let flipped: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE direct_messages SET is_read = TRUE \
             WHERE receiver_id = $1 AND is_read = FALSE AND id = ANY($2) \
             RETURNING id",
        )
        .bind(reader.as_str())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(flipped.into_iter().map(MessageId::from_uuid).collect())
    }

    async fn unread_count(&self, user: &UserId, from: Option<&UserId>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM direct_messages \
             WHERE receiver_id = $1 AND is_read = FALSE \
               AND ($2::VARCHAR IS NULL OR sender_id = $2)",
        )
        .bind(user.as_str())
        .bind(from.map(UserId::as_str))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn recent_conversations(
        &self,
        user: &UserId,
        limit: u32,
    ) -> AppResult<Vec<ConversationSummaryRecord>> {
        let sql = format!(
            "WITH mine AS ( \
                 SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS counterpart_id, \
                        {MESSAGE_COLUMNS} \
                 FROM direct_messages \
                 WHERE sender_id = $1 OR receiver_id = $1 \
             ), latest AS ( \
                 SELECT DISTINCT ON (counterpart_id) * \
                 FROM mine \
                 ORDER BY counterpart_id, seq DESC \
             ) \
             SELECT l.*, \
                    (SELECT COUNT(*) FROM direct_messages u \
                     WHERE u.receiver_id = $1 AND u.sender_id = l.counterpart_id AND u.is_read = FALSE \
                    ) AS unread_count \
             FROM latest l \
             ORDER BY l.seq DESC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(user.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ConversationSummaryRecord {
                    counterpart_id: stored_user_id(&row.counterpart_id)?,
                    unread_count: row.unread_count,
                    last_message: row.message.try_into()?,
                })
            })
            .collect()
    }
}
