use super::{MessageStore, PresenceStore};
use crate::error::AppResult;
use crate::models::{
    ConversationSummaryRecord, MessageId, MessageRecord, NewMessage, PresenceRecord, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct MessageTable {
    next_seq: i64,
    by_seq: BTreeMap<i64, MessageRecord>,
    seq_by_id: HashMap<MessageId, i64>,
}

impl MessageTable {
    fn get_mut(&mut self, id: &MessageId) -> Option<&mut MessageRecord> {
        let seq = self.seq_by_id.get(id)?;
        self.by_seq.get_mut(seq)
    }
}

/// Process-local message store. One write lock serializes every mutation,
/// which gives the same atomicity the single-statement SQL updates do.
#[derive(Default)]
pub struct InMemoryMessageStore {
    table: RwLock<MessageTable>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.by_seq.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: NewMessage) -> AppResult<MessageRecord> {
        let mut table = self.table.write().await;
        table.next_seq += 1;
        let seq = table.next_seq;
        let now = Utc::now();

        let record = MessageRecord {
            id: MessageId::new(),
            seq,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            message_type: message.message_type,
            is_read: false,
            is_edited: false,
            edited_at: None,
            reply_to: message.reply_to,
            created_at: now,
            updated_at: now,
        };

        table.seq_by_id.insert(record.id, seq);
        table.by_seq.insert(seq, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: MessageId) -> AppResult<Option<MessageRecord>> {
        let table = self.table.read().await;
        Ok(table
            .seq_by_id
            .get(&id)
            .and_then(|seq| table.by_seq.get(seq))
            .cloned())
    }

    async fn find_conversation(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<MessageRecord>> {
        let offset = page.saturating_sub(1) as usize * limit as usize;
        let table = self.table.read().await;

        Ok(table
            .by_seq
            .values()
            .rev()
            .filter(|m| m.is_between(user_a, user_b))
            .skip(offset)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_conversation(&self, user_a: &UserId, user_b: &UserId) -> AppResult<i64> {
        let table = self.table.read().await;
        Ok(table
            .by_seq
            .values()
            .filter(|m| m.is_between(user_a, user_b))
            .count() as i64)
    }

    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> AppResult<Option<MessageRecord>> {
        let mut table = self.table.write().await;
        Ok(table.get_mut(&id).map(|record| {
            record.content = content.to_string();
            record.is_edited = true;
            record.edited_at = Some(edited_at);
            record.updated_at = edited_at;
            record.clone()
        }))
    }

    async fn delete(&self, id: MessageId) -> AppResult<bool> {
        let mut table = self.table.write().await;
        match table.seq_by_id.remove(&id) {
            Some(seq) => Ok(table.by_seq.remove(&seq).is_some()),
            None => Ok(false),
        }
    }

    async fn mark_conversation_read(
        &self,
        reader: &UserId,
        counterpart: &UserId,
    ) -> AppResult<Vec<MessageId>> {
        let mut table = self.table.write().await;
        let mut flipped = Vec::new();
        for record in table.by_seq.values_mut() {
            if !record.is_read && &record.receiver_id == reader && &record.sender_id == counterpart
            {
                record.is_read = true;
                flipped.push(record.id);
            }
        }
        Ok(flipped)
    }

    async fn mark_read(&self, reader: &UserId, ids: &[MessageId]) -> AppResult<Vec<MessageId>> {
        let mut table = self.table.write().await;
        let mut flipped = Vec::new();
        let mut seen: HashSet<&MessageId> = HashSet::new();
        for id in ids.iter().filter(|id| seen.insert(*id)) {
            if let Some(record) = table.get_mut(id) {
                if !record.is_read && &record.receiver_id == reader {
                    record.is_read = true;
                    flipped.push(record.id);
                }
            }
        }
        Ok(flipped)
    }

    async fn unread_count(&self, user: &UserId, from: Option<&UserId>) -> AppResult<i64> {
        let table = self.table.read().await;
        Ok(table
            .by_seq
            .values()
            .filter(|m| !m.is_read && &m.receiver_id == user)
            .filter(|m| from.map_or(true, |f| &m.sender_id == f))
            .count() as i64)
    }

    async fn recent_conversations(
        &self,
        user: &UserId,
        limit: u32,
    ) -> AppResult<Vec<ConversationSummaryRecord>> {
        let table = self.table.read().await;

        let mut unread: HashMap<&UserId, i64> = HashMap::new();
        for m in table.by_seq.values() {
            if !m.is_read && &m.receiver_id == user {
                *unread.entry(&m.sender_id).or_default() += 1;
            }
        }

        let mut seen: HashSet<&UserId> = HashSet::new();
        let mut summaries = Vec::new();
        for m in table.by_seq.values().rev().filter(|m| m.involves(user)) {
            if summaries.len() >= limit as usize {
                break;
            }
            let counterpart = m.counterpart_of(user);
            if seen.insert(counterpart) {
                summaries.push(ConversationSummaryRecord {
                    counterpart_id: counterpart.clone(),
                    last_message: m.clone(),
                    unread_count: unread.get(counterpart).copied().unwrap_or(0),
                });
            }
        }
        Ok(summaries)
    }
}

#[derive(Default)]
pub struct InMemoryPresenceStore {
    records: RwLock<HashMap<UserId, PresenceRecord>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn get(&self, user: &UserId) -> AppResult<Option<PresenceRecord>> {
        Ok(self.records.read().await.get(user).cloned())
    }

    async fn upsert(&self, record: &PresenceRecord) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn mark_offline_if_stale(
        &self,
        user: &UserId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(user) {
            Some(r) if r.is_online && r.last_seen <= cutoff => {
                r.is_online = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_stale_offline(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<UserId>> {
        let mut records = self.records.write().await;
        let mut flipped = Vec::new();
        for r in records.values_mut() {
            if r.is_online && r.last_seen <= cutoff {
                r.is_online = false;
                flipped.push(r.user_id.clone());
            }
        }
        Ok(flipped)
    }
}
