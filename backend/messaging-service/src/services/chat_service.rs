use crate::error::{AppError, AppResult};
use crate::models::{
    ConversationPage, ConversationSummary, ConversationSummaryRecord, Message, MessageId,
    MessageRecord, MessageType, NewMessage, UserId,
};
use crate::realtime::events::{DeletedPayload, MessagePayload, StatusPayload, TypingPayload};
use crate::realtime::{
    channel_for_pair, channel_for_user, publish_best_effort, RealtimeBus, RealtimeEvent,
};
use crate::repository::MessageStore;
use crate::services::inflight::InflightRequests;
use crate::services::relationship_service::{
    ensure_can_exchange, ensure_can_view_conversation, FriendGraph, UserDirectory,
};
use chrono::Utc;
use crypto_core::{ConversationKey, ConversationKeyDeriver, MessageCipher};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Shown in place of a message body that fails authentication.
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[message could not be decrypted]";

#[derive(Debug, Clone)]
pub struct ChatLimits {
    pub max_message_chars: usize,
    pub max_page_size: u32,
    pub publish_timeout: Duration,
    pub inflight_ttl: Duration,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_message_chars: 2000,
            max_page_size: 100,
            publish_timeout: Duration::from_millis(500),
            inflight_ttl: Duration::from_secs(5),
        }
    }
}

type UnreadKey = (UserId, Option<UserId>);

/// Direct-message orchestration: authorize, encrypt, persist, then publish.
///
/// Publication always happens after the durable write and its failure never
/// fails the operation.
pub struct ChatService {
    store: Arc<dyn MessageStore>,
    friends: Arc<dyn FriendGraph>,
    directory: Arc<dyn UserDirectory>,
    bus: Arc<dyn RealtimeBus>,
    deriver: ConversationKeyDeriver,
    cipher: MessageCipher,
    limits: ChatLimits,
    unread_requests: InflightRequests<UnreadKey, i64>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        friends: Arc<dyn FriendGraph>,
        directory: Arc<dyn UserDirectory>,
        bus: Arc<dyn RealtimeBus>,
    ) -> Self {
        let limits = ChatLimits::default();
        Self {
            store,
            friends,
            directory,
            bus,
            deriver: ConversationKeyDeriver::unkeyed(),
            cipher: MessageCipher::new(),
            unread_requests: InflightRequests::new(limits.inflight_ttl),
            limits,
        }
    }

    pub fn with_key_deriver(mut self, deriver: ConversationKeyDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn with_limits(mut self, limits: ChatLimits) -> Self {
        self.unread_requests = InflightRequests::new(limits.inflight_ttl);
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ChatLimits {
        &self.limits
    }

    pub async fn send_message(
        &self,
        sender: &UserId,
        receiver: &UserId,
        content: &str,
        message_type: MessageType,
        reply_to: Option<MessageId>,
    ) -> AppResult<Message> {
        ensure_distinct(sender, receiver)?;
        let content = self.validate_content(content)?;

        if self.directory.get_summary(receiver).await?.is_none() {
            return Err(AppError::NotFound(format!("user {receiver}")));
        }

        if let Some(reply_id) = reply_to {
            match self.store.find_by_id(reply_id).await? {
                Some(target) if target.is_between(sender, receiver) => {}
                _ => return Err(AppError::NotFound(format!("reply target {reply_id}"))),
            }
        }

        ensure_can_exchange(self.friends.as_ref(), sender, receiver).await?;

        let key = self.key_for(sender, receiver);
        let envelope = self.cipher.encrypt(&content, &key)?;

        let record = self
            .store
            .append(NewMessage {
                sender_id: sender.clone(),
                receiver_id: receiver.clone(),
                content: envelope,
                message_type,
                reply_to,
            })
            .await?;

        tracing::info!(
            message_id = %record.id,
            sender_id = %sender,
            receiver_id = %receiver,
            message_type = %message_type,
            "message sent"
        );

        let event = RealtimeEvent::NewMessage(MessagePayload::from_record(&record));
        let pair_channel = channel_for_pair(sender, receiver);
        let inbox_channel = channel_for_user(receiver);
        tokio::join!(
            self.publish(&pair_channel, &event),
            self.publish(&inbox_channel, &event)
        );

        Ok(record.into_view(content))
    }

    /// One page of the conversation, oldest message first.
    ///
    /// Unread messages addressed to the requester on this page are marked
    /// read as a side effect.
    pub async fn get_conversation(
        &self,
        requester: &UserId,
        counterpart: &UserId,
        page: u32,
        limit: u32,
    ) -> AppResult<ConversationPage> {
        ensure_distinct(requester, counterpart)?;
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".into()));
        }
        if limit < 1 || limit > self.limits.max_page_size {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                self.limits.max_page_size
            )));
        }

        ensure_can_view_conversation(self.friends.as_ref(), requester, counterpart).await?;

        let (records, total) = tokio::try_join!(
            self.store.find_conversation(requester, counterpart, page, limit),
            self.store.count_conversation(requester, counterpart)
        )?;

        let unread: Vec<MessageId> = records
            .iter()
            .filter(|m| &m.receiver_id == requester && !m.is_read)
            .map(|m| m.id)
            .collect();
        let flipped = if unread.is_empty() {
            Vec::new()
        } else {
            self.store.mark_read(requester, &unread).await?
        };

        let key = self.key_for(requester, counterpart);
        let messages: Vec<Message> = records
            .into_iter()
            .rev()
            .map(|mut record| {
                if &record.receiver_id == requester {
                    record.is_read = true;
                }
                let content = self.decrypt_or_placeholder(&record, &key);
                record.into_view(content)
            })
            .collect();

        if !flipped.is_empty() {
            let event = RealtimeEvent::MessageDelivered(StatusPayload::read(
                requester.clone(),
                flipped,
                Utc::now(),
            ));
            self.publish(&channel_for_pair(requester, counterpart), &event)
                .await;
        }

        let total = u64::try_from(total).unwrap_or(0);
        let total_pages = total.div_ceil(u64::from(limit)) as u32;

        Ok(ConversationPage {
            messages,
            has_more: page < total_pages,
            page,
            total_pages,
        })
    }

    pub async fn edit_message(
        &self,
        message_id: MessageId,
        requester: &UserId,
        new_content: &str,
    ) -> AppResult<Message> {
        let content = self.validate_content(new_content)?;
        let record = self.load(message_id).await?;
        if &record.sender_id != requester {
            return Err(AppError::Permission(
                "only the sender can edit this message".into(),
            ));
        }

        let key = self.key_for(&record.sender_id, &record.receiver_id);
        let envelope = self.cipher.encrypt(&content, &key)?;

        let updated = self
            .store
            .update_content(message_id, &envelope, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("message {message_id}")))?;

        tracing::info!(message_id = %message_id, "message edited");

        let event = RealtimeEvent::MessageEdited(MessagePayload::from_record(&updated));
        self.publish(
            &channel_for_pair(&updated.sender_id, &updated.receiver_id),
            &event,
        )
        .await;

        Ok(updated.into_view(content))
    }

    pub async fn delete_message(&self, message_id: MessageId, requester: &UserId) -> AppResult<()> {
        let record = self.load(message_id).await?;
        if &record.sender_id != requester {
            return Err(AppError::Permission(
                "only the sender can delete this message".into(),
            ));
        }

        if !self.store.delete(message_id).await? {
            return Err(AppError::NotFound(format!("message {message_id}")));
        }

        tracing::info!(message_id = %message_id, "message deleted");

        let event = RealtimeEvent::MessageDeleted(DeletedPayload {
            message_id,
            sender_id: record.sender_id.clone(),
            receiver_id: record.receiver_id.clone(),
            timestamp: Utc::now(),
        });
        self.publish(
            &channel_for_pair(&record.sender_id, &record.receiver_id),
            &event,
        )
        .await;
        Ok(())
    }

    /// Mark everything `counterpart` sent to `reader` as read.
    pub async fn mark_as_read(&self, reader: &UserId, counterpart: &UserId) -> AppResult<()> {
        ensure_distinct(reader, counterpart)?;
        let flipped = self.store.mark_conversation_read(reader, counterpart).await?;
        if flipped.is_empty() {
            return Ok(());
        }

        tracing::debug!(reader_id = %reader, count = flipped.len(), "conversation marked read");

        let event = RealtimeEvent::MessageDelivered(StatusPayload::read(
            reader.clone(),
            flipped,
            Utc::now(),
        ));
        self.publish(&channel_for_pair(reader, counterpart), &event)
            .await;
        Ok(())
    }

    /// Receiver-side delivery receipt. Nothing is persisted.
    pub async fn acknowledge_delivery(
        &self,
        message_id: MessageId,
        receiver: &UserId,
    ) -> AppResult<()> {
        let record = self.load(message_id).await?;
        if &record.receiver_id != receiver {
            return Err(AppError::Permission(
                "only the receiver can acknowledge delivery".into(),
            ));
        }

        let event =
            RealtimeEvent::MessageDelivered(StatusPayload::delivered(message_id, Utc::now()));
        self.publish(
            &channel_for_pair(&record.sender_id, &record.receiver_id),
            &event,
        )
        .await;
        Ok(())
    }

    pub async fn send_typing_status(
        &self,
        user: &UserId,
        counterpart: &UserId,
        is_typing: bool,
    ) -> AppResult<()> {
        ensure_distinct(user, counterpart)?;
        ensure_can_exchange(self.friends.as_ref(), user, counterpart).await?;

        let event = RealtimeEvent::typing(TypingPayload {
            user_id: user.clone(),
            counterpart_id: counterpart.clone(),
            is_typing,
        });
        self.publish(&channel_for_pair(user, counterpart), &event)
            .await;
        Ok(())
    }

    /// Unread messages addressed to `user`, optionally only from `from`.
    /// Identical concurrent calls share one store query.
    pub async fn unread_count(&self, user: &UserId, from: Option<&UserId>) -> AppResult<i64> {
        let store = Arc::clone(&self.store);
        let user = user.clone();
        let from = from.cloned();
        let key = (user.clone(), from.clone());

        self.unread_requests
            .run(key, move || async move {
                store.unread_count(&user, from.as_ref()).await
            })
            .await
    }

    pub async fn recent_conversations(
        &self,
        user: &UserId,
        limit: u32,
    ) -> AppResult<Vec<ConversationSummary>> {
        if limit < 1 || limit > self.limits.max_page_size {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                self.limits.max_page_size
            )));
        }

        let records = self.store.recent_conversations(user, limit).await?;
        let summaries = join_all(records.into_iter().map(|record| self.summarize(user, record)));
        Ok(summaries.await)
    }

    /// A single message for one of its participants. Unlike the list
    /// operations, a body that fails authentication is an error here.
    pub async fn get_message(&self, message_id: MessageId, requester: &UserId) -> AppResult<Message> {
        let record = self.load(message_id).await?;
        if !record.involves(requester) {
            return Err(AppError::Permission(
                "not a participant of this conversation".into(),
            ));
        }

        let key = self.key_for(&record.sender_id, &record.receiver_id);
        let plaintext = self.cipher.decrypt(&record.content, &key)?;
        Ok(record.into_view(plaintext))
    }

    async fn summarize(&self, user: &UserId, record: ConversationSummaryRecord) -> ConversationSummary {
        let ConversationSummaryRecord {
            counterpart_id,
            last_message,
            unread_count,
        } = record;

        let counterpart = match self.directory.get_summary(&counterpart_id).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(user_id = %counterpart_id, error = %e, "user directory lookup failed");
                None
            }
        };

        let key = self.key_for(user, &counterpart_id);
        let content = self.decrypt_or_placeholder(&last_message, &key);

        ConversationSummary {
            counterpart_id,
            counterpart,
            last_message: last_message.into_view(content),
            unread_count,
        }
    }

    async fn load(&self, message_id: MessageId) -> AppResult<MessageRecord> {
        self.store
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("message {message_id}")))
    }

    fn validate_content(&self, content: &str) -> AppResult<String> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("message content is empty".into()));
        }
        if trimmed.chars().count() > self.limits.max_message_chars {
            return Err(AppError::Validation(format!(
                "message exceeds {} characters",
                self.limits.max_message_chars
            )));
        }
        Ok(trimmed.to_string())
    }

    fn key_for(&self, a: &UserId, b: &UserId) -> ConversationKey {
        self.deriver.derive(a.as_str(), b.as_str())
    }

    fn decrypt_or_placeholder(&self, record: &MessageRecord, key: &ConversationKey) -> String {
        match self.cipher.decrypt(&record.content, key) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!(message_id = %record.id, error = %e, "message could not be decrypted");
                UNDECRYPTABLE_PLACEHOLDER.to_string()
            }
        }
    }

    async fn publish(&self, channel: &str, event: &RealtimeEvent) {
        publish_best_effort(self.bus.as_ref(), channel, event, self.limits.publish_timeout).await;
    }
}

fn ensure_distinct(a: &UserId, b: &UserId) -> AppResult<()> {
    if a == b {
        return Err(AppError::Validation(
            "sender and receiver must be different users".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ChatService {
        use crate::realtime::LocalBus;
        use crate::repository::InMemoryMessageStore;
        use crate::services::relationship_service::{FriendGraph, UserDirectory};
        use crate::models::UserSummary;

        struct Open;

        #[async_trait::async_trait]
        impl FriendGraph for Open {
            async fn is_friend(&self, _: &UserId, _: &UserId) -> AppResult<bool> {
                Ok(true)
            }
            async fn allows_messages_from_non_friends(&self, _: &UserId) -> AppResult<bool> {
                Ok(false)
            }
        }

        #[async_trait::async_trait]
        impl UserDirectory for Open {
            async fn get_summary(&self, _: &UserId) -> AppResult<Option<UserSummary>> {
                Ok(Some(UserSummary {
                    name: "someone".into(),
                    avatar: None,
                }))
            }
        }

        ChatService::new(
            Arc::new(InMemoryMessageStore::new()),
            Arc::new(Open),
            Arc::new(Open),
            Arc::new(LocalBus::default()),
        )
    }

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn test_content_validation() {
        let svc = service();
        assert_eq!(svc.validate_content("  hi  ").unwrap(), "hi");
        assert!(matches!(svc.validate_content(" \n\t "), Err(AppError::Validation(_))));
        assert!(svc.validate_content(&"é".repeat(2000)).is_ok());
        assert!(svc.validate_content(&"é".repeat(2001)).is_err());
    }

    #[tokio::test]
    async fn test_self_messaging_rejected() {
        let svc = service();
        let result = svc
            .send_message(&uid("a"), &uid("a"), "hi", MessageType::Text, None)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_page_bounds_validated() {
        let svc = service();
        for (page, limit) in [(0, 10), (1, 0), (1, 101)] {
            let result = svc.get_conversation(&uid("a"), &uid("b"), page, limit).await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{page}/{limit}");
        }
    }

    #[tokio::test]
    async fn test_empty_conversation_has_no_pages() {
        let svc = service();
        let page = svc.get_conversation(&uid("a"), &uid("b"), 1, 50).await.unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_more);
    }
}
