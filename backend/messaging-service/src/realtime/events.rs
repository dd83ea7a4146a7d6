//! Realtime event catalogue.
//!
//! Every event travels as one JSON object:
//!
//! ```json
//! { "event": "new-message", "data": { "messageId": "...", ... } }
//! ```
//!
//! The channel is not part of the payload; subscribers already know which
//! channel they are listening on.

use crate::models::{MessageId, MessageRecord, MessageType, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Read,
}

/// Message as pushed to clients. `content` is the ciphertext envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    pub is_edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl MessagePayload {
    pub fn from_record(record: &MessageRecord) -> Self {
        Self {
            message_id: record.id,
            sender_id: record.sender_id.clone(),
            receiver_id: record.receiver_id.clone(),
            content: record.content.clone(),
            message_type: record.message_type,
            timestamp: record.edited_at.unwrap_or(record.created_at),
            is_encrypted: true,
            reply_to: record.reply_to,
            is_edited: record.is_edited,
            edited_at: record.edited_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: UserId,
    pub counterpart_id: UserId,
    pub is_typing: bool,
}

/// Delivery or read receipt for one or more messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub message_id: Option<MessageId>,
    pub message_ids: Vec<MessageId>,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reader_id: Option<UserId>,
    pub timestamp: DateTime<Utc>,
}

impl StatusPayload {
    pub fn read(reader: UserId, ids: Vec<MessageId>, at: DateTime<Utc>) -> Self {
        Self {
            message_id: ids.first().copied(),
            message_ids: ids,
            status: DeliveryStatus::Read,
            reader_id: Some(reader),
            timestamp: at,
        }
    }

    pub fn delivered(id: MessageId, at: DateTime<Utc>) -> Self {
        Self {
            message_id: Some(id),
            message_ids: vec![id],
            status: DeliveryStatus::Delivered,
            reader_id: None,
            timestamp: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPayload {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: UserId,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RealtimeEvent {
    NewMessage(MessagePayload),
    TypingStart(TypingPayload),
    TypingStop(TypingPayload),
    MessageDelivered(StatusPayload),
    MessageEdited(MessagePayload),
    MessageDeleted(DeletedPayload),
    UserOnline(PresencePayload),
    UserOffline(PresencePayload),
}

impl RealtimeEvent {
    /// Wire name, identical to the serialized `event` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            RealtimeEvent::NewMessage(_) => "new-message",
            RealtimeEvent::TypingStart(_) => "typing-start",
            RealtimeEvent::TypingStop(_) => "typing-stop",
            RealtimeEvent::MessageDelivered(_) => "message-delivered",
            RealtimeEvent::MessageEdited(_) => "message-edited",
            RealtimeEvent::MessageDeleted(_) => "message-deleted",
            RealtimeEvent::UserOnline(_) => "user-online",
            RealtimeEvent::UserOffline(_) => "user-offline",
        }
    }

    pub fn typing(payload: TypingPayload) -> Self {
        if payload.is_typing {
            RealtimeEvent::TypingStart(payload)
        } else {
            RealtimeEvent::TypingStop(payload)
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
