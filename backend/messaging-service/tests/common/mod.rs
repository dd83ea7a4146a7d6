//! Hand-written collaborators for the integration suites.
//!
//! Each fake keeps its state behind `Arc<Mutex<..>>` so a test can hold a
//! clone and inspect or reconfigure it while the service owns another.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use messaging_service::error::{AppError, AppResult};
use messaging_service::models::{
    ConversationSummaryRecord, MessageId, MessageRecord, NewMessage, UserId, UserSummary,
};
use messaging_service::realtime::{RealtimeBus, RealtimeEvent};
use messaging_service::repository::{InMemoryMessageStore, MessageStore};
use messaging_service::services::{ChatService, FriendGraph, UserDirectory};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn uid(s: &str) -> UserId {
    UserId::parse(s).unwrap()
}

#[derive(Clone, Default)]
pub struct FakeFriendGraph {
    friendships: Arc<Mutex<HashSet<(UserId, UserId)>>>,
    open_inboxes: Arc<Mutex<HashSet<UserId>>>,
}

impl FakeFriendGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn befriend(&self, a: &UserId, b: &UserId) {
        let mut set = self.friendships.lock().unwrap();
        set.insert((a.clone(), b.clone()));
        set.insert((b.clone(), a.clone()));
    }

    pub fn allow_non_friends(&self, user: &UserId) {
        self.open_inboxes.lock().unwrap().insert(user.clone());
    }
}

#[async_trait::async_trait]
impl FriendGraph for FakeFriendGraph {
    async fn is_friend(&self, a: &UserId, b: &UserId) -> AppResult<bool> {
        Ok(self
            .friendships
            .lock()
            .unwrap()
            .contains(&(a.clone(), b.clone())))
    }

    async fn allows_messages_from_non_friends(&self, user: &UserId) -> AppResult<bool> {
        Ok(self.open_inboxes.lock().unwrap().contains(user))
    }
}

#[derive(Clone, Default)]
pub struct FakeDirectory {
    users: Arc<Mutex<HashMap<UserId, UserSummary>>>,
    broken: Arc<Mutex<HashSet<UserId>>>,
}

impl FakeDirectory {
    pub fn with_users(names: &[&str]) -> Self {
        let dir = Self::default();
        for name in names {
            dir.add(name);
        }
        dir
    }

    pub fn add(&self, name: &str) {
        self.users.lock().unwrap().insert(
            uid(name),
            UserSummary {
                name: name.to_uppercase(),
                avatar: None,
            },
        );
    }

    /// Lookups for `user` fail with a database error from now on
    pub fn break_lookup(&self, user: &UserId) {
        self.broken.lock().unwrap().insert(user.clone());
    }
}

#[async_trait::async_trait]
impl UserDirectory for FakeDirectory {
    async fn get_summary(&self, user: &UserId) -> AppResult<Option<UserSummary>> {
        if self.broken.lock().unwrap().contains(user) {
            return Err(AppError::Database("directory unavailable".into()));
        }
        Ok(self.users.lock().unwrap().get(user).cloned())
    }
}

/// Records every publish in order.
#[derive(Clone, Default)]
pub struct RecordingBus {
    published: Arc<Mutex<Vec<(String, RealtimeEvent)>>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, RealtimeEvent)> {
        self.published.lock().unwrap().clone()
    }

    pub fn on_channel(&self, channel: &str) -> Vec<RealtimeEvent> {
        self.published()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, e)| e)
            .collect()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.published()
            .iter()
            .map(|(_, e)| e.event_name())
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl RealtimeBus for RecordingBus {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> AppResult<()> {
        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), event.clone()));
        Ok(())
    }
}

/// Every publish fails, or never completes when `hang` is set.
#[derive(Clone, Default)]
pub struct FailingBus {
    pub hang: bool,
    attempts: Arc<AtomicUsize>,
}

impl FailingBus {
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RealtimeBus for FailingBus {
    async fn publish(&self, _channel: &str, _event: &RealtimeEvent) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Err(AppError::Transport("connection refused".into()))
    }
}

/// In-memory store that counts and slows down `unread_count`.
#[derive(Clone)]
pub struct CountingStore {
    inner: Arc<InMemoryMessageStore>,
    unread_calls: Arc<AtomicUsize>,
    unread_delay: Duration,
}

impl CountingStore {
    pub fn new(inner: Arc<InMemoryMessageStore>, unread_delay: Duration) -> Self {
        Self {
            inner,
            unread_calls: Arc::new(AtomicUsize::new(0)),
            unread_delay,
        }
    }

    pub fn unread_calls(&self) -> usize {
        self.unread_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MessageStore for CountingStore {
    async fn append(&self, message: NewMessage) -> AppResult<MessageRecord> {
        self.inner.append(message).await
    }

    async fn find_by_id(&self, id: MessageId) -> AppResult<Option<MessageRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn find_conversation(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<MessageRecord>> {
        self.inner.find_conversation(user_a, user_b, page, limit).await
    }

    async fn count_conversation(&self, user_a: &UserId, user_b: &UserId) -> AppResult<i64> {
        self.inner.count_conversation(user_a, user_b).await
    }

    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> AppResult<Option<MessageRecord>> {
        self.inner.update_content(id, content, edited_at).await
    }

    async fn delete(&self, id: MessageId) -> AppResult<bool> {
        self.inner.delete(id).await
    }

    async fn mark_conversation_read(
        &self,
        reader: &UserId,
        counterpart: &UserId,
    ) -> AppResult<Vec<MessageId>> {
        self.inner.mark_conversation_read(reader, counterpart).await
    }

    async fn mark_read(&self, reader: &UserId, ids: &[MessageId]) -> AppResult<Vec<MessageId>> {
        self.inner.mark_read(reader, ids).await
    }

    async fn unread_count(&self, user: &UserId, from: Option<&UserId>) -> AppResult<i64> {
        self.unread_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.unread_delay).await;
        self.inner.unread_count(user, from).await
    }

    async fn recent_conversations(
        &self,
        user: &UserId,
        limit: u32,
    ) -> AppResult<Vec<ConversationSummaryRecord>> {
        self.inner.recent_conversations(user, limit).await
    }
}

/// ChatService over an in-memory store with inspectable fakes.
pub struct Harness {
    pub service: ChatService,
    pub store: Arc<InMemoryMessageStore>,
    pub friends: FakeFriendGraph,
    pub directory: FakeDirectory,
    pub bus: RecordingBus,
}

impl Harness {
    /// alice, bob and carol exist; alice and bob are friends.
    pub fn new() -> Self {
        let store = Arc::new(InMemoryMessageStore::new());
        let friends = FakeFriendGraph::new();
        let directory = FakeDirectory::with_users(&["alice", "bob", "carol"]);
        let bus = RecordingBus::new();

        friends.befriend(&uid("alice"), &uid("bob"));

        let service = ChatService::new(
            store.clone(),
            Arc::new(friends.clone()),
            Arc::new(directory.clone()),
            Arc::new(bus.clone()),
        );

        Self {
            service,
            store,
            friends,
            directory,
            bus,
        }
    }
}
