//! Gating decisions against mocked relationship collaborators.

mod common;

use common::{uid, RecordingBus};
use messaging_service::error::{AppError, AppResult};
use messaging_service::models::{MessageType, UserId, UserSummary};
use messaging_service::repository::InMemoryMessageStore;
use messaging_service::services::relationship_service::{can_exchange, ensure_can_exchange};
use messaging_service::services::{ChatService, FriendGraph, UserDirectory};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Graph {}

    #[async_trait::async_trait]
    impl FriendGraph for Graph {
        async fn is_friend(&self, a: &UserId, b: &UserId) -> AppResult<bool>;
        async fn allows_messages_from_non_friends(&self, user: &UserId) -> AppResult<bool>;
    }
}

mock! {
    pub Directory {}

    #[async_trait::async_trait]
    impl UserDirectory for Directory {
        async fn get_summary(&self, user: &UserId) -> AppResult<Option<UserSummary>>;
    }
}

fn known_directory() -> MockDirectory {
    let mut directory = MockDirectory::new();
    directory.expect_get_summary().returning(|user| {
        Ok(Some(UserSummary {
            name: user.to_string(),
            avatar: None,
        }))
    });
    directory
}

#[tokio::test]
async fn test_friends_skip_settings_lookup() {
    let mut graph = MockGraph::new();
    graph.expect_is_friend().times(1).returning(|_, _| Ok(true));
    graph.expect_allows_messages_from_non_friends().times(0);

    assert!(can_exchange(&graph, &uid("alice"), &uid("bob")).await.unwrap());
}

#[tokio::test]
async fn test_receiver_setting_is_consulted() {
    let mut graph = MockGraph::new();
    graph.expect_is_friend().returning(|_, _| Ok(false));
    graph
        .expect_allows_messages_from_non_friends()
        .withf(|user| user.as_str() == "bob")
        .times(1)
        .returning(|_| Ok(true));

    ensure_can_exchange(&graph, &uid("alice"), &uid("bob"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_denied_exchange_maps_to_permission() {
    let mut graph = MockGraph::new();
    graph.expect_is_friend().returning(|_, _| Ok(false));
    graph
        .expect_allows_messages_from_non_friends()
        .returning(|_| Ok(false));

    let result = ensure_can_exchange(&graph, &uid("alice"), &uid("bob")).await;
    assert_eq!(result, Err(AppError::not_friends()));
}

#[tokio::test]
async fn test_graph_failure_propagates_and_nothing_is_stored() {
    let mut graph = MockGraph::new();
    graph
        .expect_is_friend()
        .returning(|_, _| Err(AppError::Unavailable("graph down".into())));

    let store = Arc::new(InMemoryMessageStore::new());
    let bus = RecordingBus::new();
    let service = ChatService::new(
        store.clone(),
        Arc::new(graph),
        Arc::new(known_directory()),
        Arc::new(bus.clone()),
    );

    let result = service
        .send_message(&uid("alice"), &uid("bob"), "hi", MessageType::Text, None)
        .await;

    let err = result.unwrap_err();
    assert!(err.is_retryable());
    assert!(store.is_empty().await);
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn test_fetch_gates_with_counterpart_as_receiver() {
    let mut graph = MockGraph::new();
    graph.expect_is_friend().returning(|_, _| Ok(false));
    graph
        .expect_allows_messages_from_non_friends()
        .withf(|user| user.as_str() == "bob")
        .times(1)
        .returning(|_| Ok(true));

    let service = ChatService::new(
        Arc::new(InMemoryMessageStore::new()),
        Arc::new(graph),
        Arc::new(known_directory()),
        Arc::new(RecordingBus::new()),
    );

    let page = service
        .get_conversation(&uid("alice"), &uid("bob"), 1, 20)
        .await
        .unwrap();
    assert!(page.messages.is_empty());
}

#[tokio::test]
async fn test_fetch_allowed_by_requester_open_inbox() {
    let mut graph = MockGraph::new();
    graph.expect_is_friend().returning(|_, _| Ok(false));
    graph
        .expect_allows_messages_from_non_friends()
        .withf(|user| user.as_str() == "alice")
        .times(1)
        .returning(|_| Ok(false));
    graph
        .expect_allows_messages_from_non_friends()
        .withf(|user| user.as_str() == "carol")
        .times(1)
        .returning(|_| Ok(true));

    let service = ChatService::new(
        Arc::new(InMemoryMessageStore::new()),
        Arc::new(graph),
        Arc::new(known_directory()),
        Arc::new(RecordingBus::new()),
    );

    // Carol reads her thread with alice: alice's inbox is closed, carol's is open
    let page = service
        .get_conversation(&uid("carol"), &uid("alice"), 1, 20)
        .await
        .unwrap();
    assert!(page.messages.is_empty());
}
