use crate::{
    config::Config,
    error::AppResult,
    realtime::{ChannelRegistry, RealtimeBus},
    repository::{PgMessageStore, PgPresenceStore},
    services::{
        chat_service::ChatService,
        presence_service::PresenceTracker,
        relationship_service::{PgFriendGraph, PgUserDirectory},
    },
};
use crypto_core::ConversationKeyDeriver;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub config: Arc<Config>,
    pub registry: ChannelRegistry,
    pub chat: Arc<ChatService>,
    pub presence: PresenceTracker,
}

impl AppState {
    /// Wire the Postgres-backed services around an already chosen bus.
    pub fn build(
        config: Arc<Config>,
        db: Pool<Postgres>,
        bus: Arc<dyn RealtimeBus>,
        registry: ChannelRegistry,
    ) -> AppResult<Self> {
        let deriver = match &config.conversation_key_secret {
            Some(secret) => ConversationKeyDeriver::with_secret(secret.as_bytes())?,
            None => ConversationKeyDeriver::unkeyed(),
        };
        if !deriver.is_keyed() {
            tracing::warn!("CONVERSATION_KEY_SECRET not set; conversation keys derive from user ids alone");
        }

        let chat = ChatService::new(
            Arc::new(PgMessageStore::new(db.clone())),
            Arc::new(PgFriendGraph::new(db.clone())),
            Arc::new(PgUserDirectory::new(db.clone())),
            bus.clone(),
        )
        .with_key_deriver(deriver)
        .with_limits(config.chat_limits());

        let presence = PresenceTracker::new(Arc::new(PgPresenceStore::new(db.clone())), bus)
            .with_ttl(config.presence_ttl())
            .with_publish_timeout(config.publish_timeout());

        Ok(Self {
            db,
            config,
            registry,
            chat: Arc::new(chat),
            presence,
        })
    }
}
