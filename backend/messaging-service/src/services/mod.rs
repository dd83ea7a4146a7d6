pub mod chat_service;
pub mod inflight;
pub mod presence_service;
pub mod relationship_service;

pub use chat_service::{ChatLimits, ChatService, UNDECRYPTABLE_PLACEHOLDER};
pub use inflight::InflightRequests;
pub use presence_service::{spawn_presence_sweeper, PresenceTracker};
pub use relationship_service::{FriendGraph, UserDirectory};
