pub mod ids;
pub mod message;
pub mod presence;
pub mod user;

pub use ids::{MessageId, ParticipantRef, UserId};
pub use message::{
    ConversationPage, ConversationSummary, ConversationSummaryRecord, Message, MessageRecord,
    MessageType, NewMessage,
};
pub use presence::PresenceRecord;
pub use user::UserSummary;
