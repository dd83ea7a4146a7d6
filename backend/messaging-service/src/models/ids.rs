use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_USER_ID_LEN: usize = 128;

/// Canonical user identifier.
///
/// Trimmed, non-empty, at most [`MAX_USER_ID_LEN`] characters, with no
/// whitespace and no `:` (the separator used by key derivation and channel
/// names). Deserializes from anything [`ParticipantRef`] accepts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "ParticipantRef", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("user id is empty".into()));
        }
        if trimmed.chars().count() > MAX_USER_ID_LEN {
            return Err(AppError::Validation(format!(
                "user id exceeds {MAX_USER_ID_LEN} characters"
            )));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c == ':') {
            return Err(AppError::Validation(
                "user id contains whitespace or ':'".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for UserId {
    type Error = AppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for UserId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<ParticipantRef> for UserId {
    type Error = AppError;

    fn try_from(value: ParticipantRef) -> Result<Self, Self::Error> {
        value.into_user_id()
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// A participant as clients send it: a bare id, a numeric id, or a user
/// object carrying one under `id`, `_id`, `userId` or `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ParticipantRef {
    Text(String),
    Number(u64),
    Object {
        #[serde(alias = "_id", alias = "userId", alias = "user_id")]
        id: Box<ParticipantRef>,
    },
}

impl ParticipantRef {
    pub fn into_user_id(self) -> Result<UserId, AppError> {
        match self {
            ParticipantRef::Text(s) => UserId::parse(&s),
            ParticipantRef::Number(n) => UserId::parse(&n.to_string()),
            ParticipantRef::Object { id } => id.into_user_id(),
        }
    }
}

/// Opaque message identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| AppError::Validation(format!("invalid message id: {s}")))
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_id_is_trimmed() {
        let id = UserId::parse("  alice  ").unwrap();
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn test_user_id_rejects_bad_input() {
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("   ").is_err());
        assert!(UserId::parse("a:b").is_err());
        assert!(UserId::parse("a b").is_err());
        assert!(UserId::parse(&"x".repeat(MAX_USER_ID_LEN + 1)).is_err());
        assert!(UserId::parse(&"x".repeat(MAX_USER_ID_LEN)).is_ok());
    }

    #[test]
    fn test_participant_forms_normalize() {
        let forms = [
            json!("u-42"),
            json!({ "id": "u-42" }),
            json!({ "_id": "u-42", "name": "Bob" }),
            json!({ "userId": " u-42 " }),
            json!({ "user_id": "u-42" }),
        ];
        for form in forms {
            let id: UserId = serde_json::from_value(form.clone()).unwrap();
            assert_eq!(id.as_str(), "u-42", "form {form}");
        }

        let numeric: UserId = serde_json::from_value(json!({ "id": 42 })).unwrap();
        assert_eq!(numeric.as_str(), "42");
    }

    #[test]
    fn test_participant_without_id_rejected() {
        assert!(serde_json::from_value::<UserId>(json!({ "name": "Bob" })).is_err());
        assert!(serde_json::from_value::<UserId>(json!({ "id": "" })).is_err());
        assert!(serde_json::from_value::<UserId>(json!(null)).is_err());
    }

    #[test]
    fn test_user_id_serializes_as_string() {
        let id = UserId::parse("alice").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("alice"));
    }

    #[test]
    fn test_message_id_parse() {
        let id = MessageId::new();
        assert_eq!(id.to_string().parse::<MessageId>().unwrap(), id);
        assert!(matches!(
            "not-a-uuid".parse::<MessageId>(),
            Err(AppError::Validation(_))
        ));
    }
}
