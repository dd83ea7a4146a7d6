use serde::{Deserialize, Serialize};

/// Profile fields used to decorate conversation previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub name: String,
    pub avatar: Option<String>,
}
