use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Which half of a conversational turn a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// The user's input.
    Client,
    /// The generated reply.
    System,
}

/// A row in the `messages` table.
///
/// When `image` is `true` the `content` is the public URL of a generated
/// image rather than plain text.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub image: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(
        chat_id: Uuid,
        content: impl Into<String>,
        kind: MessageKind,
        image: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            content: content.into(),
            kind,
            image,
            created_at,
        }
    }
}
