use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A row in the `chats` table.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRecord {
    pub id: Uuid,
    pub title: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
