use serde::Serialize;
use uuid::Uuid;

/// A row in the `users` table.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string; never serialised.
    #[serde(skip_serializing)]
    pub password_hash: String,
}
