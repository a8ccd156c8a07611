use std::future::Future;

use uuid::Uuid;

use crate::entities::{SqliteStore, StoreError, UserRecord, decode_uuid};

pub trait UserStore: Send + Sync + 'static {
    fn create_user(&self, user: UserRecord)
    -> impl Future<Output = Result<(), StoreError>> + Send;
    fn get_user(&self, id: Uuid) -> impl Future<Output = Result<UserRecord, StoreError>> + Send;
    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;
    fn delete_user(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;
}

type UserRow = (String, String, String, String);

fn user_from_row((id, username, email, password_hash): UserRow) -> Result<UserRecord, StoreError> {
    Ok(UserRecord {
        id: decode_uuid(&id, "users.id")?,
        username,
        email,
        password_hash,
    })
}

impl UserStore for SqliteStore {
    async fn create_user(&self, user: UserRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(self.pool())
        .await
        .map_err(|e| StoreError::from_write(e, "user"))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<UserRecord, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, password_hash FROM users WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;
        row.map(user_from_row)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "User",
                id: id.to_string(),
            })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, password_hash FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "User",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
