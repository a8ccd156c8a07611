use std::future::Future;

use uuid::Uuid;

use crate::entities::{
    ChatRecord, Page, SqliteStore, StoreError, decode_ts, decode_uuid, encode_ts,
};

pub trait ChatStore: Send + Sync + 'static {
    fn create_chat(&self, chat: ChatRecord)
    -> impl Future<Output = Result<(), StoreError>> + Send;
    fn get_chat(&self, id: Uuid) -> impl Future<Output = Result<ChatRecord, StoreError>> + Send;
    /// Persist the mutable fields (currently only `title`) of an existing chat.
    fn update_chat(&self, chat: &ChatRecord)
    -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Delete a chat; its messages go with it (`ON DELETE CASCADE`).
    fn delete_chat(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn list_chats_by_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> impl Future<Output = Result<Vec<ChatRecord>, StoreError>> + Send;
}

type ChatRow = (String, Option<String>, String, String);

fn chat_from_row((id, title, user_id, created_at): ChatRow) -> Result<ChatRecord, StoreError> {
    Ok(ChatRecord {
        id: decode_uuid(&id, "chats.id")?,
        title,
        user_id: decode_uuid(&user_id, "chats.user_id")?,
        created_at: decode_ts(&created_at, "chats.created_at"),
    })
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity: "Chat",
        id: id.to_string(),
    }
}

impl ChatStore for SqliteStore {
    async fn create_chat(&self, chat: ChatRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO chats (id, title, user_id, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(chat.id.to_string())
            .bind(&chat.title)
            .bind(chat.user_id.to_string())
            .bind(encode_ts(&chat.created_at))
            .execute(self.pool())
            .await
            .map_err(|e| StoreError::from_write(e, "user"))?;
        Ok(())
    }

    async fn get_chat(&self, id: Uuid) -> Result<ChatRecord, StoreError> {
        let row: Option<ChatRow> =
            sqlx::query_as("SELECT id, title, user_id, created_at FROM chats WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(self.pool())
                .await?;
        row.map(chat_from_row).transpose()?.ok_or_else(|| not_found(id))
    }

    async fn update_chat(&self, chat: &ChatRecord) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE chats SET title = ?1 WHERE id = ?2")
            .bind(&chat.title)
            .bind(chat.id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| StoreError::from_write(e, "user"))?;
        if result.rows_affected() == 0 {
            return Err(not_found(chat.id));
        }
        Ok(())
    }

    async fn delete_chat(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn list_chats_by_user(&self, user_id: Uuid, page: Page) -> Result<Vec<ChatRecord>, StoreError> {
        let sql = format!(
            "SELECT id, title, user_id, created_at FROM chats WHERE user_id = ?1 \
             ORDER BY created_at {dir}, rowid {dir} LIMIT ?2 OFFSET ?3",
            dir = page.order.sql(),
        );
        let rows: Vec<ChatRow> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(chat_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::entities::{SortOrder, UserRecord, UserStore};

    async fn store_with_user() -> (SqliteStore, Uuid) {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "x".into(),
        };
        let id = user.id;
        store.create_user(user).await.unwrap();
        (store, id)
    }

    fn chat(user_id: Uuid, title: &str, age_secs: i64) -> ChatRecord {
        ChatRecord {
            id: Uuid::new_v4(),
            title: Some(title.into()),
            user_id,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn chats_list_newest_first() {
        let (store, user_id) = store_with_user().await;
        store.create_chat(chat(user_id, "old", 60)).await.unwrap();
        store.create_chat(chat(user_id, "new", 1)).await.unwrap();

        let listed = store.list_chats_by_user(user_id, Page::all()).await.unwrap();
        let titles: Vec<_> = listed.iter().filter_map(|c| c.title.as_deref()).collect();
        assert_eq!(titles, ["new", "old"]);

        let asc = store
            .list_chats_by_user(user_id, Page::new(1, 0, SortOrder::Asc))
            .await
            .unwrap();
        assert_eq!(asc.len(), 1);
        assert_eq!(asc[0].title.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn chat_for_unknown_user_is_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store
            .create_chat(chat(Uuid::new_v4(), "orphan", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingParent { parent: "user" }), "{err:?}");
    }

    #[tokio::test]
    async fn update_and_delete_chat() {
        let (store, user_id) = store_with_user().await;
        let mut c = chat(user_id, "draft", 0);
        store.create_chat(c.clone()).await.unwrap();

        c.title = Some("final".into());
        store.update_chat(&c).await.unwrap();
        assert_eq!(store.get_chat(c.id).await.unwrap().title.as_deref(), Some("final"));

        store.delete_chat(c.id).await.unwrap();
        assert!(matches!(
            store.get_chat(c.id).await.unwrap_err(),
            StoreError::NotFound { entity: "Chat", .. }
        ));
        assert!(matches!(
            store.delete_chat(c.id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }
}
