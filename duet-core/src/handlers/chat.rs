use chrono::{SubsecRound, Utc};
use uuid::Uuid;

use crate::DuetError;
use crate::entities::{ChatRecord, ChatStore, Page};
use crate::handlers::check_len;

pub const MAX_TITLE: usize = 100;

/// Chat CRUD scoped to the owning user.
///
/// A chat that exists but belongs to someone else is reported as not found.
pub struct ChatHandler<S> {
    store: S,
}

impl<S: ChatStore> ChatHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create(&self, user_id: Uuid, title: Option<String>) -> Result<ChatRecord, DuetError> {
        let title = normalize_title(title)?;
        let chat = ChatRecord {
            id: Uuid::new_v4(),
            title,
            user_id,
            created_at: Utc::now().trunc_subsecs(6),
        };
        self.store.create_chat(chat.clone()).await?;
        tracing::info!(chat_id = %chat.id, user_id = %user_id, "chat created");
        Ok(chat)
    }

    /// Every chat of `user_id`, newest first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<ChatRecord>, DuetError> {
        Ok(self.store.list_chats_by_user(user_id, Page::all()).await?)
    }

    pub async fn get(&self, user_id: Uuid, chat_id: Uuid) -> Result<ChatRecord, DuetError> {
        let chat = self.store.get_chat(chat_id).await?;
        if chat.user_id != user_id {
            return Err(DuetError::NotFound(format!("Chat with id {chat_id} not found")));
        }
        Ok(chat)
    }

    pub async fn rename(
        &self,
        user_id: Uuid,
        chat_id: Uuid,
        title: Option<String>,
    ) -> Result<ChatRecord, DuetError> {
        let mut chat = self.get(user_id, chat_id).await?;
        chat.title = normalize_title(title)?;
        self.store.update_chat(&chat).await?;
        Ok(chat)
    }

    /// Delete a chat together with its messages.
    pub async fn delete(&self, user_id: Uuid, chat_id: Uuid) -> Result<(), DuetError> {
        self.get(user_id, chat_id).await?;
        self.store.delete_chat(chat_id).await?;
        tracing::info!(chat_id = %chat_id, "chat deleted");
        Ok(())
    }
}

/// Blank titles are stored as no title.
fn normalize_title(title: Option<String>) -> Result<Option<String>, DuetError> {
    let title = title
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty());
    if let Some(t) = &title {
        check_len("title", t, MAX_TITLE)?;
    }
    Ok(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SqliteStore, UserRecord, UserStore};

    async fn setup() -> (ChatHandler<SqliteStore>, SqliteStore, Uuid) {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: "x".into(),
        };
        store.create_user(user.clone()).await.unwrap();
        (ChatHandler::new(store.clone()), store, user.id)
    }

    #[tokio::test]
    async fn create_and_list() {
        let (h, _, uid) = setup().await;
        let a = h.create(uid, Some("phones".into())).await.unwrap();
        let b = h.create(uid, Some("   ".into())).await.unwrap();
        assert_eq!(b.title, None);

        let ids: Vec<_> = h.list(uid).await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, [b.id, a.id]);
    }

    #[tokio::test]
    async fn chat_for_unknown_user_is_not_found() {
        let (h, _, _) = setup().await;
        let err = h.create(Uuid::new_v4(), None).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn overlong_title_is_rejected() {
        let (h, _, uid) = setup().await;
        let err = h.create(uid, Some("t".repeat(MAX_TITLE + 1))).await.unwrap_err();
        assert_eq!(err.kind(), "bad_request");
    }

    #[tokio::test]
    async fn rename_and_delete_respect_ownership() {
        let (h, store, uid) = setup().await;
        let chat = h.create(uid, None).await.unwrap();
        let stranger = Uuid::new_v4();

        assert_eq!(
            h.rename(stranger, chat.id, Some("mine".into())).await.unwrap_err().kind(),
            "not_found"
        );
        assert_eq!(h.delete(stranger, chat.id).await.unwrap_err().kind(), "not_found");

        let renamed = h.rename(uid, chat.id, Some("X1 battery".into())).await.unwrap();
        assert_eq!(store.get_chat(chat.id).await.unwrap().title, renamed.title);

        h.delete(uid, chat.id).await.unwrap();
        assert_eq!(h.get(uid, chat.id).await.unwrap_err().kind(), "not_found");
    }
}
