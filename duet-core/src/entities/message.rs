use std::future::Future;
use std::str::FromStr;

use uuid::Uuid;

use crate::entities::{
    MessageKind, MessageRecord, Page, SqliteStore, StoreError, decode_ts, decode_uuid, encode_ts,
};

/// Messages are append-only: there is no update, and they are only ever
/// removed through their chat's cascade.
pub trait MessageStore: Send + Sync + 'static {
    fn create_message(
        &self,
        msg: &MessageRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn get_message(&self, id: Uuid)
    -> impl Future<Output = Result<MessageRecord, StoreError>> + Send;
    fn list_messages_by_chat(
        &self,
        chat_id: Uuid,
        page: Page,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, StoreError>> + Send;
}

type MessageRow = (String, String, String, String, bool, String);

fn message_from_row(
    (id, chat_id, content, kind, image, created_at): MessageRow,
) -> Result<MessageRecord, StoreError> {
    Ok(MessageRecord {
        id: decode_uuid(&id, "messages.id")?,
        chat_id: decode_uuid(&chat_id, "messages.chat_id")?,
        content,
        kind: MessageKind::from_str(&kind).map_err(|_| StoreError::Decode {
            column: "messages.kind",
            raw: kind.clone(),
        })?,
        image,
        created_at: decode_ts(&created_at, "messages.created_at"),
    })
}

impl MessageStore for SqliteStore {
    async fn create_message(&self, msg: &MessageRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (id, chat_id, content, kind, image, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(msg.id.to_string())
        .bind(msg.chat_id.to_string())
        .bind(&msg.content)
        .bind(msg.kind.as_ref())
        .bind(msg.image)
        .bind(encode_ts(&msg.created_at))
        .execute(self.pool())
        .await
        .map_err(|e| StoreError::from_write(e, "chat"))?;
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> Result<MessageRecord, StoreError> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT id, chat_id, content, kind, image, created_at FROM messages WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;
        row.map(message_from_row)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Message",
                id: id.to_string(),
            })
    }

    async fn list_messages_by_chat(
        &self,
        chat_id: Uuid,
        page: Page,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        // A client/system pair shares one timestamp; rowid keeps insertion order.
        let sql = format!(
            "SELECT id, chat_id, content, kind, image, created_at FROM messages \
             WHERE chat_id = ?1 ORDER BY created_at {dir}, rowid {dir} LIMIT ?2 OFFSET ?3",
            dir = page.order.sql(),
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(chat_id.to_string())
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(message_from_row).collect()
    }
}
