//! The message workflow: persist the user's turn, produce a reply with the
//! text or image backend, persist the reply.

use std::fmt;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::DuetError;
use crate::entities::{MessageKind, MessageRecord, MessageStore, Page, SortOrder};
use crate::runtime::cleanup::remove_scratch_file;
use crate::runtime::{ImageRequest, ResidencyManager};
use crate::services::AssetUploader;

pub const IMAGE_STEPS: u32 = 30;
pub const IMAGE_GUIDANCE_SCALE: f32 = 8.0;

/// One conversational turn as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePair {
    pub client_message: MessageRecord,
    pub system_message: MessageRecord,
}

pub struct MessageOrchestrator<S> {
    store: S,
    residency: Arc<ResidencyManager>,
    uploader: Arc<dyn AssetUploader>,
    upload_folder: String,
}

impl<S> fmt::Debug for MessageOrchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageOrchestrator")
            .field("residency", &self.residency)
            .field("upload_folder", &self.upload_folder)
            .finish_non_exhaustive()
    }
}

impl<S: MessageStore> MessageOrchestrator<S> {
    pub fn new(
        store: S,
        residency: Arc<ResidencyManager>,
        uploader: Arc<dyn AssetUploader>,
        upload_folder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            residency,
            uploader,
            upload_folder: upload_folder.into(),
        }
    }

    /// Record `content` as a CLIENT message in `chat_id` and answer it.
    ///
    /// The chat is not pre-validated; a missing chat fails the first insert
    /// with NotFound. Once the CLIENT message is stored it stays stored, even
    /// if generation or upload fails afterwards.
    #[instrument(skip(self, content))]
    pub async fn handle(
        &self,
        chat_id: Uuid,
        content: &str,
        image: bool,
    ) -> Result<MessagePair, DuetError> {
        // Both halves share one timestamp, truncated to what the store keeps.
        let now = Utc::now().trunc_subsecs(6);

        let client_message = MessageRecord::new(chat_id, content, MessageKind::Client, image, now);
        self.store.create_message(&client_message).await?;

        let reply = if image {
            self.generate_image(content).await?
        } else {
            self.answer_text(content).await?
        };

        let system_message = MessageRecord::new(chat_id, reply, MessageKind::System, image, now);
        self.store.create_message(&system_message).await?;
        info!(client_id = %client_message.id, system_id = %system_message.id, "turn recorded");

        Ok(MessagePair {
            client_message,
            system_message,
        })
    }

    /// Render, upload and discard the local copy. Returns the public URL.
    async fn generate_image(&self, prompt: &str) -> Result<String, DuetError> {
        let lease = self
            .residency
            .acquire_image()
            .await
            .map_err(DuetError::GenerationFailure)?;

        let request = ImageRequest {
            prompt: prompt.to_owned(),
            negative_prompt: None,
            steps: IMAGE_STEPS,
            guidance_scale: IMAGE_GUIDANCE_SCALE,
            seed: rand::random::<u32>(),
        };
        let path = lease
            .backend()
            .generate(&request)
            .await
            .map_err(DuetError::GenerationFailure)?;

        let uploaded = self.uploader.upload(&path, &self.upload_folder).await;
        remove_scratch_file(&path).await;
        uploaded.map_err(DuetError::UploadFailure)
    }

    /// Ask the text backend and free it straight after, whatever the outcome.
    async fn answer_text(&self, prompt: &str) -> Result<String, DuetError> {
        let lease = self
            .residency
            .acquire_text()
            .await
            .map_err(DuetError::InferenceFailure)?;
        let answer = lease.backend().chat(prompt).await;
        self.residency.release_text(lease).await;
        answer.map_err(DuetError::InferenceFailure)
    }

    /// Page through a chat's messages by creation time.
    pub async fn list_messages(
        &self,
        chat_id: Uuid,
        limit: u32,
        offset: u32,
        ascending: bool,
    ) -> Result<Vec<MessageRecord>, DuetError> {
        let order = if ascending { SortOrder::Asc } else { SortOrder::Desc };
        Ok(self
            .store
            .list_messages_by_chat(chat_id, Page::new(limit, offset, order))
            .await?)
    }
}
