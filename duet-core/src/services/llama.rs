//! Text backend: a domain-restricted smartphone assistant served by the
//! inference server's `ggml.llama` backend.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::TextConfig;
use crate::runtime::{BackendError, TextBackend, TextBackendLoader};
use crate::services::inference::InferenceClient;
use crate::services::openai::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

/// Returned verbatim for anything outside the assistant's domain.
pub const REFUSAL: &str = "Sorry, I can only answer questions about smartphones and cell phones.";

/// System turn sent ahead of every user prompt.
pub fn instructions() -> String {
    format!(
        "You are an assistant that is an expert exclusively in smartphones and cell phones. \
         Only answer questions about brands, models, technical specifications, prices and comparisons.\n\
         If the question is NOT about smartphones, you must answer EXACTLY:\n\
         \"{REFUSAL}\"\n\
         Do not add anything else.\n\n\
         ### Examples:\n\
         User: Which Bluetooth version does the Samsung M3310 have?\n\
         Assistant: Bluetooth 2.1.\n\n\
         User: How is compound interest calculated?\n\
         Assistant: {REFUSAL}"
    )
}

/// Normalise a raw completion: blank output and the refusal (with or without
/// quotes) both collapse to [`REFUSAL`].
pub fn finalize_reply(raw: &str) -> String {
    let reply = raw.trim();
    if reply.is_empty() || reply.trim_matches('"') == REFUSAL {
        REFUSAL.to_owned()
    } else {
        reply.to_owned()
    }
}

pub struct LlamaLoader {
    client: InferenceClient,
    config: TextConfig,
}

impl LlamaLoader {
    pub fn new(client: InferenceClient, config: TextConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TextBackendLoader for LlamaLoader {
    async fn load(&self) -> Result<Arc<dyn TextBackend>, BackendError> {
        self.client
            .load_model(&self.config.backend_id, &self.config.model_path)
            .await?;
        Ok(Arc::new(LlamaChatBackend {
            client: self.client.clone(),
            config: self.config.clone(),
            released: AtomicBool::new(false),
        }))
    }
}

pub struct LlamaChatBackend {
    client: InferenceClient,
    config: TextConfig,
    released: AtomicBool,
}

impl fmt::Debug for LlamaChatBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlamaChatBackend")
            .field("backend_id", &self.config.backend_id)
            .field("released", &self.released.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl TextBackend for LlamaChatBackend {
    async fn chat(&self, prompt: &str) -> Result<String, BackendError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(BackendError::Released { backend: "text" });
        }

        let request = ChatCompletionRequest {
            model: &self.config.backend_id,
            messages: vec![
                ChatMessage::new("system", instructions()),
                ChatMessage::new("user", prompt),
            ],
            stream: false,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(0.0),
        };
        let resp: ChatCompletionResponse = self
            .client
            .post_json("/v1/chat/completions", &request)
            .await?;

        let raw = resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BackendError::InvalidResponse("completion has no choices".into()))?;
        debug!(chars = raw.len(), "text completion received");
        Ok(finalize_reply(&raw))
    }

    async fn release(&self) -> Result<(), BackendError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(backend = %self.config.backend_id, "releasing text backend");
        self.client
            .unload_model(&self.config.backend_id, &self.config.model_path)
            .await
    }
}
