//! Wire types for the inference server's OpenAI-compatible and
//! model-management endpoints.

use serde::{Deserialize, Serialize};

// ── Model management ─────────────────────────────────────────────────────────

/// Body for `POST /v1/models/load` and `POST /v1/models/unload`.
#[derive(Debug, Clone, Serialize)]
pub struct LoadModelRequest<'a> {
    pub backend_id: &'a str,
    pub model_path: &'a str,
    pub num_workers: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelStatusResponse {
    pub backend: String,
    pub status: String,
}

// ── Chat Completions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"system"`, `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: content.into(),
        }
    }
}

/// Body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

// ── Image Generations ────────────────────────────────────────────────────────

/// Body for `POST /v1/images/generations`.
#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub n: u32,
    pub size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<&'a str>,
    pub steps: u32,
    pub cfg_scale: f32,
    pub seed: u32,
}

/// One generated image as base64-encoded PNG.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageData {
    pub b64_json: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub created: i64,
    pub data: Vec<ImageData>,
}
