//! HTTP client for the inference server.
//!
//! Both generation backends live behind the same server; this client owns the
//! connection pool and the optional bearer token they share.

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::InferenceConfig;
use crate::runtime::BackendError;
use crate::services::openai::{LoadModelRequest, ModelStatusResponse};

#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl InferenceClient {
    /// No request timeout is set: generation on a cold device can take minutes.
    pub fn new(config: &InferenceConfig) -> Self {
        let client = Client::builder()
            .user_agent(concat!("duet/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut req = self.client.post(self.url(path)).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                endpoint: path.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        debug!(endpoint = path, bytes = bytes.len(), "inference response");
        serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    /// Load weights for `backend_id` onto the device.
    pub async fn load_model(&self, backend_id: &str, model_path: &str) -> Result<(), BackendError> {
        info!(backend = backend_id, model_path, "loading model");
        let status: ModelStatusResponse = self
            .post_json(
                "/v1/models/load",
                &LoadModelRequest {
                    backend_id,
                    model_path,
                    num_workers: 1,
                },
            )
            .await?;
        debug!(backend = %status.backend, status = %status.status, "model load acknowledged");
        Ok(())
    }

    pub async fn unload_model(&self, backend_id: &str, model_path: &str) -> Result<(), BackendError> {
        info!(backend = backend_id, "unloading model");
        let status: ModelStatusResponse = self
            .post_json(
                "/v1/models/unload",
                &LoadModelRequest {
                    backend_id,
                    model_path,
                    num_workers: 1,
                },
            )
            .await?;
        debug!(backend = %status.backend, status = %status.status, "model unload acknowledged");
        Ok(())
    }
}
