//! Asset store for generated images.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::CloudinaryConfig;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("asset store credentials are not configured (set DUET_CLOUDINARY_*)")]
    MissingCredentials,

    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("asset store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("asset store rejected upload (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("asset store response carried no secure_url")]
    MissingUrl,
}

/// Stores a local file and returns its public URL.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, local_path: &Path, folder: &str) -> Result<String, UploadError>;
}

#[derive(Clone)]
struct Credentials {
    endpoint: String,
    api_key: String,
    api_secret: String,
}

/// Signed uploads to Cloudinary's image upload API.
///
/// Constructed even without credentials so text-only use needs none; every
/// upload then fails with [`UploadError::MissingCredentials`].
#[derive(Clone)]
pub struct CloudinaryUploader {
    client: Client,
    credentials: Option<Credentials>,
}

impl fmt::Debug for CloudinaryUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryUploader")
            .field("endpoint", &self.credentials.as_ref().map(|c| &c.endpoint))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

impl CloudinaryUploader {
    pub fn new(config: &CloudinaryConfig) -> Self {
        let credentials = match (
            config.cloud_name.as_deref(),
            config.api_key.as_deref(),
            config.api_secret.as_deref(),
        ) {
            (Some(cloud), Some(key), Some(secret)) => Some(Credentials {
                endpoint: format!(
                    "{}/v1_1/{cloud}/image/upload",
                    config.api_base.trim_end_matches('/')
                ),
                api_key: key.to_owned(),
                api_secret: secret.to_owned(),
            }),
            _ => None,
        };
        let client = Client::builder()
            .user_agent(concat!("duet/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            credentials,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

/// SHA-1 hex digest of the `&`-joined, key-sorted parameters followed by
/// the API secret.
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    sha1_smol::Sha1::from(format!("{joined}{api_secret}")).digest().to_string()
}

#[async_trait]
impl AssetUploader for CloudinaryUploader {
    async fn upload(&self, local_path: &Path, folder: &str) -> Result<String, UploadError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(UploadError::MissingCredentials)?;
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_owned());
        debug!(file = %file_name, bytes = bytes.len(), folder, "uploading asset");

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let params = [
            ("folder", folder.to_owned()),
            ("overwrite", "false".to_owned()),
            ("timestamp", timestamp),
        ];
        let signature = sign(&params, &creds.api_secret);

        let part = Part::bytes(bytes).file_name(file_name).mime_str("image/png")?;
        let mut form = Form::new()
            .text("api_key", creds.api_key.clone())
            .text("signature", signature)
            .part("file", part);
        for (k, v) in params {
            form = form.text(k, v);
        }

        let resp = self.client.post(&creds.endpoint).multipart(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let url = resp
            .json::<UploadResponse>()
            .await?
            .secure_url
            .ok_or(UploadError::MissingUrl)?;
        info!(url = %url, "asset uploaded");
        Ok(url)
    }
}
