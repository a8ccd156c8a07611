//! Image backend: Stable Diffusion served by the inference server's
//! `ggml.diffusion` backend.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::runtime::cleanup::remove_scratch_file;
use crate::runtime::{BackendError, ImageBackend, ImageBackendLoader, ImageRequest};
use crate::services::inference::InferenceClient;
use crate::services::openai::{ImageGenerationRequest, ImageGenerationResponse};

const NAME_PREFIX_CHARS: usize = 50;

/// File stem derived from the first 50 characters of the prompt.
///
/// Lowercased; whitespace, path separators and other punctuation become `_`.
pub fn safe_name(prompt: &str) -> String {
    let stem: String = prompt
        .chars()
        .take(NAME_PREFIX_CHARS)
        .collect::<String>()
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "image".to_owned()
    } else {
        stem
    }
}

/// Path the rendered image is written to. The seed disambiguates repeated
/// prompts.
pub fn output_path(dir: &Path, prompt: &str, seed: u32) -> PathBuf {
    dir.join(format!("{}_{seed}.png", safe_name(prompt)))
}

pub struct DiffusionLoader {
    client: InferenceClient,
    config: ImageConfig,
}

impl DiffusionLoader {
    pub fn new(client: InferenceClient, config: ImageConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ImageBackendLoader for DiffusionLoader {
    async fn load(&self) -> Result<Arc<dyn ImageBackend>, BackendError> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        self.client
            .load_model(&self.config.backend_id, &self.config.model_path)
            .await?;
        Ok(Arc::new(DiffusionImageBackend {
            client: self.client.clone(),
            config: self.config.clone(),
            released: AtomicBool::new(false),
        }))
    }
}

pub struct DiffusionImageBackend {
    client: InferenceClient,
    config: ImageConfig,
    released: AtomicBool,
}

impl fmt::Debug for DiffusionImageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffusionImageBackend")
            .field("backend_id", &self.config.backend_id)
            .field("output_dir", &self.config.output_dir)
            .field("released", &self.released.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl ImageBackend for DiffusionImageBackend {
    async fn generate(&self, request: &ImageRequest) -> Result<PathBuf, BackendError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(BackendError::Released { backend: "image" });
        }

        let body = ImageGenerationRequest {
            model: &self.config.backend_id,
            prompt: &request.prompt,
            n: 1,
            size: &self.config.size,
            negative_prompt: request.negative_prompt.as_deref(),
            steps: request.steps,
            cfg_scale: request.guidance_scale,
            seed: request.seed,
        };
        let resp: ImageGenerationResponse = self
            .client
            .post_json("/v1/images/generations", &body)
            .await?;

        let encoded = resp
            .data
            .into_iter()
            .next()
            .map(|d| d.b64_json)
            .ok_or_else(|| BackendError::InvalidResponse("no image in response".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.as_bytes())?;
        debug!(image_bytes = bytes.len(), "image generation done");

        let path = output_path(&self.config.output_dir, &request.prompt, request.seed);
        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || -> Result<(), BackendError> {
            let img = image::load_from_memory(&bytes)?;
            img.save_with_format(&target, image::ImageFormat::Png)?;
            Ok(())
        })
        .await
        .map_err(BackendError::from)
        .and_then(|r| r);
        if let Err(e) = written {
            // Drop any partially written file.
            remove_scratch_file(&path).await;
            return Err(e);
        }

        info!(path = %path.display(), "image written");
        Ok(path)
    }

    async fn release(&self) -> Result<(), BackendError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(backend = %self.config.backend_id, "releasing image backend");
        self.client
            .unload_model(&self.config.backend_id, &self.config.model_path)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::config::InferenceConfig;
    use crate::testing::{StubServer, model_status};

    #[test]
    fn safe_name_lowercases_and_replaces_separators() {
        assert_eq!(safe_name("A Red/Sports\\Car"), "a_red_sports_car");
    }

    #[test]
    fn safe_name_keeps_first_fifty_chars() {
        let prompt = "x".repeat(80);
        assert_eq!(safe_name(&prompt).chars().count(), 50);
    }

    #[test]
    fn safe_name_never_escapes_directory() {
        let path = output_path(Path::new("out"), "../../etc/passwd", 3);
        assert_eq!(path.parent(), Some(Path::new("out")));
    }

    #[test]
    fn blank_prompt_gets_placeholder_name() {
        assert_eq!(safe_name("   "), "image");
        assert_eq!(
            output_path(Path::new("out"), "", 9),
            Path::new("out").join("image_9.png")
        );
    }

    struct Stubbed {
        server: StubServer,
        backend: Arc<dyn ImageBackend>,
        dir: tempfile::TempDir,
    }

    async fn loaded() -> Stubbed {
        let server = StubServer::start().await;
        server.route("/v1/models/load", 200, model_status("ggml.diffusion", "loaded"));
        server.route("/v1/models/unload", 200, model_status("ggml.diffusion", "unloaded"));
        let dir = tempfile::tempdir().unwrap();
        let loader = DiffusionLoader::new(
            InferenceClient::new(&InferenceConfig {
                base_url: server.base_url().to_owned(),
                token: None,
            }),
            ImageConfig {
                backend_id: "ggml.diffusion".into(),
                model_path: "models/sd.safetensors".into(),
                output_dir: dir.path().join("generated"),
                size: "64x64".into(),
            },
        );
        let backend = loader.load().await.unwrap();
        Stubbed {
            server,
            backend,
            dir,
        }
    }

    fn png_b64() -> String {
        let mut png = Vec::new();
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(png)
    }

    fn generations(b64: &str) -> String {
        serde_json::json!({ "created": 1, "data": [{ "b64_json": b64 }] }).to_string()
    }

    fn request(prompt: &str, seed: u32) -> ImageRequest {
        ImageRequest {
            prompt: prompt.into(),
            negative_prompt: None,
            steps: 30,
            guidance_scale: 8.0,
            seed,
        }
    }

    #[tokio::test]
    async fn generate_writes_decoded_png_under_output_dir() {
        let s = loaded().await;
        s.server.route("/v1/images/generations", 200, generations(&png_b64()));

        let path = s.backend.generate(&request("A red car", 7)).await.unwrap();
        assert_eq!(path, s.dir.path().join("generated").join("a_red_car_7.png"));
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));

        let sent: serde_json::Value =
            serde_json::from_str(&s.server.hits("/v1/images/generations")[0].body).unwrap();
        assert_eq!(sent["prompt"], "A red car");
        assert_eq!(sent["steps"], 30);
        assert_eq!(sent["cfg_scale"], 8.0);
        assert_eq!(sent["seed"], 7);
        assert_eq!(sent["size"], "64x64");
        assert!(sent.get("negative_prompt").is_none());
    }

    #[tokio::test]
    async fn server_error_becomes_status() {
        let s = loaded().await;
        s.server
            .route("/v1/images/generations", 500, r#"{"error":"sampler diverged"}"#);

        let err = s.backend.generate(&request("a cat", 1)).await.unwrap_err();
        assert!(
            matches!(err, BackendError::Status { status: 500, ref endpoint, .. } if endpoint == "/v1/images/generations"),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn empty_data_is_an_invalid_response() {
        let s = loaded().await;
        s.server.route("/v1/images/generations", 200, r#"{"data":[]}"#);
        let err = s.backend.generate(&request("a cat", 1)).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn undecodable_image_leaves_no_file_behind() {
        let s = loaded().await;
        let garbage = base64::engine::general_purpose::STANDARD.encode(b"not a png at all");
        s.server.route("/v1/images/generations", 200, generations(&garbage));

        let target = s.dir.path().join("generated").join("a_cat_3.png");
        std::fs::write(&target, b"partial").unwrap();

        let err = s.backend.generate(&request("a cat", 3)).await.unwrap_err();
        assert!(matches!(err, BackendError::Image(_)), "got {err:?}");
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn double_release_unloads_once_and_refuses_generate() {
        let s = loaded().await;
        s.backend.release().await.unwrap();
        s.backend.release().await.unwrap();
        assert_eq!(s.server.hits("/v1/models/unload").len(), 1);

        let err = s.backend.generate(&request("a cat", 1)).await.unwrap_err();
        assert!(matches!(err, BackendError::Released { backend: "image" }));
        assert!(s.server.hits("/v1/images/generations").is_empty());
    }
}
