//! Runtime configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Runtime configuration for duet.
///
/// Every field has a default so the binary starts without any environment
/// variables set. Secrets are optional here and only checked when the
/// component that needs them is constructed.
#[derive(Debug, Clone)]
pub struct Config {
    /// sqlx SQLite URL (default: `"sqlite://duet.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// HMAC secret used to sign bearer tokens.
    pub secret_key: Option<String>,

    /// Bearer token lifetime in minutes.
    pub token_ttl_minutes: i64,

    /// Model-server connection shared by both generation backends.
    pub inference: InferenceConfig,

    pub text: TextConfig,

    pub image: ImageConfig,

    pub cloudinary: CloudinaryConfig,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the model server, without a trailing slash.
    pub base_url: String,
    /// Optional bearer token sent with every model-server request.
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Backend identifier used for `model.load` / `model.unload`.
    pub backend_id: String,
    pub model_path: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub backend_id: String,
    pub model_path: String,
    /// Scratch directory for generated images awaiting upload.
    pub output_dir: PathBuf,
    /// Output resolution, e.g. `"512x512"`.
    pub size: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    /// Upload API origin (default: `"https://api.cloudinary.com"`).
    pub api_base: String,
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Remote folder every generated image is uploaded into.
    pub folder: String,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: env_or("DUET_DATABASE_URL", "sqlite://duet.db?mode=rwc"),
            log_level: env_or("DUET_LOG", "info"),
            log_json: std::env::var("DUET_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            secret_key: env_opt("DUET_SECRET_KEY"),
            token_ttl_minutes: parse_env("DUET_TOKEN_TTL_MINUTES", 24 * 60),
            inference: InferenceConfig {
                base_url: env_or("DUET_INFERENCE_URL", "http://127.0.0.1:3000")
                    .trim_end_matches('/')
                    .to_owned(),
                token: env_opt("DUET_INFERENCE_TOKEN"),
            },
            text: TextConfig {
                backend_id: env_or("DUET_TEXT_BACKEND_ID", "ggml.llama"),
                model_path: env_or("DUET_TEXT_MODEL_PATH", "models/assistant.gguf"),
                max_tokens: parse_env("DUET_TEXT_MAX_TOKENS", 256),
            },
            image: ImageConfig {
                backend_id: env_or("DUET_IMAGE_BACKEND_ID", "ggml.diffusion"),
                model_path: env_or(
                    "DUET_IMAGE_MODEL_PATH",
                    "models/stable-diffusion.safetensors",
                ),
                output_dir: PathBuf::from(env_or("DUET_IMAGE_OUTPUT_DIR", "generated_images")),
                size: env_or("DUET_IMAGE_SIZE", "512x512"),
            },
            cloudinary: CloudinaryConfig {
                api_base: env_or("DUET_CLOUDINARY_API_BASE", "https://api.cloudinary.com")
                    .trim_end_matches('/')
                    .to_owned(),
                cloud_name: env_opt("DUET_CLOUDINARY_CLOUD_NAME"),
                api_key: env_opt("DUET_CLOUDINARY_API_KEY"),
                api_secret: env_opt("DUET_CLOUDINARY_API_SECRET"),
                folder: env_or("DUET_UPLOAD_FOLDER", "chat_images"),
            },
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
