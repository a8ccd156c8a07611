//! Unified error type for the command handlers.
//!
//! Every handler returns `Result<T, DuetError>`. Lower layers keep their own
//! enums ([`StoreError`], [`BackendError`], [`UploadError`],
//! [`CredentialError`]) and are folded in here by the handler that
//! knows which workflow step failed. The generation errors stay distinct so
//! callers can tell "the model broke" from "the asset store refused the file".
//!
//! Internal errors (Database, Internal) are logged with full detail by
//! [`DuetError::client_message`] but only a generic message is handed back.

use thiserror::Error;
use tracing::error;

use crate::entities::StoreError;
use crate::runtime::BackendError;
use crate::services::credentials::CredentialError;
use crate::services::upload::UploadError;

#[derive(Debug, Error)]
pub enum DuetError {
    /// A referenced user, chat or message does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    DuplicateValue(String),

    /// The image backend failed to load or to render.
    #[error("image generation failed: {0}")]
    GenerationFailure(#[source] BackendError),

    /// The rendered image could not be stored in the asset store.
    #[error("image upload failed: {0}")]
    UploadFailure(#[source] UploadError),

    /// The text backend failed to load or to answer.
    #[error("text generation failed: {0}")]
    InferenceFailure(#[source] BackendError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A component was constructed without the settings it needs.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DuetError {
    /// Stable classification string, e.g. `"not_found"`.
    pub fn kind(&self) -> &'static str {
        match self {
            DuetError::NotFound(_) => "not_found",
            DuetError::DuplicateValue(_) => "duplicate_value",
            DuetError::GenerationFailure(_) => "generation_failure",
            DuetError::UploadFailure(_) => "upload_failure",
            DuetError::InferenceFailure(_) => "inference_failure",
            DuetError::Unauthorized(_) => "unauthorized",
            DuetError::BadRequest(_) => "bad_request",
            DuetError::Configuration(_) => "configuration",
            DuetError::Database(_) => "database",
            DuetError::Internal(_) => "internal",
        }
    }

    /// The message safe to show a caller.
    pub fn client_message(&self) -> String {
        match self {
            DuetError::NotFound(m)
            | DuetError::DuplicateValue(m)
            | DuetError::Unauthorized(m)
            | DuetError::BadRequest(m)
            | DuetError::Configuration(m) => m.clone(),
            DuetError::GenerationFailure(e) => {
                error!(error = %e, "image backend error");
                "image generation failed".to_owned()
            }
            DuetError::UploadFailure(e) => {
                error!(error = %e, "asset upload error");
                "image upload failed".to_owned()
            }
            DuetError::InferenceFailure(e) => {
                error!(error = %e, "text backend error");
                "text generation failed".to_owned()
            }
            DuetError::Database(e) => {
                error!(error = %e, "database error");
                "internal error".to_owned()
            }
            DuetError::Internal(m) => {
                error!(message = %m, "internal error");
                "internal error".to_owned()
            }
        }
    }
}

impl From<StoreError> for DuetError {
    fn from(err: StoreError) -> Self {
        match err {
            e @ (StoreError::NotFound { .. } | StoreError::MissingParent { .. }) => {
                DuetError::NotFound(e.to_string())
            }
            StoreError::Duplicate(m) => DuetError::DuplicateValue(m),
            e @ StoreError::Decode { .. } => DuetError::Internal(e.to_string()),
            StoreError::Database(e) => DuetError::Database(e),
        }
    }
}

impl From<CredentialError> for DuetError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Expired => DuetError::Unauthorized("Token has expired".into()),
            CredentialError::Invalid => DuetError::Unauthorized("Invalid token".into()),
            CredentialError::MissingSecret => DuetError::Configuration(err.to_string()),
            CredentialError::Hashing(m) => DuetError::Internal(m),
        }
    }
}
