//! Contracts for the two heavyweight generation backends.
//!
//! A backend is "resident" from the moment its loader returns it until its
//! `release` has been called. Loaders are expensive; the
//! [`ResidencyManager`](crate::runtime::ResidencyManager) decides when to
//! call them.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::runtime::types::BackendError;

/// A loaded text-generation model.
#[async_trait]
pub trait TextBackend: Send + Sync + Debug {
    /// Answer one prompt.
    async fn chat(&self, prompt: &str) -> Result<String, BackendError>;

    /// Free device memory. Releasing an already-released backend is a no-op.
    async fn release(&self) -> Result<(), BackendError>;
}

/// Constructs a [`TextBackend`], loading its weights onto the device.
#[async_trait]
pub trait TextBackendLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn TextBackend>, BackendError>;
}

/// Parameters for a single image generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: u32,
}

/// A loaded image-generation model.
#[async_trait]
pub trait ImageBackend: Send + Sync + Debug {
    /// Render one image and return the path of the local file it was written to.
    async fn generate(&self, request: &ImageRequest) -> Result<PathBuf, BackendError>;

    /// Free device memory. Releasing an already-released backend is a no-op.
    async fn release(&self) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ImageBackendLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn ImageBackend>, BackendError>;
}
