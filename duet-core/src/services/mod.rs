//! Outbound services: credentials, the inference server adapters and the
//! asset store.

pub mod credentials;
pub mod diffusion;
pub mod inference;
pub mod llama;
pub mod openai;
pub mod upload;

pub use credentials::{CredentialError, CredentialService};
pub use diffusion::DiffusionLoader;
pub use inference::InferenceClient;
pub use llama::LlamaLoader;
pub use upload::{AssetUploader, CloudinaryUploader, UploadError};
