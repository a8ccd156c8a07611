pub mod backend;
pub mod cleanup;
pub mod residency;
pub mod types;

pub use backend::{ImageBackend, ImageBackendLoader, ImageRequest, TextBackend, TextBackendLoader};
pub use residency::{ImageLease, Resident, ResidencyManager, TextLease};
pub use types::BackendError;
