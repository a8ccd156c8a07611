use thiserror::Error;

/// Errors returned by a generation backend or its loader.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The model server could not be reached or the connection failed mid-request.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The model server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The model server answered 2xx but the body was not what we expect.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// The backend was used after [`release`](crate::runtime::TextBackend::release).
    #[error("{backend} backend has been released")]
    Released { backend: &'static str },

    #[error("failed to decode generated image: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}
