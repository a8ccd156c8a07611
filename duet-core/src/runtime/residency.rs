use std::fmt;
use std::sync::Arc;

use strum::Display;
use tokio::sync::Mutex;
use tracing::info;

use crate::runtime::backend::{ImageBackend, ImageBackendLoader, TextBackend, TextBackendLoader};
use crate::runtime::cleanup::best_effort;
use crate::runtime::types::BackendError;

/// Which backend currently holds the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Resident {
    None,
    Text,
    Image,
}

enum Slot {
    Empty,
    Text(Arc<dyn TextBackend>),
    Image(Arc<dyn ImageBackend>),
}

impl Slot {
    fn resident(&self) -> Resident {
        match self {
            Slot::Empty => Resident::None,
            Slot::Text(_) => Resident::Text,
            Slot::Image(_) => Resident::Image,
        }
    }
}

/// Ownership token for the resident text backend.
///
/// Hand it back through [`ResidencyManager::release_text`] when done.
#[derive(Debug)]
pub struct TextLease {
    backend: Arc<dyn TextBackend>,
}

impl TextLease {
    pub fn backend(&self) -> &dyn TextBackend {
        self.backend.as_ref()
    }
}

/// Ownership token for the resident image backend.
///
/// Dropping the lease leaves the backend resident (warm) for the next image
/// request; [`ResidencyManager::release_image`] frees it explicitly.
#[derive(Debug)]
pub struct ImageLease {
    backend: Arc<dyn ImageBackend>,
}

impl ImageLease {
    pub fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }
}

/// Arbitrates the single compute device between the text and image backends.
///
/// The device cannot hold both models, so acquiring one backend first
/// releases the other. Release is best-effort: a failed unload is logged and
/// acquisition proceeds anyway.
///
/// The internal lock only serialises slot transitions. It is not held while a
/// lease is in use, so a concurrent request for the other backend can still
/// evict a backend mid-generation.
pub struct ResidencyManager {
    text_loader: Arc<dyn TextBackendLoader>,
    image_loader: Arc<dyn ImageBackendLoader>,
    slot: Mutex<Slot>,
}

impl fmt::Debug for ResidencyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resident = self
            .slot
            .try_lock()
            .map(|s| s.resident().to_string())
            .unwrap_or_else(|_| "<busy>".to_owned());
        write!(f, "ResidencyManager(resident={resident})")
    }
}

impl ResidencyManager {
    pub fn new(
        text_loader: Arc<dyn TextBackendLoader>,
        image_loader: Arc<dyn ImageBackendLoader>,
    ) -> Self {
        Self {
            text_loader,
            image_loader,
            slot: Mutex::new(Slot::Empty),
        }
    }

    pub async fn resident(&self) -> Resident {
        self.slot.lock().await.resident()
    }

    /// Make the text backend resident, evicting the image backend if needed.
    pub async fn acquire_text(&self) -> Result<TextLease, BackendError> {
        let mut slot = self.slot.lock().await;
        match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Text(backend) => {
                *slot = Slot::Text(Arc::clone(&backend));
                return Ok(TextLease { backend });
            }
            Slot::Image(evicted) => {
                info!("evicting image backend for text request");
                best_effort("release image backend", evicted.release()).await;
            }
            Slot::Empty => {}
        }

        info!("loading text backend");
        let backend = self.text_loader.load().await?;
        *slot = Slot::Text(Arc::clone(&backend));
        Ok(TextLease { backend })
    }

    /// Make the image backend resident, evicting the text backend if needed.
    pub async fn acquire_image(&self) -> Result<ImageLease, BackendError> {
        let mut slot = self.slot.lock().await;
        match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Image(backend) => {
                *slot = Slot::Image(Arc::clone(&backend));
                return Ok(ImageLease { backend });
            }
            Slot::Text(evicted) => {
                info!("evicting text backend for image request");
                best_effort("release text backend", evicted.release()).await;
            }
            Slot::Empty => {}
        }

        info!("loading image backend");
        let backend = self.image_loader.load().await?;
        *slot = Slot::Image(Arc::clone(&backend));
        Ok(ImageLease { backend })
    }

    /// Free the text backend behind `lease`.
    ///
    /// If the slot has since been taken over by another backend only the
    /// leased instance is released; the slot is left alone.
    pub async fn release_text(&self, lease: TextLease) {
        {
            let mut slot = self.slot.lock().await;
            if matches!(&*slot, Slot::Text(current) if Arc::ptr_eq(current, &lease.backend)) {
                *slot = Slot::Empty;
            }
        }
        best_effort("release text backend", lease.backend.release()).await;
    }

    /// Free the image backend behind `lease`.
    pub async fn release_image(&self, lease: ImageLease) {
        {
            let mut slot = self.slot.lock().await;
            if matches!(&*slot, Slot::Image(current) if Arc::ptr_eq(current, &lease.backend)) {
                *slot = Slot::Empty;
            }
        }
        best_effort("release image backend", lease.backend.release()).await;
    }

    /// Free whichever backend is resident. A no-op when the device is idle.
    pub async fn release_all(&self) {
        let mut slot = self.slot.lock().await;
        match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Text(b) => {
                best_effort("release text backend", b.release()).await;
            }
            Slot::Image(b) => {
                best_effort("release image backend", b.release()).await;
            }
            Slot::Empty => {}
        }
    }
}
