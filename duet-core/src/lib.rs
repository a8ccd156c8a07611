//! duet-core – chat persistence and the text/image generation workflow.
//!
//! Layers, leaf-first:
//! - [`entities`]: SQLite store for users, chats and messages.
//! - [`services`]: credential service, HTTP adapters for the text and image
//!   model servers, and the asset uploader.
//! - [`runtime`]: backend traits and the [`runtime::ResidencyManager`] that
//!   keeps at most one heavyweight model resident on the device.
//! - [`handlers`]: user, auth, chat and message command handlers.

pub mod config;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod runtime;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::DuetError;
