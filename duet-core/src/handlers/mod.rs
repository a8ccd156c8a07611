//! Command handlers: the operations exposed to a transport.
//!
//! Each handler owns its collaborators (store, credential service, residency
//! manager) and returns [`DuetError`](crate::DuetError).

pub mod auth;
pub mod chat;
pub mod message;
pub mod user;

pub use auth::AuthHandler;
pub use chat::ChatHandler;
pub use message::{MessageOrchestrator, MessagePair};
pub use user::UserHandler;

use crate::DuetError;

/// Reject `value` if it is longer than `max` characters.
pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<(), DuetError> {
    if value.chars().count() > max {
        return Err(DuetError::BadRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}
