//! Best-effort operations.
//!
//! Cleanup steps (unloading a model, deleting a scratch file) return a
//! `Result` like anything else, but their failures are logged here and never
//! propagated, so they cannot mask the primary outcome of a request.

use std::fmt::Display;
use std::future::Future;
use std::path::Path;

use tracing::{debug, warn};

/// Run `op`, logging and discarding its error. Returns whether it succeeded.
pub async fn best_effort<F, E>(operation: &'static str, op: F) -> bool
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match op.await {
        Ok(()) => {
            debug!(operation, "cleanup done");
            true
        }
        Err(e) => {
            warn!(operation, error = %e, "best-effort cleanup failed; continuing");
            false
        }
    }
}

/// Delete a scratch file, ignoring failure.
pub async fn remove_scratch_file(path: &Path) -> bool {
    best_effort("remove scratch file", tokio::fs::remove_file(path)).await
}
