//! Click ledger error types.

use shelf_cache::CacheError;
use shelf_core::ShelfError;
use thiserror::Error;

/// Result type for click operations.
pub type ClickResult<T> = Result<T, ClickError>;

#[derive(Error, Debug)]
pub enum ClickError {
    /// Mailbox closed, pool offline, or the round trip missed its deadline.
    #[error("actor {actor} unavailable: {reason}")]
    ActorUnavailable { actor: String, reason: String },

    /// Counter or click list could not be read or written.
    #[error("click store: {0}")]
    Store(#[from] CacheError),
}

impl ClickError {
    pub(crate) fn unavailable(actor: impl ToString, reason: impl Into<String>) -> Self {
        Self::ActorUnavailable {
            actor: actor.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ClickError> for ShelfError {
    fn from(e: ClickError) -> Self {
        match e {
            ClickError::ActorUnavailable { .. } => ShelfError::ActorUnavailable(e.to_string()),
            ClickError::Store(source) => source.into(),
        }
    }
}
