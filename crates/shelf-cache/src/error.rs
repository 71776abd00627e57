//! Cache error types.

use shelf_core::ShelfError;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur when using the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to serialize or deserialize a value.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The backend cannot be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Operation exceeded its deadline.
    #[error("cache operation timed out: {0}")]
    Timeout(String),
}

impl From<CacheError> for ShelfError {
    fn from(e: CacheError) -> Self {
        ShelfError::Internal(format!("cache: {e}"))
    }
}
