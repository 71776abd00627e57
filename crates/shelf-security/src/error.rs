//! Security errors.

use shelf_cache::CacheError;
use shelf_core::ShelfError;
use thiserror::Error;

/// Errors from limit checks and configuration.
#[derive(Debug, Error)]
pub enum LimitError {
    #[error("invalid limit configuration: {0}")]
    InvalidLimit(String),

    #[error("rate limit exceeded for {upstream}, retry after {retry_after_seconds}s")]
    Exceeded {
        upstream: String,
        retry_after_seconds: u64,
    },

    #[error("rate window store: {0}")]
    Store(#[from] CacheError),
}

impl From<LimitError> for ShelfError {
    fn from(e: LimitError) -> Self {
        match e {
            LimitError::Exceeded {
                upstream,
                retry_after_seconds,
            } => ShelfError::RateLimited {
                upstream,
                retry_after_seconds,
            },
            other => ShelfError::Internal(other.to_string()),
        }
    }
}

/// Admin authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization: Bearer` credential presented.
    #[error("missing bearer token")]
    MissingToken,

    /// Credential presented but wrong.
    #[error("invalid bearer token")]
    InvalidToken,

    /// Admin routes have no token configured.
    #[error("admin access disabled")]
    Disabled,
}

impl From<AuthError> for ShelfError {
    fn from(_: AuthError) -> Self {
        ShelfError::AuthFailure
    }
}
