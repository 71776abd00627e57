//! Error taxonomy shared by the engine.

use thiserror::Error;

/// Errors surfaced by the aggregation engine to its callers.
///
/// Only `InvalidInput` and `AuthFailure` are hard failures for end users;
/// the remaining variants degrade a response rather than failing it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShelfError {
    /// Upstream network failure, non-2xx status or malformed body.
    #[error("upstream {upstream} unavailable: {reason}")]
    UpstreamUnavailable { upstream: String, reason: String },

    /// Request quota exhausted for an upstream.
    #[error("rate limited by {upstream}, retry after {retry_after_seconds}s")]
    RateLimited {
        upstream: String,
        retry_after_seconds: u64,
    },

    /// Malformed key or payload, rejected before any upstream call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Admin token missing or mismatched.
    #[error("authentication failed")]
    AuthFailure,

    /// The per-key click actor could not be reached.
    #[error("click actor unavailable: {0}")]
    ActorUnavailable(String),

    /// Upstream answered but has no such entity.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unexpected failure while building a response.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShelfError {
    /// Create an upstream-unavailable error.
    pub fn unavailable(upstream: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            upstream: upstream.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidInput(_) => "invalid_input",
            Self::AuthFailure => "auth_failure",
            Self::ActorUnavailable(_) => "actor_unavailable",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether this error rejects the request outright (4xx to the caller).
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::AuthFailure)
    }
}

impl From<serde_json::Error> for ShelfError {
    fn from(e: serde_json::Error) -> Self {
        ShelfError::Internal(format!("serialization: {e}"))
    }
}

/// Result alias for engine operations.
pub type ShelfResult<T> = Result<T, ShelfError>;
