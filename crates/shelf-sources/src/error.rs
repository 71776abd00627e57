//! Adapter errors.

use shelf_cache::CacheError;
use shelf_core::ShelfError;
use shelf_fetch::{FetchError, Upstream};
use thiserror::Error;

/// Result type for adapter calls.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors reported by upstream adapters.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure, non-2xx status, or undecodable body.
    #[error("{upstream}: {source}")]
    Fetch {
        upstream: Upstream,
        #[source]
        source: FetchError,
    },

    /// Upstream answered but has no such entity.
    #[error("{upstream}: {what} not found")]
    NotFound { upstream: Upstream, what: String },

    /// Local quota for the upstream is exhausted; the upstream was not called.
    #[error("{upstream}: rate limited, retry after {retry_after_seconds}s")]
    RateLimited {
        upstream: Upstream,
        retry_after_seconds: u64,
    },

    /// Adapter lacks credentials or other required settings.
    #[error("{upstream}: not configured ({reason})")]
    NotConfigured { upstream: Upstream, reason: String },

    /// Token or window state could not be read or written.
    #[error("{upstream}: state store: {source}")]
    Store {
        upstream: Upstream,
        #[source]
        source: CacheError,
    },
}

impl SourceError {
    pub fn fetch(upstream: Upstream) -> impl FnOnce(FetchError) -> Self {
        move |source| Self::Fetch { upstream, source }
    }

    pub fn upstream(&self) -> Upstream {
        match self {
            Self::Fetch { upstream, .. }
            | Self::NotFound { upstream, .. }
            | Self::RateLimited { upstream, .. }
            | Self::NotConfigured { upstream, .. }
            | Self::Store { upstream, .. } => *upstream,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short reason suitable for a `source.*.note` field.
    pub fn note(&self) -> String {
        match self {
            Self::Fetch { source, .. } => match source {
                FetchError::Http { status, .. } => format!("HTTP {status}"),
                FetchError::Timeout(_) => "timeout".into(),
                FetchError::Connection(_) => "connection failed".into(),
                FetchError::Deserialization(_) => "malformed response".into(),
                FetchError::Request(e) => e.clone(),
            },
            Self::NotFound { what, .. } => format!("{what} not found"),
            Self::RateLimited { .. } => "rate limited".into(),
            Self::NotConfigured { reason, .. } => reason.clone(),
            Self::Store { .. } => "state store unavailable".into(),
        }
    }
}

impl From<SourceError> for ShelfError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::NotFound { what, .. } => ShelfError::NotFound(what),
            SourceError::RateLimited {
                upstream,
                retry_after_seconds,
            } => ShelfError::RateLimited {
                upstream: upstream.name().to_string(),
                retry_after_seconds,
            },
            other => ShelfError::unavailable(other.upstream().name(), other.note()),
        }
    }
}
