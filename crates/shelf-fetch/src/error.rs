//! Fetch error types.

use shelf_core::ShelfError;

use crate::upstream::Upstream;

/// Error type for fetch operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {status} for {url}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Request error: {0}")]
    Request(String),
}

impl FetchError {
    /// HTTP status, when the upstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Attribute this failure to `upstream` in the service error taxonomy.
    pub fn for_upstream(self, upstream: Upstream) -> ShelfError {
        ShelfError::unavailable(upstream.name(), self)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if e.is_timeout() {
            Self::Timeout(url)
        } else if e.is_connect() {
            Self::Connection(e.to_string())
        } else if e.is_decode() {
            Self::Deserialization(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}
