//! Catalog error types.

use shelf_cache::CacheError;
use shelf_core::ShelfError;
use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur while building or correcting merged records.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Override rejected before storing.
    #[error("invalid override: {0}")]
    InvalidOverride(String),

    /// Override or snapshot storage failed.
    #[error("catalog store: {0}")]
    Store(#[from] CacheError),
}

impl From<CatalogError> for ShelfError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::InvalidOverride(reason) => ShelfError::InvalidInput(reason),
            CatalogError::Store(source) => source.into(),
        }
    }
}
