//! Adapter seams.

use std::fmt;

use async_trait::async_trait;
use shelf_core::ProductKey;

use crate::record::{Food, OfferRecord, UpstreamProductRecord};
use crate::SourceResult;

/// Source of product facts by key.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn product(&self, key: &ProductKey) -> SourceResult<UpstreamProductRecord>;
}

/// How to look offers up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferQuery {
    /// Identifier-exact search by GTIN/barcode.
    Gtin(String),
    /// Free-text search.
    Text(String),
}

impl OfferQuery {
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Gtin(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Gtin(q) | Self::Text(q) => q,
        }
    }
}

impl fmt::Display for OfferQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gtin(q) => write!(f, "gtin:{q}"),
            Self::Text(q) => write!(f, "{q}"),
        }
    }
}

/// Source of marketplace offers.
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// Offers in upstream relevance order. Zero results is `Ok(vec![])`.
    async fn search(&self, query: &OfferQuery) -> SourceResult<Vec<OfferRecord>>;
}

/// Source of nutrition facts, quota-checked per client identity.
#[async_trait]
pub trait NutritionSource: Send + Sync {
    /// Foods matching `query`. Zero matches is `NotFound`.
    async fn search(&self, client: &str, query: &str) -> SourceResult<Vec<Food>>;

    /// One food by database id.
    async fn food(&self, client: &str, fdc_id: u64) -> SourceResult<Food>;
}
