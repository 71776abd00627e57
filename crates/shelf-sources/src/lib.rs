//! Upstream adapters for the shelf engine.
//!
//! Each adapter turns one external service into typed records:
//! - `OpenFoodAdapter` - product facts by barcode ([`ProductSource`])
//! - `MarketplaceAdapter` - offers by GTIN or free text, with an OAuth token cache ([`OfferSource`])
//! - `NutritionAdapter` - foods and nutrients, behind a per-client rate limiter ([`NutritionSource`])
//!
//! Adapters never decide what a failure means for a response; they report
//! a [`SourceError`] and the caller degrades.

mod error;
mod marketplace;
mod nutrition;
mod openfood;
mod record;
mod source;

#[cfg(test)]
mod testing;

pub use error::{SourceError, SourceResult};
pub use marketplace::{MarketplaceAdapter, TokenCache, MARKETPLACE_SCOPE, TOKEN_CACHE_KEY};
pub use nutrition::NutritionAdapter;
pub use openfood::OpenFoodAdapter;
pub use record::{Food, Nutrient, OfferRecord, Price, UpstreamProductRecord};
pub use source::{NutritionSource, OfferQuery, OfferSource, ProductSource};
