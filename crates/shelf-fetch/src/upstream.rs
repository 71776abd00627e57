//! The external services the engine depends on.

use std::time::Duration;

use crate::retry::{BackoffStrategy, Jitter, RetryCondition, RetryPolicy};

/// Well-known upstreams, each with default timeouts and retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    /// Open product database (product facts by barcode).
    OpenFood,
    /// Marketplace item search.
    Marketplace,
    /// Marketplace OAuth token endpoint.
    MarketplaceAuth,
    /// Nutrition database.
    Nutrition,
    /// Custom upstream with name.
    Custom(&'static str),
}

impl Upstream {
    /// Get the default total timeout for this upstream.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::OpenFood => Duration::from_millis(4000),
            Self::Marketplace | Self::MarketplaceAuth => Duration::from_millis(5000),
            Self::Nutrition => Duration::from_millis(6000),
            Self::Custom(_) => Duration::from_millis(5000),
        }
    }

    /// Get the default retry policy for this upstream.
    pub fn default_retry_policy(&self) -> RetryPolicy {
        match self {
            // Single attempt; a miss degrades the merged record.
            Self::OpenFood | Self::MarketplaceAuth | Self::Custom(_) => RetryPolicy::none(),
            Self::Marketplace => RetryPolicy::new(3)
                .with_backoff(BackoffStrategy::Fixed(Duration::from_millis(500)))
                .with_conditions(vec![RetryCondition::StatusCode(429)]),
            Self::Nutrition => RetryPolicy::new(3)
                .with_backoff(BackoffStrategy::Exponential {
                    base: Duration::from_secs(1),
                    max: Duration::from_secs(8),
                })
                .with_jitter(Jitter::Full)
                .with_conditions(vec![
                    RetryCondition::StatusCode(429),
                    RetryCondition::ServerError,
                ]),
        }
    }

    /// Get the name of this upstream.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenFood => "obf",
            Self::Marketplace => "ebay",
            Self::MarketplaceAuth => "ebay-auth",
            Self::Nutrition => "usda",
            Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
