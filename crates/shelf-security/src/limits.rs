//! Sliding-window rate limiting for upstream quotas.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shelf_cache::{cache_key, Cache};
use shelf_core::SharedClock;
use tracing::{debug, warn};

use crate::LimitError;

/// Quota configuration: at most `ceiling` calls per trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Maximum calls inside one window.
    pub ceiling: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimit {
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self { ceiling, window }
    }

    /// `ceiling` calls per hour.
    pub fn per_hour(ceiling: u32) -> Self {
        Self::new(ceiling, Duration::from_secs(3600))
    }

    /// Validate the limit configuration.
    pub fn validate(&self) -> Result<(), LimitError> {
        if self.ceiling == 0 {
            return Err(LimitError::InvalidLimit("ceiling cannot be 0".into()));
        }
        if self.window.is_zero() {
            return Err(LimitError::InvalidLimit("window cannot be 0".into()));
        }
        Ok(())
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The call was recorded against the window.
    Allowed { remaining: u32 },
    /// Over quota; nothing was recorded.
    Limited { retry_after_seconds: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Persisted window: call timestamps in epoch millis, oldest first.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RateWindow {
    calls: Vec<i64>,
}

/// Sliding-window limiter for one upstream.
///
/// State lives in the cache store under `rate_limit:{upstream}:{identity}`
/// with a TTL of one window plus a minute. Concurrent checks for the same
/// identity may race (read, prune, write); the limiter tolerates an
/// occasional extra call through rather than serializing callers.
#[derive(Clone)]
pub struct RateLimiter {
    upstream: String,
    limit: RateLimit,
    cache: Cache,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(upstream: impl Into<String>, limit: RateLimit, cache: Cache, clock: SharedClock) -> Self {
        Self {
            upstream: upstream.into(),
            limit,
            cache,
            clock,
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Store key for an identity's window.
    pub fn window_key(&self, identity: &str) -> String {
        cache_key!("rate_limit", self.upstream, identity)
    }

    /// Prune the identity's window, then record and allow the call if under
    /// the ceiling, else report when the oldest call leaves the window.
    pub async fn check(&self, identity: &str) -> Result<RateDecision, LimitError> {
        let key = self.window_key(identity);
        let now = self.clock.now_millis();
        let window_ms = self.limit.window_millis();

        let mut window: RateWindow = self.cache.get(&key).await?.unwrap_or_default();
        window.calls.retain(|&at| at > now - window_ms);
        window.calls.sort_unstable();

        if window.calls.len() >= self.limit.ceiling as usize {
            let oldest = window.calls.first().copied().unwrap_or(now);
            let wait_ms = (oldest + window_ms - now).max(0);
            let retry_after_seconds = ((wait_ms + 999) / 1000).max(1) as u64;
            warn!(upstream = %self.upstream, identity, retry_after_seconds, "upstream quota exhausted");
            return Ok(RateDecision::Limited {
                retry_after_seconds,
            });
        }

        window.calls.push(now);
        let remaining = self.limit.ceiling.saturating_sub(window.calls.len() as u32);
        let ttl = self.limit.window + Duration::from_secs(60);
        self.cache.set(&key, &window, Some(ttl)).await?;
        debug!(upstream = %self.upstream, identity, remaining, "quota check passed");
        Ok(RateDecision::Allowed { remaining })
    }

    /// Like [`RateLimiter::check`] but over quota is an error.
    pub async fn acquire(&self, identity: &str) -> Result<u32, LimitError> {
        match self.check(identity).await? {
            RateDecision::Allowed { remaining } => Ok(remaining),
            RateDecision::Limited {
                retry_after_seconds,
            } => Err(LimitError::Exceeded {
                upstream: self.upstream.clone(),
                retry_after_seconds,
            }),
        }
    }

    /// Forget an identity's window.
    pub async fn reset(&self, identity: &str) -> Result<(), LimitError> {
        self.cache.delete(&self.window_key(identity)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("upstream", &self.upstream)
            .field("limit", &self.limit)
            .finish()
    }
}
