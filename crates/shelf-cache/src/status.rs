//! Cache lookup status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a cache-aside lookup, reported to clients in `X-Cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Served from a live cache entry.
    Hit,
    /// Computed fresh (absent, expired, or refresh forced).
    Miss,
}

impl CacheStatus {
    /// Header name carrying the status.
    pub const HEADER: &'static str = "x-cache";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
