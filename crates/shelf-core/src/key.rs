//! Product key newtype.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShelfError;

/// An external product identifier (numeric barcode).
///
/// Always non-empty and digits-only. The only way to obtain one is through
/// [`ProductKey::parse`], so every store keyed by `ProductKey` can rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductKey(String);

impl ProductKey {
    /// Longest barcode accepted.
    pub const MAX_LEN: usize = 32;

    /// Validate and wrap a raw key. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, ShelfError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ShelfError::InvalidInput("product key is empty".into()));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(ShelfError::InvalidInput(format!(
                "product key longer than {} digits",
                Self::MAX_LEN
            )));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ShelfError::InvalidInput(format!(
                "product key must be digits only: {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductKey {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProductKey {
    type Error = ShelfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductKey> for String {
    fn from(key: ProductKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ProductKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parse_valid() {
        let key = ProductKey::parse("8901030895555").unwrap();
        assert_eq!(key.as_str(), "8901030895555");
    }

    #[test]
    fn test_key_trims_whitespace() {
        let key = ProductKey::parse("  737628064502\n").unwrap();
        assert_eq!(key.as_str(), "737628064502");
    }

    #[test]
    fn test_key_rejects_empty() {
        assert!(matches!(
            ProductKey::parse("   "),
            Err(ShelfError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_key_rejects_non_digits() {
        assert!(ProductKey::parse("12ab34").is_err());
        assert!(ProductKey::parse("-123").is_err());
        assert!(ProductKey::parse("123 456").is_err());
    }

    #[test]
    fn test_key_rejects_too_long() {
        let raw = "1".repeat(ProductKey::MAX_LEN + 1);
        assert!(ProductKey::parse(&raw).is_err());
    }

    #[test]
    fn test_key_serde_validates() {
        let key: ProductKey = serde_json::from_str(r#""5000159484695""#).unwrap();
        assert_eq!(key.to_string(), "5000159484695");
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""5000159484695""#);

        let bad: Result<ProductKey, _> = serde_json::from_str(r#""not-a-key""#);
        assert!(bad.is_err());
    }
}
