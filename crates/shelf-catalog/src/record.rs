//! Merged product and override types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_core::ProductKey;
use shelf_sources::OfferRecord;

/// Admin corrections for one product. Absent fields do not override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergens: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OverrideRecord {
    /// Trim every field and drop blank strings and empty lists, so that an
    /// empty value means "not overridden".
    pub fn normalized(self) -> Self {
        fn text(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        fn list(values: Option<Vec<String>>) -> Option<Vec<String>> {
            values
                .map(|vs| {
                    vs.into_iter()
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|vs| !vs.is_empty())
        }

        Self {
            name: text(self.name),
            brand: text(self.brand),
            ingredients: text(self.ingredients),
            labels: list(self.labels),
            allergens: list(self.allergens),
            images: list(self.images),
            updated_at: self.updated_at,
        }
    }

    /// Whether any field would override upstream data.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.brand.is_none()
            && self.ingredients.is_none()
            && self.labels.is_none()
            && self.allergens.is_none()
            && self.images.is_none()
    }
}

/// Product imagery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Images {
    pub hero: Option<String>,
    pub gallery: Vec<String>,
}

/// Offers split into the headline offer and the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Offers {
    pub primary: Option<OfferRecord>,
    pub others: Vec<OfferRecord>,
}

/// Availability of one upstream for this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SourceStatus {
    pub fn available() -> Self {
        Self {
            available: true,
            note: None,
        }
    }

    pub fn unavailable(note: impl Into<String>) -> Self {
        Self {
            available: false,
            note: Some(note.into()),
        }
    }
}

/// Marketplace availability plus the query that produced the offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceStatus {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideStatus {
    pub applied: bool,
    /// Set when the override store could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OverrideStatus {
    pub fn unreadable(note: impl Into<String>) -> Self {
        Self {
            applied: false,
            note: Some(note.into()),
        }
    }
}

/// Per-upstream provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub obf: SourceStatus,
    pub ebay: MarketplaceStatus,
    pub overrides: OverrideStatus,
}

/// The canonical record served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedProduct {
    pub key: ProductKey,
    pub name: String,
    pub brand: String,
    pub category: Option<String>,
    pub images: Images,
    pub ingredients: Option<String>,
    pub labels: Vec<String>,
    pub allergens: Vec<String>,
    pub offers: Offers,
    pub source: Sources,
    pub cached_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_drops_blank_values() {
        let record = OverrideRecord {
            name: Some("  ".into()),
            brand: Some(" Acme ".into()),
            labels: Some(vec![" ".into()]),
            images: Some(vec!["https://img/1.jpg".into(), "".into()]),
            ..OverrideRecord::default()
        }
        .normalized();

        assert_eq!(record.name, None);
        assert_eq!(record.brand.as_deref(), Some("Acme"));
        assert_eq!(record.labels, None);
        assert_eq!(record.images, Some(vec!["https://img/1.jpg".to_string()]));
        assert!(!record.is_empty());
        assert!(OverrideRecord::default().normalized().is_empty());
    }

    #[test]
    fn test_override_accepts_partial_camel_case_body() {
        let record: OverrideRecord =
            serde_json::from_str(r#"{"brand":"Acme","images":null,"updatedAt":null}"#).unwrap();
        assert_eq!(record.brand.as_deref(), Some("Acme"));
        assert!(record.images.is_none());
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"brand":"Acme"}"#);
    }
}
