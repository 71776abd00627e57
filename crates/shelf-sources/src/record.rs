//! Typed records produced by the adapters.

use serde::{Deserialize, Serialize};

/// Product facts from the open product database. Immutable once fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamProductRecord {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    /// Front-of-pack image.
    pub hero_image: Option<String>,
    /// Every distinct image URL, hero first.
    pub images: Vec<String>,
    pub ingredients: Option<String>,
    /// Raw label tags, e.g. `en:organic`.
    pub labels: Vec<String>,
    /// Raw allergen tags, e.g. `en:gluten`.
    pub allergens: Vec<String>,
}

/// A listed price, kept as the upstream decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub value: String,
    pub currency: String,
}

impl Price {
    /// Amount in minor units (cents), when the value parses.
    ///
    /// ```
    /// use shelf_sources::Price;
    /// let price = Price { value: "12.5".into(), currency: "USD".into() };
    /// assert_eq!(price.amount_cents(), Some(1250));
    /// ```
    pub fn amount_cents(&self) -> Option<i64> {
        let (whole, frac) = match self.value.trim().split_once('.') {
            Some((w, f)) => (w, f),
            None => (self.value.trim(), ""),
        };
        let whole: i64 = whole.parse().ok()?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().ok()? * 10,
            _ => frac.get(..2)?.parse::<i64>().ok()?,
        };
        whole.checked_mul(100)?.checked_add(frac)
    }
}

/// One marketplace offer, in upstream relevance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRecord {
    pub item_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    /// Canonical listing URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliate_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Brand aspect, when the marketplace reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// A food from the nutrition database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub fdc_id: u64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    pub nutrients: Vec<Nutrient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub name: String,
    pub amount: f64,
    pub unit: String,
}
