//! Precedence rules for building a [`MergedProduct`].
//!
//! Pure functions only: no I/O, no clock. The orchestrator gathers inputs
//! and hands them here.

use chrono::{DateTime, Utc};
use shelf_core::ProductKey;
use shelf_sources::{OfferRecord, UpstreamProductRecord};

use crate::record::{Images, MergedProduct, Offers, OverrideRecord, Sources};

/// Upstream and offer images each contribute at most this many to the gallery.
pub const GALLERY_IMAGES_PER_SOURCE: usize = 3;

/// Offers listed after the primary one.
pub const MAX_OTHER_OFFERS: usize = 4;

/// Everything a merge needs.
#[derive(Debug, Clone, Copy)]
pub struct MergeInputs<'a> {
    pub key: &'a ProductKey,
    pub upstream: Option<&'a UpstreamProductRecord>,
    pub offers: &'a [OfferRecord],
    pub overrides: &'a OverrideRecord,
}

/// Build the canonical record.
///
/// Per field, the first present value wins:
/// - `name`: override, upstream, first offer title, raw key
/// - `brand`: override, upstream, first offer brand, raw key
/// - `images.hero`: first override image, upstream hero, first offer image
/// - `images.gallery`: override images, else deduped upstream + offer images
/// - `ingredients`, `labels`, `allergens`: override, upstream (tags normalized)
pub fn merge(inputs: MergeInputs<'_>, mut source: Sources, now: DateTime<Utc>) -> MergedProduct {
    let MergeInputs {
        key,
        upstream,
        offers,
        overrides,
    } = inputs;
    let first_offer = offers.first();

    let name = overrides
        .name
        .clone()
        .or_else(|| upstream.and_then(|u| u.name.clone()))
        .or_else(|| first_offer.map(|o| o.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| key.to_string());

    let brand = overrides
        .brand
        .clone()
        .or_else(|| upstream.and_then(|u| u.brand.clone()))
        .or_else(|| first_offer.and_then(|o| o.brand.clone()))
        .unwrap_or_else(|| key.to_string());

    let hero = overrides
        .images
        .as_ref()
        .and_then(|images| images.first().cloned())
        .or_else(|| upstream.and_then(|u| u.hero_image.clone().or_else(|| u.images.first().cloned())))
        .or_else(|| first_offer.and_then(|o| o.image.clone()));

    let gallery = match &overrides.images {
        Some(images) if !images.is_empty() => dedup_preserving_order(images.iter().cloned()),
        _ => {
            let upstream_images = upstream
                .map(|u| u.images.as_slice())
                .unwrap_or_default()
                .iter()
                .take(GALLERY_IMAGES_PER_SOURCE)
                .cloned();
            let offer_images = offers
                .iter()
                .filter_map(|o| o.image.clone())
                .take(GALLERY_IMAGES_PER_SOURCE);
            dedup_preserving_order(upstream_images.chain(offer_images))
        }
    };

    let ingredients = overrides
        .ingredients
        .clone()
        .or_else(|| upstream.and_then(|u| u.ingredients.clone()));

    let labels = overrides
        .labels
        .clone()
        .unwrap_or_else(|| normalize_tags(upstream.map(|u| u.labels.as_slice()).unwrap_or_default()));

    let allergens = overrides
        .allergens
        .clone()
        .unwrap_or_else(|| normalize_tags(upstream.map(|u| u.allergens.as_slice()).unwrap_or_default()));

    source.overrides.applied = !overrides.is_empty();

    MergedProduct {
        key: key.clone(),
        name,
        brand,
        category: upstream.and_then(|u| u.category.clone()),
        images: Images { hero, gallery },
        ingredients,
        labels,
        allergens,
        offers: split_offers(offers),
        source,
        cached_at: now,
    }
}

/// First offer is primary; the next [`MAX_OTHER_OFFERS`] follow.
pub fn split_offers(offers: &[OfferRecord]) -> Offers {
    let mut iter = offers.iter().cloned();
    Offers {
        primary: iter.next(),
        others: iter.take(MAX_OTHER_OFFERS).collect(),
    }
}

/// Turn an upstream tag into display text: strip a two-letter locale prefix
/// (`en:`) and replace hyphens with spaces.
///
/// ```
/// use shelf_catalog::merge::normalize_tag;
/// assert_eq!(normalize_tag("en:gluten-free"), "gluten free");
/// assert_eq!(normalize_tag("organic"), "organic");
/// ```
pub fn normalize_tag(tag: &str) -> String {
    let tag = tag.trim();
    let bytes = tag.as_bytes();
    let without_locale = if bytes.len() > 3
        && bytes[2] == b':'
        && bytes[0].is_ascii_alphabetic()
        && bytes[1].is_ascii_alphabetic()
    {
        &tag[3..]
    } else {
        tag
    };
    without_locale.replace('-', " ")
}

/// Normalize every tag, dropping blanks and duplicates.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    dedup_preserving_order(
        tags.iter()
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty()),
    )
}

/// Drop repeats, keeping the first occurrence of each value.
pub fn dedup_preserving_order<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MarketplaceStatus, OverrideStatus, SourceStatus};

    fn key() -> ProductKey {
        ProductKey::parse("8901030895555").unwrap()
    }

    fn sources() -> Sources {
        Sources {
            obf: SourceStatus::available(),
            ebay: MarketplaceStatus {
                available: true,
                note: None,
                query: None,
            },
            overrides: OverrideStatus::default(),
        }
    }

    fn offer(id: &str, title: &str, image: Option<&str>) -> OfferRecord {
        OfferRecord {
            item_id: id.into(),
            title: title.into(),
            price: None,
            seller: None,
            url: None,
            affiliate_url: None,
            image: image.map(Into::into),
            brand: None,
        }
    }

    fn upstream() -> UpstreamProductRecord {
        UpstreamProductRecord {
            name: Some("Green Tea".into()),
            brand: Some("Leafy".into()),
            category: Some("Beverages".into()),
            hero_image: Some("https://img/front.jpg".into()),
            images: vec!["https://img/front.jpg".into(), "https://img/back.jpg".into()],
            ingredients: Some("green tea leaves".into()),
            labels: vec!["en:organic".into(), "en:fair-trade".into()],
            allergens: vec![],
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn run(
        upstream: Option<&UpstreamProductRecord>,
        offers: &[OfferRecord],
        overrides: &OverrideRecord,
    ) -> MergedProduct {
        merge(
            MergeInputs {
                key: &key(),
                upstream,
                offers,
                overrides,
            },
            sources(),
            now(),
        )
    }

    #[test]
    fn test_override_beats_upstream() {
        let overrides = OverrideRecord {
            brand: Some("Acme".into()),
            ..OverrideRecord::default()
        };
        let merged = run(Some(&upstream()), &[], &overrides);

        assert_eq!(merged.brand, "Acme");
        assert_eq!(merged.name, "Green Tea");
        assert!(merged.source.overrides.applied);
    }

    #[test]
    fn test_upstream_fields_and_normalized_tags() {
        let merged = run(Some(&upstream()), &[], &OverrideRecord::default());

        assert_eq!(merged.brand, "Leafy");
        assert_eq!(merged.category.as_deref(), Some("Beverages"));
        assert_eq!(merged.labels, vec!["organic", "fair trade"]);
        assert_eq!(merged.images.hero.as_deref(), Some("https://img/front.jpg"));
        assert!(!merged.source.overrides.applied);
        assert_eq!(merged.cached_at, now());
    }

    #[test]
    fn test_offer_title_then_key_for_name() {
        let offers = [offer("1", "Leafy Green Tea 100g", Some("https://offer/1.jpg"))];
        let merged = run(None, &offers, &OverrideRecord::default());
        assert_eq!(merged.name, "Leafy Green Tea 100g");
        assert_eq!(merged.images.hero.as_deref(), Some("https://offer/1.jpg"));
        assert_eq!(merged.brand, "8901030895555");

        let merged = run(None, &[], &OverrideRecord::default());
        assert_eq!(merged.name, "8901030895555");
        assert_eq!(merged.brand, "8901030895555");
        assert_eq!(merged.images.hero, None);
    }

    #[test]
    fn test_offer_brand_used_when_upstream_has_none() {
        let mut branded = offer("1", "Tea", None);
        branded.brand = Some("Leafy".into());
        let merged = run(None, &[branded], &OverrideRecord::default());
        assert_eq!(merged.brand, "Leafy");
    }

    #[test]
    fn test_gallery_dedup() {
        let upstream = UpstreamProductRecord {
            images: vec!["A".into(), "B".into(), "A".into()],
            ..UpstreamProductRecord::default()
        };
        let offers = [offer("1", "x", Some("A")), offer("2", "y", Some("C"))];
        let merged = run(Some(&upstream), &offers, &OverrideRecord::default());
        assert_eq!(merged.images.gallery, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_gallery_caps_each_source() {
        let upstream = UpstreamProductRecord {
            images: (1..=5).map(|i| format!("u{i}")).collect(),
            ..UpstreamProductRecord::default()
        };
        let offers: Vec<_> = (1..=5)
            .map(|i| offer(&i.to_string(), "t", Some(format!("o{i}").as_str())))
            .collect();
        let merged = run(Some(&upstream), &offers, &OverrideRecord::default());
        assert_eq!(merged.images.gallery, vec!["u1", "u2", "u3", "o1", "o2", "o3"]);
    }

    #[test]
    fn test_override_images_replace_gallery_and_hero() {
        let overrides = OverrideRecord {
            images: Some(vec!["O1".into(), "O2".into()]),
            ..OverrideRecord::default()
        };
        let merged = run(Some(&upstream()), &[], &overrides);
        assert_eq!(merged.images.hero.as_deref(), Some("O1"));
        assert_eq!(merged.images.gallery, vec!["O1", "O2"]);
    }

    #[test]
    fn test_offer_split() {
        let offers: Vec<_> = (0..7).map(|i| offer(&i.to_string(), "t", None)).collect();
        let split = split_offers(&offers);
        assert_eq!(split.primary.map(|o| o.item_id), Some("0".to_string()));
        let others: Vec<_> = split.others.iter().map(|o| o.item_id.as_str()).collect();
        assert_eq!(others, vec!["1", "2", "3", "4"]);

        let empty = split_offers(&[]);
        assert!(empty.primary.is_none());
        assert!(empty.others.is_empty());
    }

    #[test]
    fn test_normalize_tag_edge_cases() {
        assert_eq!(normalize_tag("fr:sans-gluten"), "sans gluten");
        assert_eq!(normalize_tag("en:"), "en:");
        assert_eq!(normalize_tag("12:x"), "12:x");
        assert_eq!(
            normalize_tags(&["en:milk".into(), "fr:milk".into(), " ".into()]),
            vec!["milk"]
        );
    }
}
