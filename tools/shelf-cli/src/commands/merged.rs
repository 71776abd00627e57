//! Fetch a merged product from a running server.

use anyhow::{bail, Context as _, Result};
use shelf_catalog::MergedProduct;

use super::{server_url, MergedArgs};
use crate::context::Context;
use crate::output::{availability_badge, cache_badge};

pub async fn run(args: MergedArgs, ctx: &Context) -> Result<()> {
    let base = args
        .server
        .clone()
        .unwrap_or_else(|| server_url(&ctx.config.server.bind));
    let url = format!("{}/products/{}/merged", base.trim_end_matches('/'), args.key);
    ctx.output.debug(&format!("GET {url} forceRefresh={}", args.force_refresh));

    let response = reqwest::Client::new()
        .get(&url)
        .query(&[("forceRefresh", args.force_refresh)])
        .send()
        .await
        .with_context(|| format!("Failed to reach {base}"))?;

    let status = response.status();
    let cache = response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Server returned {status}: {body}");
    }
    let merged: MergedProduct = response.json().await.context("Malformed merged product")?;

    if ctx.output.is_json() {
        ctx.output.json(&merged);
        return Ok(());
    }

    ctx.output.header(&merged.name);
    ctx.output.kv("key", merged.key.as_str());
    ctx.output.kv("cache", &cache_badge(&cache));
    ctx.output.kv("brand", &merged.brand);
    ctx.output.kv("category", merged.category.as_deref().unwrap_or("-"));
    ctx.output.kv("hero", merged.images.hero.as_deref().unwrap_or("-"));
    ctx.output.kv("gallery", &merged.images.gallery.len().to_string());
    if !merged.labels.is_empty() {
        ctx.output.kv("labels", &merged.labels.join(", "));
    }
    if !merged.allergens.is_empty() {
        ctx.output.kv("allergens", &merged.allergens.join(", "));
    }

    ctx.output.info("Offers");
    match &merged.offers.primary {
        Some(primary) => {
            let price = primary
                .price
                .as_ref()
                .map(|p| format!("{} {}", p.value, p.currency))
                .unwrap_or_else(|| "-".into());
            ctx.output.list_item(&format!("{} ({price})", primary.title));
            for other in &merged.offers.others {
                ctx.output.list_item(&other.title);
            }
        }
        None => ctx.output.list_item("none"),
    }

    ctx.output.info("Sources");
    let source = &merged.source;
    ctx.output.kv("obf", &with_note(availability_badge(source.obf.available), source.obf.note.as_deref()));
    ctx.output.kv("ebay", &with_note(availability_badge(source.ebay.available), source.ebay.note.as_deref()));
    if let Some(query) = &source.ebay.query {
        ctx.output.kv("ebay query", query);
    }
    ctx.output.kv("overrides", if source.overrides.applied { "applied" } else { "none" });
    ctx.output.kv("cached at", &merged.cached_at.to_rfc3339());
    Ok(())
}

fn with_note(badge: String, note: Option<&str>) -> String {
    match note {
        Some(note) => format!("{badge} ({note})"),
        None => badge,
    }
}
