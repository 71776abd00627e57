//! Fetch click statistics from a running server.

use anyhow::{bail, Context as _, Result};
use shelf_clicks::ClickStats;

use super::{server_url, StatsArgs};
use crate::context::Context;

pub async fn run(args: StatsArgs, ctx: &Context) -> Result<()> {
    let token = match ctx.config.admin.token.as_deref() {
        Some(token) if !token.is_empty() => token,
        _ => bail!("admin.token (or SHELF_ADMIN_TOKEN) is required for stats"),
    };
    let base = args
        .server
        .clone()
        .unwrap_or_else(|| server_url(&ctx.config.server.bind));
    let url = format!("{}/products/{}/stats", base.trim_end_matches('/'), args.key);
    ctx.output.debug(&format!("GET {url}"));

    let response = reqwest::Client::new()
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .with_context(|| format!("Failed to reach {base}"))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Server returned {status}: {body}");
    }
    let stats: ClickStats = response.json().await.context("Malformed stats response")?;

    if ctx.output.is_json() {
        ctx.output.json(&stats);
        return Ok(());
    }

    ctx.output.header(&format!("Clicks for {}", args.key));
    ctx.output.kv("count", &stats.count.to_string());
    if stats.fallback {
        ctx.output.warn("click actor unavailable; figures come from the fallback store");
    }
    for click in &stats.recent_clicks {
        ctx.output.list_item(&format!(
            "{} {} {}",
            click.timestamp.to_rfc3339(),
            click.client_ip.as_deref().unwrap_or("-"),
            click.affiliate_url
        ));
    }
    Ok(())
}
