//! Configuration management commands.

use anyhow::{bail, Context as _, Result};
use shelf_core::ShelfConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Validate => validate_config(ctx),
        ConfigCommand::Init { force } => init_config(force, ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    // Secrets are skipped when serializing.
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    let config = &ctx.config;
    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    ctx.output.info("[server]");
    ctx.output.kv("bind", &config.server.bind);
    ctx.output.kv("request_timeout_ms", &config.server.request_timeout_ms.to_string());

    ctx.output.info("[cache]");
    ctx.output.kv("merged_ttl_secs", &config.cache.merged_ttl_secs.to_string());
    ctx.output.kv("sweep_interval_secs", &config.cache.sweep_interval_secs.to_string());

    ctx.output.info("[clicks]");
    ctx.output.kv("actor_timeout_ms", &config.clicks.actor_timeout_ms.to_string());
    ctx.output.kv("recent_limit", &config.clicks.recent_limit.to_string());

    ctx.output.info("[openfood]");
    ctx.output.kv("base_url", &config.openfood.base_url);

    ctx.output.info("[marketplace]");
    ctx.output.kv("base_url", &config.marketplace.base_url);
    ctx.output.kv("marketplace_id", &config.marketplace.marketplace_id);
    ctx.output.kv("credentials", set_or_missing(config.marketplace.has_credentials()));
    if let Some(campaign) = &config.marketplace.campaign_id {
        ctx.output.kv("campaign_id", campaign);
    }

    ctx.output.info("[nutrition]");
    ctx.output.kv("base_url", &config.nutrition.base_url);
    ctx.output.kv("api_key", set_or_missing(config.nutrition.api_key.is_some()));
    ctx.output.kv("hourly_ceiling", &config.nutrition.hourly_ceiling.to_string());

    ctx.output.info("[admin]");
    ctx.output.kv("token", set_or_missing(config.admin.enabled()));

    ctx.output.info("[logging]");
    ctx.output.kv("format", &config.logging.format.to_string());
    ctx.output.kv("filter", &config.logging.filter);
    Ok(())
}

fn set_or_missing(present: bool) -> &'static str {
    if present {
        "set"
    } else {
        "missing"
    }
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    if let Err(e) = ctx.config.validate() {
        bail!("{e}");
    }

    let warnings = warnings(&ctx.config);
    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {warning}"));
    }
    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }
    Ok(())
}

/// Settings that are legal but leave part of the engine degraded.
fn warnings(config: &ShelfConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.admin.enabled() {
        warnings.push("admin.token is not set; admin routes are disabled".to_string());
    }
    if !config.marketplace.has_credentials() {
        warnings.push("marketplace credentials missing; offers will be unavailable".to_string());
    }
    if config.nutrition.api_key.is_none() {
        warnings.push("nutrition.api_key missing; nutrition search will be unavailable".to_string());
    }
    if config.nutrition.hourly_ceiling >= 1_000 {
        warnings.push(format!(
            "nutrition.hourly_ceiling {} meets or exceeds the upstream quota of 1000/h",
            config.nutrition.hourly_ceiling
        ));
    }
    warnings
}

fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let path = ctx.cwd.join("shelf.toml");
    if path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    let content = toml::to_string_pretty(&ShelfConfig::default()).context("Failed to render config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    ctx.output.success(&format!("Created: {}", path.display()));
    Ok(())
}
