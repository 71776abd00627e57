//! CLI command implementations.

pub mod config;
pub mod merged;
pub mod serve;
pub mod stats;

use clap::{Args, Subcommand};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Socket address to bind (overrides `server.bind`).
    #[arg(short, long, env = "SHELF_BIND")]
    pub bind: Option<String>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Validate the effective configuration.
    Validate,
    /// Write a default `shelf.toml` in the current directory.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the merged command.
#[derive(Args)]
pub struct MergedArgs {
    /// Product key (barcode).
    pub key: String,

    /// Bypass the cached snapshot.
    #[arg(short, long)]
    pub force_refresh: bool,

    /// Server base URL (default: derived from `server.bind`).
    #[arg(short, long)]
    pub server: Option<String>,
}

/// Arguments for the stats command.
#[derive(Args)]
pub struct StatsArgs {
    /// Product key (barcode).
    pub key: String,

    /// Server base URL (default: derived from `server.bind`).
    #[arg(short, long)]
    pub server: Option<String>,
}

/// Base URL of a local server listening on `bind`.
pub fn server_url(bind: &str) -> String {
    let (host, port) = bind.rsplit_once(':').unwrap_or((bind, "80"));
    let host = match host {
        "" | "0.0.0.0" | "[::]" => "127.0.0.1",
        other => other,
    };
    format!("http://{host}:{port}")
}
