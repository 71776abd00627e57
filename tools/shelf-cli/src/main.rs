//! Shelf CLI - run and inspect the product aggregation engine.
//!
//! Commands:
//! - `shelf serve` - Start the HTTP server
//! - `shelf config` - Show, validate, or create configuration
//! - `shelf merged` - Fetch a merged product from a running server
//! - `shelf stats` - Fetch click statistics from a running server

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{ConfigArgs, MergedArgs, ServeArgs, StatsArgs};

/// Shelf - product aggregation and affiliate attribution
#[derive(Parser)]
#[command(name = "shelf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "SHELF_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Fetch the merged record for a product key
    Merged(MergedArgs),

    /// Fetch click statistics for a product key (admin)
    Stats(StatsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);
    let ctx = match context::Context::load(cli.config.as_deref(), output.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Merged(args) => commands::merged::run(args, &ctx).await,
        Commands::Stats(args) => commands::stats::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
