//! PPR CLI - Command line tool for partial-prerendering builds and caches.
//!
//! Commands:
//! - `ppr inspect` - Summarize a build output directory
//! - `ppr verify` - Re-hash and validate every shell in a build
//! - `ppr purge` - Invalidate entries in a disk shell cache
//! - `ppr config` - Manage configuration

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ppr_observability::LogFormat;

use commands::{ConfigArgs, InspectArgs, PurgeArgs, VerifyArgs};

/// PPR CLI - Inspect, verify and purge prerendered shells
#[derive(Parser)]
#[command(name = "ppr")]
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
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a build output directory
    Inspect(InspectArgs),

    /// Check every shell against its hash and boundary table
    Verify(VerifyArgs),

    /// Invalidate entries in a disk shell cache
    Purge(PurgeArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = match context::Context::load(config_path, output.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let logging = &ctx.config.logging;
    let level = if cli.verbose { "debug" } else { logging.level.as_str() };
    let format = if cli.json { LogFormat::Json } else { logging.format };
    ppr_observability::init_tracing(format, level);
    if let Some(path) = &ctx.config_path {
        tracing::debug!(config = %path.display(), "Loaded config");
    }

    // Execute command
    let result = match cli.command {
        Commands::Inspect(args) => commands::inspect::run(args, &ctx).await,
        Commands::Verify(args) => commands::verify::run(args, &ctx).await,
        Commands::Purge(args) => commands::purge::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
