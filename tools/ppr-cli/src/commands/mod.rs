//! CLI command implementations.

pub mod config;
pub mod inspect;
pub mod purge;
pub mod verify;

use clap::{ArgGroup, Args, Subcommand};

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Build output directory (default: build.out_dir).
    pub dir: Option<String>,

    /// Show the boundary table of one route.
    #[arg(short, long)]
    pub route: Option<String>,
}

/// Arguments for the verify command.
#[derive(Args)]
pub struct VerifyArgs {
    /// Build output directory (default: build.out_dir).
    pub dir: Option<String>,
}

/// Arguments for the purge command.
#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["path", "pattern", "all"])))]
pub struct PurgeArgs {
    /// Disk cache directory (default: cache.dir of a disk backend).
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Invalidate a single path.
    #[arg(long)]
    pub path: Option<String>,

    /// Invalidate every path matching a glob (`*`, `?`).
    #[arg(long)]
    pub pattern: Option<String>,

    /// Invalidate every entry.
    #[arg(long)]
    pub all: bool,

    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,

        /// Write ppr.json instead of ppr.toml.
        #[arg(long = "as-json")]
        as_json: bool,
    },
    /// Validate the config file.
    Validate,
}
