//! Configuration management commands.

use anyhow::{bail, Result};
use ppr_cache::{CacheBackendConfig, CacheStrategy};
use ppr_sdk::{generate_default_config, PprConfig};

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { force, as_json } => init_config(force, as_json, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("source", &path.display().to_string()),
        None => ctx.output.kv("source", "defaults (no config file found)"),
    }
    println!();
    print!("{}", toml::to_string_pretty(&ctx.config)?);

    Ok(())
}

fn init_config(force: bool, as_json: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx
        .cwd
        .join(if as_json { "ppr.json" } else { "ppr.toml" });

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    if as_json {
        PprConfig::default().save(&config_path)?;
    } else {
        std::fs::write(&config_path, generate_default_config())?;
    }

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let errors = ctx.config.validate();
    let warnings = warnings(&ctx.config);

    // Print results
    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

/// Settings that work but are probably not what was intended.
fn warnings(config: &PprConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if matches!(config.cache, CacheBackendConfig::Kv { .. }) {
        warnings.push("cache.type = \"kv\" needs a store supplied by the host application".to_string());
    }

    if config.edge.strategy == CacheStrategy::CacheOnly
        && matches!(config.cache, CacheBackendConfig::Memory | CacheBackendConfig::Lru { .. })
    {
        warnings.push(
            "edge.strategy = \"cache-only\" with an in-process cache serves nothing until primed"
                .to_string(),
        );
    }

    if config.stream.boundary_timeout_ms > 60_000 {
        warnings.push(format!(
            "stream.boundary_timeout_ms = {} holds responses open for over a minute",
            config.stream.boundary_timeout_ms
        ));
    }

    if let Some(base_url) = &config.build.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            warnings.push(format!("build.base_url '{}' is not an http(s) URL", base_url));
        }
    }

    warnings
}
