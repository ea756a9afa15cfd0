//! Build output inspection.

use std::path::Path;

use anyhow::{Context as _, Result};
use chrono::Utc;
use ppr_build::{read_manifest, read_shell};
use ppr_core::{PprManifest, StaticShell};

use super::InspectArgs;
use crate::context::Context;
use crate::output::{format_age, format_bytes};

/// Run the inspect command.
pub async fn run(args: InspectArgs, ctx: &Context) -> Result<()> {
    let out_dir = ctx.out_dir(args.dir.as_deref());
    let manifest = read_manifest(&out_dir)
        .await
        .with_context(|| format!("No build found in {}", out_dir.display()))?;

    match args.route {
        Some(route) => inspect_route(&out_dir, &manifest, &route, ctx).await,
        None => inspect_build(&out_dir, &manifest, ctx).await,
    }
}

async fn inspect_build(out_dir: &Path, manifest: &PprManifest, ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(manifest);
        return Ok(());
    }

    ctx.output.header(&format!("Build: {}", out_dir.display()));
    ctx.output.kv("version", &manifest.version);
    ctx.output.kv("built", &format_age(manifest.build_time, Utc::now()));
    if let Some(base_url) = &manifest.base_url {
        ctx.output.kv("base_url", base_url);
    }
    ctx.output.kv("routes", &manifest.len().to_string());
    ctx.output.kv("boundaries", &manifest.total_boundaries().to_string());

    if manifest.is_empty() {
        return Ok(());
    }

    let width = manifest.routes.keys().map(String::len).max().unwrap_or(4).max(4);
    let widths = [width, 10, 16, 10];
    ctx.output.info("");
    ctx.output
        .table_row(&["PATH", "BOUNDARIES", "HASH", "SIZE"], &widths);

    for (path, entry) in &manifest.routes {
        let size = tokio::fs::metadata(out_dir.join(&entry.shell_file))
            .await
            .map(|meta| format_bytes(meta.len()))
            .unwrap_or_else(|_| "missing".to_string());
        let count = entry.boundary_count.to_string();
        ctx.output.table_row(
            &[path.as_str(), count.as_str(), entry.content_hash.as_str(), size.as_str()],
            &widths,
        );
    }

    Ok(())
}

async fn inspect_route(
    out_dir: &Path,
    manifest: &PprManifest,
    route: &str,
    ctx: &Context,
) -> Result<()> {
    if manifest.get(route).is_none() {
        anyhow::bail!("Route {} is not in the manifest", route);
    }
    let shell = read_shell(out_dir, route)
        .await
        .with_context(|| format!("Failed to read shell for {}", route))?;

    if ctx.output.is_json() {
        ctx.output.json(&shell);
        return Ok(());
    }

    ctx.output.header(&format!("Shell: {}", route));
    ctx.output.kv("hash", &shell.content_hash);
    ctx.output.kv("built", &format_age(shell.build_time, Utc::now()));
    ctx.output.kv("size", &format_bytes(shell.html.len() as u64));
    print_assets(&shell, ctx);

    for (priority, group) in shell.priority_groups() {
        ctx.output.info(&format!("priority {}", priority));
        for boundary in group {
            let mut line = format!("{} ({:?})", boundary.id, boundary.kind);
            if !boundary.data_dependencies.is_empty() {
                line.push_str(&format!(" <- {}", boundary.data_dependencies.join(", ")));
            }
            ctx.output.list_item(&line);
        }
    }

    Ok(())
}

fn print_assets(shell: &StaticShell, ctx: &Context) {
    let assets = &shell.assets;
    for (label, list) in [("css", &assets.css), ("js", &assets.js), ("fonts", &assets.fonts)] {
        if !list.is_empty() {
            ctx.output.kv(label, &list.join(", "));
        }
    }
    if assets.inline_css.is_some() {
        ctx.output.kv("inline css", "yes");
    }
}
