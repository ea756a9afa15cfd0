//! Build output verification.

use std::path::Path;

use anyhow::{bail, Context as _, Result};
use ppr_build::{read_manifest, read_shell};
use ppr_core::{content_hash, ManifestEntry, StaticShell};
use serde::Serialize;

use super::VerifyArgs;
use crate::context::Context;

/// One problem found in a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub path: String,
    pub problem: String,
}

/// Result of checking every route in a manifest.
#[derive(Debug, Default, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    fn flag(&mut self, path: &str, problem: impl Into<String>) {
        self.findings.push(Finding {
            path: path.to_string(),
            problem: problem.into(),
        });
    }
}

/// Run the verify command.
pub async fn run(args: VerifyArgs, ctx: &Context) -> Result<()> {
    let out_dir = ctx.out_dir(args.dir.as_deref());
    let report = verify_build(&out_dir, |total| ctx.output.progress(total, "Verifying shells"))
        .await?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        for finding in &report.findings {
            ctx.output.warn(&format!("{}: {}", finding.path, finding.problem));
        }
    }

    if !report.findings.is_empty() {
        bail!(
            "{} problem(s) in {} shell(s)",
            report.findings.len(),
            report.checked
        );
    }

    ctx.output
        .success(&format!("{} shell(s) verified", report.checked));
    Ok(())
}

/// Check every shell listed in the manifest under `out_dir`.
///
/// `progress` receives the route count and returns the bar to advance.
pub async fn verify_build(
    out_dir: &Path,
    progress: impl FnOnce(u64) -> indicatif::ProgressBar,
) -> Result<VerifyReport> {
    let manifest = read_manifest(out_dir)
        .await
        .with_context(|| format!("No build found in {}", out_dir.display()))?;

    let bar = progress(manifest.len() as u64);
    let mut report = VerifyReport::default();

    for (path, entry) in &manifest.routes {
        bar.set_message(path.clone());
        report.checked += 1;

        match read_shell(out_dir, path).await {
            Ok(shell) => check_shell(path, entry, &shell, &mut report),
            Err(e) => report.flag(path, format!("unreadable: {}", e)),
        }
        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(report)
}

fn check_shell(path: &str, entry: &ManifestEntry, shell: &StaticShell, report: &mut VerifyReport) {
    if shell.path != path {
        report.flag(path, format!("metadata names path {}", shell.path));
    }

    let actual = content_hash(&shell.html);
    if actual != shell.content_hash {
        report.flag(
            path,
            format!("markup hash {} does not match recorded {}", actual, shell.content_hash),
        );
    }
    if entry.content_hash != shell.content_hash {
        report.flag(
            path,
            format!("manifest hash {} does not match shell {}", entry.content_hash, shell.content_hash),
        );
    }

    if entry.boundary_count != shell.boundary_count() {
        report.flag(
            path,
            format!(
                "manifest lists {} boundaries, shell has {}",
                entry.boundary_count,
                shell.boundary_count()
            ),
        );
    }

    if let Err(e) = shell.validate() {
        report.flag(path, e.to_string());
    }
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressBar;
    use ppr_build::{write_manifest, write_shell};
    use ppr_core::{
        shell_file_name, wrap_boundary, DynamicBoundaryMetadata, PprManifest, ShellAssets,
    };
    use tempfile::TempDir;

    use super::*;

    fn shell(path: &str) -> StaticShell {
        StaticShell::new(
            path,
            format!("<h1>{}</h1>{}", path, wrap_boundary("cart", None)),
            [DynamicBoundaryMetadata::new("cart")],
            ShellAssets::default(),
        )
    }

    async fn write_build(dir: &Path, shells: &[StaticShell]) {
        for shell in shells {
            write_shell(dir, shell).await.unwrap();
        }
        write_manifest(dir, &PprManifest::from_shells("test", shells))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clean_build_passes() {
        let dir = TempDir::new().unwrap();
        write_build(dir.path(), &[shell("/"), shell("/about")]).await;

        let report = verify_build(dir.path(), |_| ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(report.checked, 2);
        assert!(report.findings.is_empty());
    }

    #[tokio::test]
    async fn test_edited_markup_is_flagged() {
        let dir = TempDir::new().unwrap();
        write_build(dir.path(), &[shell("/"), shell("/about")]).await;

        // Hand edit that also drops the boundary's end marker.
        let file = dir.path().join(shell_file_name("/about"));
        std::fs::write(&file, "<h1>edited</h1><!--ppr:start:cart-->").unwrap();

        let report = verify_build(dir.path(), |_| ProgressBar::hidden())
            .await
            .unwrap();
        let problems: Vec<&str> = report
            .findings
            .iter()
            .map(|f| f.problem.as_str())
            .collect();

        assert!(report.findings.iter().all(|f| f.path == "/about"));
        assert!(problems.iter().any(|p| p.starts_with("markup hash")));
        assert!(problems.iter().any(|p| p.contains("missing end marker")));
    }

    #[tokio::test]
    async fn test_missing_shell_is_flagged() {
        let dir = TempDir::new().unwrap();
        write_build(dir.path(), &[shell("/")]).await;
        std::fs::remove_file(dir.path().join(shell_file_name("/"))).unwrap();

        let report = verify_build(dir.path(), |_| ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(report.findings.len(), 1);
        assert!(report.findings[0].problem.starts_with("unreadable"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(verify_build(dir.path(), |_| ProgressBar::hidden())
            .await
            .is_err());
    }
}
