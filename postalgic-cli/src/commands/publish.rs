//! `postalgic publish` — transfer what changed to every target of a site.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use postalgic_core::{SiteName, TargetName};
use postalgic_sync::{
    pipeline::{self, PublishScope},
    BaselineSource, PublishOptions, PublishReport,
};

/// Arguments for `postalgic publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Site to publish.
    pub site: String,

    /// Publish to this target only (default: every target).
    #[arg(long, short = 't')]
    pub target: Option<String>,

    /// Ignore the remote hash record and compare against a listing of the target.
    #[arg(long)]
    pub full: bool,

    /// Show what would be uploaded and deleted without transferring anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl PublishArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let site = SiteName::from(self.site);
        let scope = match self.target {
            Some(name) => PublishScope::Target(TargetName::from(name)),
            None => PublishScope::AllTargets,
        };
        let options = PublishOptions {
            force_full: self.full,
            dry_run: self.dry_run,
        };

        tracing::debug!(site = %site, ?scope, ?options, "starting publish");
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let progress = |step: usize, total: usize, description: &str| {
            println!("  [{step}/{total}] {description}");
        };
        let outcomes = runtime
            .block_on(pipeline::run(&home, &site, scope, options, &progress))
            .with_context(|| format!("publish failed for '{site}'"))?;

        if outcomes.is_empty() {
            println!("Site '{site}' has no targets. Run 'postalgic target add {site} <name> ...'.");
            return Ok(());
        }

        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome.outcome {
                Ok(report) => print_report(&report),
                Err(e) => {
                    println!("{} {}: {e:#}", "✗".red().bold(), outcome.target);
                    failed.push(outcome.target.0);
                }
            }
        }
        if !failed.is_empty() {
            bail!("publish failed for target(s): {}", failed.join(", "));
        }
        Ok(())
    }
}

fn print_report(report: &PublishReport) {
    let baseline = match &report.previous_source {
        BaselineSource::RemoteRecord { published_by, .. } => {
            format!("against record from {published_by}")
        }
        BaselineSource::Listing => "against remote listing".to_string(),
        BaselineSource::Forced => "full resync".to_string(),
    };

    let Some(result) = &report.result else {
        println!(
            "[dry-run] {}: {} to upload, {} to delete ({baseline})",
            report.target,
            report.changes.modified.len(),
            report.changes.deleted.len(),
        );
        for path in &report.changes.modified {
            println!("  + {path}");
        }
        for path in &report.changes.deleted {
            println!("  - {path}");
        }
        print_suppressed(&report.changes.suppressed);
        return;
    };

    if !result.changed {
        println!("{} {}: already up to date ({baseline})", "✓".green(), report.target);
        print_suppressed(&report.changes.suppressed);
        return;
    }

    println!(
        "{} {}: {} uploaded, {} deleted, {} unchanged ({baseline})",
        "✓".green().bold(),
        report.target,
        result.uploaded,
        result.deleted,
        result.untouched(),
    );
    if let Some(committed) = result.committed {
        if !committed {
            println!("  nothing to commit");
        }
    }
    if !result.invalidated.is_empty() {
        println!("  invalidated: {}", result.invalidated.join(", "));
    }
    if let Some(artifact) = &result.artifact {
        println!("  wrote {}", artifact.display());
    }
}

fn print_suppressed(files: &[String]) {
    if !files.is_empty() {
        println!("  skipped feed-only changes: {}", files.join(", "));
    }
}
