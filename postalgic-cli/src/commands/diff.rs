//! `postalgic diff <site>` — list what the next publish would transfer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use postalgic_core::{registry, SiteName, TargetName};
use postalgic_sync::{
    pipeline::{select_targets, PublishScope},
    status::local_diff,
};

/// Arguments for `postalgic diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Site to diff.
    pub site: String,

    /// Diff this target only (default: every target).
    #[arg(long, short = 't')]
    pub target: Option<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let site = registry::load_site_at(&home, &SiteName::from(self.site.clone()))
            .with_context(|| format!("failed to load site '{}'", self.site))?;
        let scope = match self.target {
            Some(name) => PublishScope::Target(TargetName::from(name)),
            None => PublishScope::AllTargets,
        };

        let targets = select_targets(&site, &scope)?;
        if targets.is_empty() {
            println!("Site '{}' has no targets.", site.name);
            return Ok(());
        }

        for entry in targets {
            let changes = local_diff(&home, &site, &entry.name)
                .with_context(|| format!("diff failed for target '{}'", entry.name))?;
            let Some(changes) = changes else {
                println!("{}: never published from this machine (next publish uploads everything)", entry.name);
                continue;
            };
            if changes.is_empty() {
                println!("No differences for '{}'.", entry.name);
            } else {
                println!("{}:", entry.name);
                for path in &changes.modified {
                    println!("  + {path}");
                }
                for path in &changes.deleted {
                    println!("  - {path}");
                }
            }
            for path in &changes.suppressed {
                println!("  ~ {path} (suppressed)");
            }
        }

        Ok(())
    }
}
