//! Shared publish pipeline entrypoint used by the CLI.

use std::path::{Path, PathBuf};

use postalgic_core::{registry, RegistryError, SiteConfig, SiteName, TargetEntry, TargetName};
use postalgic_publish::{ProgressReporter, TargetPublisher};

use crate::orchestrator::{publish_target, PublishOptions, PublishReport};
use crate::SyncError;

/// Which targets of a site a pipeline run publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishScope {
    /// Every configured target, in configuration order.
    AllTargets,
    /// A single named target.
    Target(TargetName),
}

/// Outcome for one target. Targets are independent: a failure on one does
/// not stop the others.
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: TargetName,
    pub outcome: Result<PublishReport, SyncError>,
}

/// Local worktree for Git targets: `~/.postalgic/git/<site>/<target>`.
pub fn git_workdir_at(home: &Path, site: &SiteName, target: &TargetName) -> PathBuf {
    registry::postalgic_root(home)
        .join("git")
        .join(&site.0)
        .join(&target.0)
}

/// Resolve the targets selected by `scope`.
pub fn select_targets<'a>(
    site: &'a SiteConfig,
    scope: &PublishScope,
) -> Result<Vec<&'a TargetEntry>, SyncError> {
    match scope {
        PublishScope::AllTargets => Ok(site.targets.iter().collect()),
        PublishScope::Target(name) => site
            .target(name)
            .map(|entry| vec![entry])
            .ok_or_else(|| {
                RegistryError::TargetNotFound {
                    site: site.name.0.clone(),
                    target: name.0.clone(),
                }
                .into()
            }),
    }
}

/// Publish `site` to the targets selected by `scope`.
pub async fn run(
    home: &Path,
    site: &SiteName,
    scope: PublishScope,
    options: PublishOptions,
    progress: &dyn ProgressReporter,
) -> Result<Vec<TargetOutcome>, SyncError> {
    let config = registry::load_site_at(home, site)?;
    let entries = select_targets(&config, &scope)?;

    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in entries {
        let outcome = publish_entry(home, &config, entry, options, progress).await;
        if let Err(e) = &outcome {
            tracing::error!(site = %config.name, target = %entry.name, error = %e, "publish failed");
        }
        outcomes.push(TargetOutcome {
            target: entry.name.clone(),
            outcome,
        });
    }
    Ok(outcomes)
}

async fn publish_entry(
    home: &Path,
    site: &SiteConfig,
    entry: &TargetEntry,
    options: PublishOptions,
    progress: &dyn ProgressReporter,
) -> Result<PublishReport, SyncError> {
    let workdir = git_workdir_at(home, &site.name, &entry.name);
    let mut publisher = TargetPublisher::from_entry(entry, &site.settings, workdir).await?;
    publish_target(home, site, &entry.name, &mut publisher, options, progress).await
}
