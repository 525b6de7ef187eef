//! Publish one site to one target.
//!
//! hash → connect → fetch control file → diff → publish → persist. The
//! orchestrator is the only writer of hash state: the local store is updated
//! after a successful publish and left untouched on failure, so a retry
//! recomputes the same change set.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use postalgic_core::{
    diff_with, hash_site, registry, ChangeSet, ClientId, RemoteHashRecord, SiteConfig, SiteName,
    SuppressionRule, TargetName,
};
use postalgic_publish::{
    full_resync, publish, ProgressReporter, PublishFailure, PublishPhase, PublishRequest,
    PublishResult, Publisher, StepCounter,
};

use crate::{hash_store, remote, SyncError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Ignore the control file and diff against a listing of the target.
    pub force_full: bool,
    /// Compute and report the change set without transferring or saving.
    pub dry_run: bool,
}

/// Where the baseline manifest of a publish came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaselineSource {
    /// The target's control file.
    RemoteRecord {
        published_by: ClientId,
        last_published_date: DateTime<Utc>,
    },
    /// No usable control file; the target was listed instead.
    Listing,
    /// `force_full` was requested.
    Forced,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub site: SiteName,
    pub target: TargetName,
    pub changes: ChangeSet,
    /// `None` for dry runs.
    pub result: Option<PublishResult>,
    pub previous_source: BaselineSource,
}

impl PublishReport {
    pub fn is_dry_run(&self) -> bool {
        self.result.is_none()
    }
}

/// Steps reported before the publisher takes over: hash, connect, fetch, diff.
const PREPARE_STEPS: usize = 4;

/// Publish `site` to `target` through `publisher`. The preparation phases
/// are reported as their own numbered steps, followed by the publisher's
/// per-file steps.
pub async fn publish_target<P: Publisher>(
    home: &Path,
    site: &SiteConfig,
    target: &TargetName,
    publisher: &mut P,
    options: PublishOptions,
    progress: &dyn ProgressReporter,
) -> Result<PublishReport, SyncError> {
    let mut phases = StepCounter::new(progress, PREPARE_STEPS);
    phases.advance("hashing site");
    let manifest = hash_site(&site.output_dir, &site.settings.include_hidden)?;
    let client = registry::effective_client_id_at(home, site)?;
    let rule = SuppressionRule::from_settings(&site.settings);
    tracing::info!(site = %site.name, target = %target, files = manifest.len(), "hashed site");

    phases.advance(&format!("connecting to {}", publisher.describe()));
    publisher
        .connect()
        .await
        .map_err(|e| PublishFailure::before_transfer(PublishPhase::Connecting, e))?;

    let remote_record = if options.force_full {
        phases.advance("skipping remote hash record");
        None
    } else {
        phases.advance("fetching remote hash record");
        remote::fetch_record(publisher).await
    };
    phases.advance("computing changes");
    let (changes, previous_source) = match &remote_record {
        Some(record) => (
            diff_with(&record.file_hashes, &manifest, &rule),
            BaselineSource::RemoteRecord {
                published_by: record.published_by.clone(),
                last_published_date: record.last_published_date,
            },
        ),
        None => {
            let changes = full_resync(publisher, &manifest, &rule)
                .await
                .map_err(|e| PublishFailure::before_transfer(PublishPhase::Diffing, e))?;
            let source = if options.force_full {
                BaselineSource::Forced
            } else {
                BaselineSource::Listing
            };
            (changes, source)
        }
    };
    tracing::info!(
        site = %site.name,
        target = %target,
        modified = changes.modified.len(),
        deleted = changes.deleted.len(),
        suppressed = changes.suppressed.len(),
        "computed change set"
    );

    if options.dry_run {
        return Ok(PublishReport {
            site: site.name.clone(),
            target: target.clone(),
            changes,
            result: None,
            previous_source,
        });
    }

    let record = RemoteHashRecord::new(manifest, client);
    let result = publish(
        publisher,
        PublishRequest {
            site_dir: &site.output_dir,
            manifest: &record.file_hashes,
            changes: Some(&changes),
            record: Some(&record),
            suppression: &rule,
        },
        progress,
    )
    .await?;

    // A no-op leaves the remote as it was: cache what it holds.
    let stored = match remote_record {
        Some(fetched) if !result.changed => fetched,
        _ => record,
    };
    hash_store::save_at(home, &site.name, target, &stored)?;

    tracing::info!(
        site = %site.name,
        target = %target,
        uploaded = result.uploaded,
        deleted = result.deleted,
        changed = result.changed,
        "publish complete"
    );
    Ok(PublishReport {
        site: site.name.clone(),
        target: target.clone(),
        changes,
        result: Some(result),
        previous_source,
    })
}
