//! Offline publish status: the output directory against the local hash store.
//!
//! Signal precedence:
//! 1. `NeverPublished` (no local record for the target)
//! 2. `Pending` (real changes would be published)
//! 3. `Suppressed` (only non-essential files changed)
//! 4. `Current`
//!
//! The local record mirrors the last publish made or observed by this
//! client; another client may have published since.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use postalgic_core::{
    diff_with, hash_site, ChangeSet, ClientId, SiteConfig, SuppressionRule, TargetName,
};

use crate::{hash_store, SyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PublishStatus {
    NeverPublished,
    Current {
        last_published: DateTime<Utc>,
        published_by: ClientId,
    },
    Suppressed {
        files: Vec<String>,
    },
    Pending {
        changes: ChangeSet,
    },
}

impl PublishStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PublishStatus::NeverPublished => "never published",
            PublishStatus::Current { .. } => "current",
            PublishStatus::Suppressed { .. } => "feed only",
            PublishStatus::Pending { .. } => "pending",
        }
    }
}

/// Classify `target` of `site`.
pub fn check(
    home: &Path,
    site: &SiteConfig,
    target: &TargetName,
) -> Result<PublishStatus, SyncError> {
    let Some((last_published, published_by, changes)) = pending_changes(home, site, target)? else {
        return Ok(PublishStatus::NeverPublished);
    };
    let status = if !changes.is_empty() {
        PublishStatus::Pending { changes }
    } else if !changes.suppressed.is_empty() {
        PublishStatus::Suppressed {
            files: changes.suppressed,
        }
    } else {
        PublishStatus::Current {
            last_published,
            published_by,
        }
    };
    Ok(status)
}

/// Change set the next publish would compute from the local record, or
/// `None` when nothing was published to `target` from this client.
pub fn local_diff(
    home: &Path,
    site: &SiteConfig,
    target: &TargetName,
) -> Result<Option<ChangeSet>, SyncError> {
    Ok(pending_changes(home, site, target)?.map(|(_, _, changes)| changes))
}

fn pending_changes(
    home: &Path,
    site: &SiteConfig,
    target: &TargetName,
) -> Result<Option<(DateTime<Utc>, ClientId, ChangeSet)>, SyncError> {
    let Some(record) = hash_store::load_at(home, &site.name, target)? else {
        return Ok(None);
    };
    let manifest = hash_site(&site.output_dir, &site.settings.include_hidden)?;
    let rule = SuppressionRule::from_settings(&site.settings);
    let changes = diff_with(&record.file_hashes, &manifest, &rule);
    Ok(Some((record.last_published_date, record.published_by, changes)))
}

/// Format age from a chrono timestamp (record `lastPublishedDate`).
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let now = Utc::now();
    let age = now.signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_seconds(age)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
