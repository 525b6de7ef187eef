//! The Publisher protocol shared by every hosting target.
//!
//! A target implements [`Publisher`]; the transfer sequence itself (connect,
//! resolve the change set, short-circuit no-ops, apply) lives in [`publish`]
//! and is shared by every variant, as is the [`full_resync`] fallback.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use postalgic_core::{
    diff_with, ChangeSet, FileManifest, RemoteHashRecord, SuppressionRule, CONTROL_DIR,
};

use crate::error::{io_err, PublishError, PublishFailure};
use crate::phase::PublishPhase;
use crate::progress::ProgressReporter;
use crate::result::PublishResult;

/// Hash placed in listings for remote files whose content is unknown, so
/// every current file compares as modified.
pub const UNKNOWN_HASH: &str = "";

/// What a target can do beyond plain upload/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The target stores the control file and can return it.
    pub remote_hashes: bool,
    /// The target can enumerate its current files for a full resync.
    pub remote_listing: bool,
    /// All changes land atomically (one commit).
    pub transactional: bool,
}

/// Input to one publish.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    /// Generated site directory.
    pub site_dir: &'a Path,
    /// Manifest of `site_dir`.
    pub manifest: &'a FileManifest,
    /// Precomputed change set; `None` asks the target for a full resync.
    pub changes: Option<&'a ChangeSet>,
    /// Control file to write as part of the publish, if any.
    pub record: Option<&'a RemoteHashRecord>,
    pub suppression: &'a SuppressionRule,
}

/// A fully resolved transfer handed to [`Publisher::apply`].
#[derive(Debug, Clone, Copy)]
pub struct TransferPlan<'a> {
    pub site_dir: &'a Path,
    pub manifest: &'a FileManifest,
    pub changes: &'a ChangeSet,
    pub record: Option<&'a RemoteHashRecord>,
}

/// One hosting target.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Human-readable target description for logs and errors.
    fn describe(&self) -> String;

    fn capabilities(&self) -> Capabilities;

    /// Open the connection. Must be idempotent.
    async fn connect(&mut self) -> Result<(), PublishError>;

    /// Read the control file. `Ok(None)` when absent or unsupported.
    async fn fetch_remote_hashes(&mut self) -> Result<Option<RemoteHashRecord>, PublishError>;

    /// Current remote files, hashed when the target can do so cheaply and
    /// [`UNKNOWN_HASH`] otherwise. Only called when `remote_listing` is set.
    async fn list_remote(&mut self) -> Result<FileManifest, PublishError>;

    /// Upload `plan.changes.modified`, delete `plan.changes.deleted`, write
    /// the control file and finalize. Never called with an empty change set.
    async fn apply(
        &mut self,
        plan: TransferPlan<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<PublishResult, PublishFailure>;
}

/// Run one publish against `publisher`.
///
/// Without a precomputed change set the target is listed and diffed
/// ([`full_resync`]). An empty change set returns a no-op result without
/// any transfer.
pub async fn publish<P: Publisher>(
    publisher: &mut P,
    request: PublishRequest<'_>,
    progress: &dyn ProgressReporter,
) -> Result<PublishResult, PublishFailure> {
    publisher
        .connect()
        .await
        .map_err(|e| PublishFailure::before_transfer(PublishPhase::Connecting, e))?;

    let changes = match request.changes {
        Some(changes) => Cow::Borrowed(changes),
        None => Cow::Owned(
            full_resync(publisher, request.manifest, request.suppression)
                .await
                .map_err(|e| PublishFailure::before_transfer(PublishPhase::Diffing, e))?,
        ),
    };

    if changes.is_empty() {
        tracing::info!(target_name = %publisher.describe(), "no changes to publish");
        return Ok(PublishResult::no_op(request.manifest.len()));
    }

    tracing::info!(
        target_name = %publisher.describe(),
        modified = changes.modified.len(),
        deleted = changes.deleted.len(),
        "publishing changes"
    );
    publisher
        .apply(
            TransferPlan {
                site_dir: request.site_dir,
                manifest: request.manifest,
                changes: &changes,
                record: request.record,
            },
            progress,
        )
        .await
}

/// Diff `current` against whatever the target currently holds.
///
/// Targets without listing are treated as empty: everything is uploaded,
/// nothing is deleted.
pub async fn full_resync<P: Publisher>(
    publisher: &mut P,
    current: &FileManifest,
    suppression: &SuppressionRule,
) -> Result<ChangeSet, PublishError> {
    let mut remote = if publisher.capabilities().remote_listing {
        publisher.list_remote().await?
    } else {
        FileManifest::new()
    };
    let control_prefix = format!("{CONTROL_DIR}/");
    let control: Vec<String> = remote
        .paths()
        .filter(|p| p.starts_with(&control_prefix))
        .map(str::to_string)
        .collect();
    for path in control {
        remote.remove(&path);
    }
    Ok(diff_with(&remote, current, suppression))
}

/// Local path of output `key` inside `site_dir`.
pub(crate) fn site_path(site_dir: &Path, key: &str) -> PathBuf {
    key.split('/').fold(site_dir.to_path_buf(), |acc, part| acc.join(part))
}

pub(crate) async fn read_site_file(site_dir: &Path, key: &str) -> Result<Vec<u8>, PublishError> {
    let path = site_path(site_dir, key);
    tokio::fs::read(&path).await.map_err(|e| io_err(path, e))
}
