//! Git repository target: the site is mirrored into a local worktree and
//! published as a single commit.
//!
//! The worktree is the staging area, so listing and the control file are
//! read from it after [`GitBackend::checkout`] has synced it with the remote
//! branch.

mod cli;

pub use cli::GitCli;

use std::path::{Path, PathBuf};

use postalgic_core::{hash_site, FileManifest, GitConfig, RemoteHashRecord, CONTROL_FILE_PATH};

use crate::error::{io_err, PublishError, PublishFailure};
use crate::phase::PublishPhase;
use crate::progress::{ProgressReporter, StepCounter};
use crate::publisher::{site_path, Capabilities, Publisher, TransferPlan};
use crate::result::PublishResult;

/// Version-control operations on a local worktree.
#[allow(async_fn_in_trait)]
pub trait GitBackend {
    /// Make `workdir` a clean checkout of the configured branch, creating an
    /// empty orphan branch when the remote does not have it yet.
    async fn checkout(&mut self, workdir: &Path, config: &GitConfig) -> Result<(), PublishError>;

    /// Stage everything and commit. `Ok(false)` when the worktree had no
    /// changes and no commit was made.
    async fn commit_all(
        &mut self,
        workdir: &Path,
        config: &GitConfig,
        message: &str,
    ) -> Result<bool, PublishError>;

    async fn push(&mut self, workdir: &Path, config: &GitConfig) -> Result<(), PublishError>;
}

pub fn commit_message(uploaded: usize, deleted: usize) -> String {
    format!("Publish {uploaded} changed, {deleted} deleted files")
}

pub struct GitPublisher<B> {
    backend: B,
    config: GitConfig,
    workdir: PathBuf,
    include_hidden: Vec<String>,
    checked_out: bool,
}

impl<B: GitBackend> GitPublisher<B> {
    pub fn new(backend: B, config: GitConfig, workdir: PathBuf, include_hidden: Vec<String>) -> Self {
        Self {
            backend,
            config,
            workdir,
            include_hidden,
            checked_out: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn stage(
        &self,
        plan: &TransferPlan<'_>,
        steps: &mut StepCounter<'_>,
        result: &mut PublishResult,
    ) -> Result<(), PublishError> {
        for key in &plan.changes.modified {
            let from = site_path(plan.site_dir, key);
            let to = site_path(&self.workdir, key);
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_err(parent, e))?;
            }
            tokio::fs::copy(&from, &to).await.map_err(|e| io_err(&from, e))?;
            result.uploaded += 1;
            steps.advance(&format!("staged {key}"));
        }
        for key in &plan.changes.deleted {
            let path = site_path(&self.workdir, key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => prune_empty_parents(&self.workdir, &path).await,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(path, e)),
            }
            result.deleted += 1;
            steps.advance(&format!("removed {key}"));
        }
        Ok(())
    }
}

/// Remove directories left empty by a deletion, stopping at `root`.
async fn prune_empty_parents(root: &Path, file: &Path) {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        // Fails on non-empty directories, which ends the walk.
        if tokio::fs::remove_dir(current).await.is_err() {
            break;
        }
        dir = current.parent();
    }
}

impl<B: GitBackend> Publisher for GitPublisher<B> {
    fn describe(&self) -> String {
        format!("{}#{}", self.config.repository_url, self.config.branch)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            remote_hashes: true,
            remote_listing: true,
            transactional: true,
        }
    }

    async fn connect(&mut self) -> Result<(), PublishError> {
        if !self.checked_out {
            tokio::fs::create_dir_all(&self.workdir)
                .await
                .map_err(|e| io_err(&self.workdir, e))?;
            self.backend.checkout(&self.workdir, &self.config).await?;
            self.checked_out = true;
        }
        Ok(())
    }

    async fn fetch_remote_hashes(&mut self) -> Result<Option<RemoteHashRecord>, PublishError> {
        let path = site_path(&self.workdir, CONTROL_FILE_PATH);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(RemoteHashRecord::from_json_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(path, e)),
        }
    }

    async fn list_remote(&mut self) -> Result<FileManifest, PublishError> {
        Ok(hash_site(&self.workdir, &self.include_hidden)?)
    }

    async fn apply(
        &mut self,
        plan: TransferPlan<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<PublishResult, PublishFailure> {
        // staging + control file + commit + push
        let mut steps = StepCounter::new(progress, plan.changes.len() + 3);
        let mut result = PublishResult {
            total: plan.manifest.len(),
            changed: true,
            ..PublishResult::default()
        };

        if let Err(error) = self.stage(&plan, &mut steps, &mut result).await {
            let remaining = plan.changes.len() - result.uploaded - result.deleted;
            return Err(PublishFailure::new(
                PublishPhase::Transferring,
                result,
                remaining,
                error,
            ));
        }

        if let Some(record) = plan.record {
            if let Err(error) = write_control_file(&self.workdir, record).await {
                return Err(PublishFailure::new(PublishPhase::Finalizing, result, 0, error));
            }
            steps.advance("wrote control file");
        }

        let message = commit_message(result.uploaded, result.deleted);
        let committed = match self
            .backend
            .commit_all(&self.workdir, &self.config, &message)
            .await
        {
            Ok(committed) => committed,
            Err(error) => {
                return Err(PublishFailure::new(PublishPhase::Finalizing, result, 0, error))
            }
        };
        result.committed = Some(committed);
        steps.advance(if committed { "committed" } else { "nothing to commit" });

        if committed {
            if let Err(error) = self.backend.push(&self.workdir, &self.config).await {
                return Err(PublishFailure::new(PublishPhase::Finalizing, result, 0, error));
            }
            steps.advance("pushed");
        } else {
            tracing::info!(target_name = %self.describe(), "worktree unchanged, skipping commit");
        }

        Ok(result)
    }
}

async fn write_control_file(workdir: &Path, record: &RemoteHashRecord) -> Result<(), PublishError> {
    let path = site_path(workdir, CONTROL_FILE_PATH);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    let bytes = record.to_json_bytes()?;
    tokio::fs::write(&path, bytes).await.map_err(|e| io_err(path, e))
}
