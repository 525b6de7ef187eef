//! Concrete publisher for a configured target.

use std::path::PathBuf;

use postalgic_core::{FileManifest, PublishSettings, RemoteHashRecord, TargetConfig, TargetEntry};

use crate::archive::ArchivePublisher;
use crate::error::{PublishError, PublishFailure};
use crate::git::{GitCli, GitPublisher};
use crate::object_store::{CloudFrontCache, ObjectStorePublisher, S3Store};
use crate::progress::ProgressReporter;
use crate::publisher::{Capabilities, Publisher, TransferPlan};
use crate::result::PublishResult;
use crate::sftp::{SftpPublisher, Ssh2Transport};

/// One of the production publishers, chosen by [`TargetConfig`].
pub enum TargetPublisher {
    ObjectStore(ObjectStorePublisher<S3Store, CloudFrontCache>),
    Git(GitPublisher<GitCli>),
    Sftp(SftpPublisher<Ssh2Transport>),
    LocalArchive(ArchivePublisher),
}

impl TargetPublisher {
    /// `git_workdir` is the local worktree used by Git targets.
    pub async fn from_entry(
        entry: &TargetEntry,
        settings: &PublishSettings,
        git_workdir: PathBuf,
    ) -> Result<Self, PublishError> {
        let publisher = match &entry.config {
            TargetConfig::ObjectStore(config) => {
                let (store, cdn) = S3Store::from_config(config).await?;
                TargetPublisher::ObjectStore(
                    ObjectStorePublisher::new(store, settings).with_optional_cdn(cdn),
                )
            }
            TargetConfig::Git(config) => TargetPublisher::Git(GitPublisher::new(
                GitCli::default(),
                config.clone(),
                git_workdir,
                settings.include_hidden.clone(),
            )),
            TargetConfig::Sftp(config) => {
                if config.remote_path.trim().is_empty() {
                    return Err(PublishError::Config("sftp remote_path must not be empty".into()));
                }
                TargetPublisher::Sftp(SftpPublisher::new(
                    Ssh2Transport::new(config.clone()),
                    &config.remote_path,
                ))
            }
            TargetConfig::LocalArchive(config) => {
                TargetPublisher::LocalArchive(ArchivePublisher::new(config.output_path.clone()))
            }
        };
        Ok(publisher)
    }
}

impl Publisher for TargetPublisher {
    fn describe(&self) -> String {
        match self {
            TargetPublisher::ObjectStore(p) => p.describe(),
            TargetPublisher::Git(p) => p.describe(),
            TargetPublisher::Sftp(p) => p.describe(),
            TargetPublisher::LocalArchive(p) => p.describe(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        match self {
            TargetPublisher::ObjectStore(p) => p.capabilities(),
            TargetPublisher::Git(p) => p.capabilities(),
            TargetPublisher::Sftp(p) => p.capabilities(),
            TargetPublisher::LocalArchive(p) => p.capabilities(),
        }
    }

    async fn connect(&mut self) -> Result<(), PublishError> {
        match self {
            TargetPublisher::ObjectStore(p) => p.connect().await,
            TargetPublisher::Git(p) => p.connect().await,
            TargetPublisher::Sftp(p) => p.connect().await,
            TargetPublisher::LocalArchive(p) => p.connect().await,
        }
    }

    async fn fetch_remote_hashes(&mut self) -> Result<Option<RemoteHashRecord>, PublishError> {
        match self {
            TargetPublisher::ObjectStore(p) => p.fetch_remote_hashes().await,
            TargetPublisher::Git(p) => p.fetch_remote_hashes().await,
            TargetPublisher::Sftp(p) => p.fetch_remote_hashes().await,
            TargetPublisher::LocalArchive(p) => p.fetch_remote_hashes().await,
        }
    }

    async fn list_remote(&mut self) -> Result<FileManifest, PublishError> {
        match self {
            TargetPublisher::ObjectStore(p) => p.list_remote().await,
            TargetPublisher::Git(p) => p.list_remote().await,
            TargetPublisher::Sftp(p) => p.list_remote().await,
            TargetPublisher::LocalArchive(p) => p.list_remote().await,
        }
    }

    async fn apply(
        &mut self,
        plan: TransferPlan<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<PublishResult, PublishFailure> {
        match self {
            TargetPublisher::ObjectStore(p) => p.apply(plan, progress).await,
            TargetPublisher::Git(p) => p.apply(plan, progress).await,
            TargetPublisher::Sftp(p) => p.apply(plan, progress).await,
            TargetPublisher::LocalArchive(p) => p.apply(plan, progress).await,
        }
    }
}
