//! Postalgic core library — publish data model, hashing, change sets, site registry.
//!
//! - [`manifest`] / [`hasher`] — `FileManifest` and the SHA-256 ContentHasher
//! - [`changeset`] — ChangeSetCalculator with the non-essential suppression rule
//! - [`record`] — the `.postalgic/hashes.json` control file
//! - [`types`] / [`registry`] — site + target configuration, load / save / init
//! - [`error`] — [`RegistryError`], [`ManifestError`]

pub mod changeset;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod record;
pub mod registry;
pub mod types;

pub use changeset::{diff, diff_with, ChangeSet, SuppressionRule};
pub use error::{ManifestError, RegistryError};
pub use hasher::{hash_bytes, hash_file, hash_site};
pub use manifest::FileManifest;
pub use record::{RemoteHashRecord, CONTROL_DIR, CONTROL_FILE_PATH, RECORD_VERSION};
pub use types::{
    ClientId, GitConfig, LocalArchiveConfig, ObjectStoreConfig, PublishSettings, SftpConfig,
    SiteConfig, SiteName, TargetConfig, TargetEntry, TargetKind, TargetName,
};
