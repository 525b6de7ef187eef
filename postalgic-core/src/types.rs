//! Domain types for the Postalgic site registry.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a registered site (one blog).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteName(pub String);

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SiteName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SiteName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed name for a publish target inside a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetName(pub String);

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TargetName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TargetName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifies the client that wrote a control file (`publishedBy`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Target configuration
// ---------------------------------------------------------------------------

/// Which kind of hosting a target publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    ObjectStore,
    Git,
    Sftp,
    LocalArchive,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::ObjectStore => write!(f, "object_store"),
            TargetKind::Git => write!(f, "git"),
            TargetKind::Sftp => write!(f, "sftp"),
            TargetKind::LocalArchive => write!(f, "local_archive"),
        }
    }
}

/// S3-compatible bucket, optionally fronted by a CloudFront distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
    /// When both keys are absent the default AWS credential chain is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    /// Custom endpoint for S3-compatible providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// A Git remote that serves the site (e.g. GitHub Pages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Credentials, if any, are embedded in the URL or handled by the git
    /// credential helper.
    pub repository_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub author_name: String,
    pub author_email: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// An SFTP server with a document root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SftpConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_passphrase: Option<String>,
    pub remote_path: String,
}

fn default_sftp_port() -> u16 {
    22
}

/// A zip bundle written locally for manual upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalArchiveConfig {
    pub output_path: PathBuf,
}

/// Per-target configuration, tagged by `type` in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetConfig {
    ObjectStore(ObjectStoreConfig),
    Git(GitConfig),
    Sftp(SftpConfig),
    LocalArchive(LocalArchiveConfig),
}

impl TargetConfig {
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetConfig::ObjectStore(_) => TargetKind::ObjectStore,
            TargetConfig::Git(_) => TargetKind::Git,
            TargetConfig::Sftp(_) => TargetKind::Sftp,
            TargetConfig::LocalArchive(_) => TargetKind::LocalArchive,
        }
    }
}

/// A named publish target of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub name: TargetName,
    #[serde(flatten)]
    pub config: TargetConfig,
}

// ---------------------------------------------------------------------------
// Publish settings
// ---------------------------------------------------------------------------

/// Tunables shared by every target of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Upper bound on in-flight uploads for targets that allow parallelism.
    pub concurrency: usize,
    /// Keys per bulk-delete request.
    pub delete_batch_size: usize,
    /// Above this many changed paths a single `/*` invalidation is issued.
    pub invalidation_wildcard_threshold: usize,
    /// Generated files whose churn alone never triggers a publish.
    pub non_essential_files: Vec<String>,
    /// Suppression only applies when at most this many files changed.
    pub suppression_max_changes: usize,
    /// Hidden top-level entries that are still part of the site.
    pub include_hidden: Vec<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            delete_batch_size: 1000,
            invalidation_wildcard_threshold: 100,
            non_essential_files: vec!["rss.xml".to_string(), "sitemap.xml".to_string()],
            suppression_max_changes: 2,
            include_hidden: vec![".well-known".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A blog whose generated output Postalgic publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: SiteName,
    /// Directory the site generator writes into.
    pub output_dir: PathBuf,
    /// Overrides the machine-wide client id in control files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub settings: PublishSettings,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteConfig {
    pub fn target(&self, name: &TargetName) -> Option<&TargetEntry> {
        self.targets.iter().find(|t| &t.name == name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
