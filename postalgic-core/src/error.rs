//! Error types for postalgic-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from site registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse site config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.postalgic/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The site YAML file did not exist at the expected path.
    #[error("site not found at {path}")]
    SiteNotFound { path: PathBuf },

    /// The site has no publish target with the requested name.
    #[error("site '{site}' has no target named '{target}'")]
    TargetNotFound { site: String, target: String },

    /// Site and target names end up as file names, so they are restricted.
    #[error("invalid name '{0}': use letters, digits, '-', '_' or '.'")]
    InvalidName(String),
}

/// Errors raised while building a [`FileManifest`](crate::FileManifest) or
/// decoding a control file.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Output paths become remote keys; they must be valid UTF-8.
    #[error("output path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("output directory does not exist: {0}")]
    MissingOutputDir(PathBuf),

    #[error("malformed hash record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported hash record version {found} (newest known is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Convenience constructor for [`ManifestError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.into(),
        source,
    }
}
