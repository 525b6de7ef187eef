//! Error types for postalgic-sync.

use std::path::PathBuf;

use thiserror::Error;

use postalgic_core::{ManifestError, RegistryError};
use postalgic_publish::{PublishError, PublishFailure};

/// All errors that can arise while orchestrating a publish.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Hashing the output directory or decoding a hash record failed.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// The target could not be built from its configuration.
    #[error("target error: {0}")]
    Target(#[from] PublishError),

    /// The publish itself failed; previous hash state is untouched.
    #[error(transparent)]
    Publish(#[from] PublishFailure),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (hash store).
    #[error("hash store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
