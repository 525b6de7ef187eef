//! Error types for postalgic-publish.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use postalgic_core::ManifestError;

use crate::phase::PublishPhase;
use crate::result::PublishResult;

/// The remote operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Upload,
    Delete,
    Download,
    List,
    CreateDir,
    Invalidate,
    Commit,
    Push,
    Archive,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Connect => "connect",
            Operation::Upload => "upload",
            Operation::Delete => "delete",
            Operation::Download => "download",
            Operation::List => "list",
            Operation::CreateDir => "mkdir",
            Operation::Invalidate => "invalidate",
            Operation::Commit => "commit",
            Operation::Push => "push",
            Operation::Archive => "archive",
        };
        f.write_str(label)
    }
}

/// A single failed interaction with a publish target.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Target unreachable or credentials rejected. Fatal for the publish.
    #[error("cannot reach {target}: {message}")]
    Connection { target: String, message: String },

    /// One file upload/delete (or one batch of them) failed.
    #[error("{operation} failed for {path}: {message}")]
    Transfer {
        operation: Operation,
        path: String,
        message: String,
    },

    /// A remote directory needed for `path` could not be created.
    #[error("cannot create remote directory {path}: {message}")]
    Structural { path: String, message: String },

    /// Local I/O while reading the site or staging files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("invalid target configuration: {0}")]
    Config(String),
}

impl PublishError {
    pub(crate) fn transfer(
        operation: Operation,
        path: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        PublishError::Transfer {
            operation,
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Convenience constructor for [`PublishError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.into(),
        source,
    }
}

/// A publish that stopped in [`PublishPhase::Failed`].
///
/// Files transferred before the failure are not rolled back; `partial`
/// counts them and `remaining` counts what was never attempted.
#[derive(Debug, Error)]
#[error(
    "publish failed while {phase} ({} uploaded, {} deleted, {remaining} remaining): {error}",
    .partial.uploaded,
    .partial.deleted
)]
pub struct PublishFailure {
    pub phase: PublishPhase,
    pub partial: PublishResult,
    pub remaining: usize,
    #[source]
    pub error: PublishError,
}

impl PublishFailure {
    pub fn new(
        phase: PublishPhase,
        partial: PublishResult,
        remaining: usize,
        error: PublishError,
    ) -> Self {
        Self {
            phase,
            partial,
            remaining,
            error,
        }
    }

    /// A failure before any transfer work started.
    pub fn before_transfer(phase: PublishPhase, error: PublishError) -> Self {
        Self::new(phase, PublishResult::default(), 0, error)
    }
}
