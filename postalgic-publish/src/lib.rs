//! Postalgic publish library — the Publisher protocol and its targets.
//!
//! - [`publisher`] — [`Publisher`] trait, [`publish`] sequence, full-resync fallback
//! - [`object_store`] — S3-compatible bucket + CloudFront invalidation
//! - [`git`] — worktree mirror committed and pushed in one go
//! - [`sftp`] — per-file transfer with lazy directory creation
//! - [`archive`] — local zip bundle
//! - [`target`] — [`TargetPublisher`] built from a site's target config
//! - [`memory`] — in-memory transports for tests

pub mod archive;
pub mod error;
pub mod git;
pub mod headers;
pub mod memory;
pub mod object_store;
pub mod phase;
pub mod progress;
pub mod publisher;
pub mod result;
pub mod sftp;
pub mod target;

pub use error::{Operation, PublishError, PublishFailure};
pub use headers::{CacheTier, ObjectHeaders};
pub use phase::PublishPhase;
pub use progress::{NoProgress, ProgressReporter, StepCounter};
pub use publisher::{
    full_resync, publish, Capabilities, PublishRequest, Publisher, TransferPlan, UNKNOWN_HASH,
};
pub use result::PublishResult;
pub use target::TargetPublisher;
