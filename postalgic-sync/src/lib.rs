//! # postalgic-sync
//!
//! Publish orchestration and hash-state bookkeeping.
//!
//! Call [`publish_target`] to publish one site through any
//! [`Publisher`](postalgic_publish::Publisher), or [`pipeline::run`] to
//! publish a registered site to its configured targets.

pub mod error;
pub mod hash_store;
pub mod orchestrator;
pub mod pipeline;
pub mod remote;
pub mod status;

pub use error::SyncError;
pub use orchestrator::{publish_target, BaselineSource, PublishOptions, PublishReport};
pub use pipeline::{PublishScope, TargetOutcome};
pub use status::PublishStatus;
