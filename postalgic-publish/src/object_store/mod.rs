//! Object storage with an optional CDN in front.
//!
//! Uploads run with bounded parallelism; deletes go out in sequential bulk
//! batches. The edge cache is invalidated once the files are in place, and
//! the control object is written last so a failed publish never advances it.

mod aws;

pub use aws::{CloudFrontCache, S3Store};

use std::pin::pin;

use futures_util::{stream, StreamExt};
use postalgic_core::{FileManifest, PublishSettings, RemoteHashRecord, CONTROL_FILE_PATH};

use crate::error::{PublishError, PublishFailure};
use crate::headers::ObjectHeaders;
use crate::phase::PublishPhase;
use crate::progress::{ProgressReporter, StepCounter};
use crate::publisher::{read_site_file, Capabilities, Publisher, TransferPlan, UNKNOWN_HASH};
use crate::result::PublishResult;

/// Minimal bucket API the publisher needs.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// `s3://bucket`-style description.
    fn location(&self) -> String;

    /// Verify the bucket exists and the credentials can reach it.
    async fn check_access(&self) -> Result<(), PublishError>;

    /// `Ok(None)` when the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, PublishError>;

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<(), PublishError>;

    /// Delete one batch of keys in a single request.
    async fn delete_objects(&self, keys: &[String]) -> Result<(), PublishError>;

    /// Every key in the bucket.
    async fn list_keys(&self) -> Result<Vec<String>, PublishError>;
}

/// CDN path invalidation.
#[allow(async_fn_in_trait)]
pub trait EdgeCache {
    async fn invalidate(&self, paths: &[String]) -> Result<(), PublishError>;
}

/// Placeholder for buckets served without a CDN.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEdgeCache;

impl EdgeCache for NoEdgeCache {
    async fn invalidate(&self, _paths: &[String]) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Paths to invalidate for `touched` output keys: one `/<key>` each, or a
/// single `/*` once the count exceeds `wildcard_threshold`.
pub fn invalidation_paths(touched: &[String], wildcard_threshold: usize) -> Vec<String> {
    if touched.len() > wildcard_threshold {
        return vec!["/*".to_string()];
    }
    touched.iter().map(|p| format!("/{p}")).collect()
}

pub struct ObjectStorePublisher<S, C = NoEdgeCache> {
    store: S,
    cdn: Option<C>,
    concurrency: usize,
    delete_batch_size: usize,
    wildcard_threshold: usize,
    connected: bool,
}

impl<S: ObjectStore> ObjectStorePublisher<S, NoEdgeCache> {
    pub fn new(store: S, settings: &PublishSettings) -> Self {
        Self {
            store,
            cdn: None,
            concurrency: settings.concurrency.max(1),
            delete_batch_size: settings.delete_batch_size.max(1),
            wildcard_threshold: settings.invalidation_wildcard_threshold,
            connected: false,
        }
    }
}

impl<S: ObjectStore, C: EdgeCache> ObjectStorePublisher<S, C> {
    /// Put `cdn` in front of the bucket.
    pub fn with_cdn<D: EdgeCache>(self, cdn: D) -> ObjectStorePublisher<S, D> {
        ObjectStorePublisher {
            store: self.store,
            cdn: Some(cdn),
            concurrency: self.concurrency,
            delete_batch_size: self.delete_batch_size,
            wildcard_threshold: self.wildcard_threshold,
            connected: self.connected,
        }
    }

    /// Same as [`with_cdn`](Self::with_cdn) for an optional distribution.
    pub fn with_optional_cdn<D: EdgeCache>(self, cdn: Option<D>) -> ObjectStorePublisher<S, D> {
        ObjectStorePublisher {
            store: self.store,
            cdn,
            concurrency: self.concurrency,
            delete_batch_size: self.delete_batch_size,
            wildcard_threshold: self.wildcard_threshold,
            connected: self.connected,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ObjectStore, C: EdgeCache> Publisher for ObjectStorePublisher<S, C> {
    fn describe(&self) -> String {
        self.store.location()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            remote_hashes: true,
            remote_listing: true,
            transactional: false,
        }
    }

    async fn connect(&mut self) -> Result<(), PublishError> {
        if !self.connected {
            self.store.check_access().await?;
            self.connected = true;
        }
        Ok(())
    }

    async fn fetch_remote_hashes(&mut self) -> Result<Option<RemoteHashRecord>, PublishError> {
        match self.store.get_object(CONTROL_FILE_PATH).await? {
            Some(bytes) => Ok(Some(RemoteHashRecord::from_json_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_remote(&mut self) -> Result<FileManifest, PublishError> {
        // ETags are not content hashes for multipart uploads, so every
        // listed key is treated as unknown.
        Ok(self
            .store
            .list_keys()
            .await?
            .into_iter()
            .map(|key| (key, UNKNOWN_HASH))
            .collect())
    }

    async fn apply(
        &mut self,
        plan: TransferPlan<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<PublishResult, PublishFailure> {
        let changes = plan.changes;
        let batches = changes.deleted.len().div_ceil(self.delete_batch_size);
        let finalize_steps = usize::from(plan.record.is_some()) + usize::from(self.cdn.is_some());
        let mut steps = StepCounter::new(progress, changes.modified.len() + batches + finalize_steps);
        let mut result = PublishResult {
            total: plan.manifest.len(),
            changed: true,
            ..PublishResult::default()
        };

        let store = &self.store;
        let mut uploads = pin!(stream::iter(changes.modified.iter())
            .map(|key| async move {
                let body = read_site_file(plan.site_dir, key).await?;
                store
                    .put_object(key, body, &ObjectHeaders::for_path(key))
                    .await
                    .map(|()| key)
            })
            .buffer_unordered(self.concurrency));
        let mut first_error = None;
        while let Some(outcome) = uploads.next().await {
            match outcome {
                Ok(key) => {
                    result.uploaded += 1;
                    steps.advance(&format!("uploaded {key}"));
                }
                // In-flight uploads still finish so the partial count is exact.
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }
        if let Some(error) = first_error {
            let remaining = changes.len() - result.uploaded;
            return Err(PublishFailure::new(
                PublishPhase::Transferring,
                result,
                remaining,
                error,
            ));
        }

        for batch in changes.deleted.chunks(self.delete_batch_size) {
            if let Err(error) = self.store.delete_objects(batch).await {
                let remaining = changes.deleted.len() - result.deleted;
                return Err(PublishFailure::new(
                    PublishPhase::Transferring,
                    result,
                    remaining,
                    error,
                ));
            }
            result.deleted += batch.len();
            steps.advance(&format!("deleted {} files", batch.len()));
        }

        if let Some(cdn) = &self.cdn {
            let paths = invalidation_paths(&changes.touched_paths(), self.wildcard_threshold);
            if let Err(error) = cdn.invalidate(&paths).await {
                return Err(PublishFailure::new(PublishPhase::Finalizing, result, 0, error));
            }
            tracing::debug!(paths = paths.len(), "invalidated edge cache");
            result.invalidated = paths;
            steps.advance("invalidated edge cache");
        }

        if let Some(record) = plan.record {
            let written = match record.to_json_bytes() {
                Ok(body) => {
                    self.store
                        .put_object(CONTROL_FILE_PATH, body, &ObjectHeaders::control_file())
                        .await
                }
                Err(e) => Err(e.into()),
            };
            if let Err(error) = written {
                return Err(PublishFailure::new(PublishPhase::Finalizing, result, 0, error));
            }
            steps.advance("wrote control file");
        }

        Ok(result)
    }
}
