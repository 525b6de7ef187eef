//! S3 and CloudFront clients.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use postalgic_core::ObjectStoreConfig;

use super::{EdgeCache, ObjectStore};
use crate::error::{Operation, PublishError};
use crate::headers::ObjectHeaders;

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Build the bucket client and, when a distribution is configured, its
    /// CloudFront client from one shared SDK config.
    pub async fn from_config(
        config: &ObjectStoreConfig,
    ) -> Result<(Self, Option<CloudFrontCache>), PublishError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => {
                loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                    key.clone(),
                    secret.clone(),
                    None,
                    None,
                    "postalgic",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(PublishError::Config(
                    "access_key_id and secret_access_key must be set together".into(),
                ))
            }
        }
        let shared = loader.load().await;

        let mut s3 = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            s3 = s3.endpoint_url(endpoint).force_path_style(true);
        }
        let store = S3Store {
            client: aws_sdk_s3::Client::from_conf(s3.build()),
            bucket: config.bucket.clone(),
        };
        let cdn = config
            .distribution_id
            .as_ref()
            .map(|distribution_id| CloudFrontCache {
                client: aws_sdk_cloudfront::Client::new(&shared),
                distribution_id: distribution_id.clone(),
            });
        Ok((store, cdn))
    }
}

impl ObjectStore for S3Store {
    fn location(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn check_access(&self) -> Result<(), PublishError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| PublishError::Connection {
                target: self.location(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, PublishError> {
        let output = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => return Ok(None),
            Err(e) => {
                return Err(PublishError::transfer(
                    Operation::Download,
                    key,
                    DisplayErrorContext(&e),
                ))
            }
        };
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| PublishError::transfer(Operation::Download, key, e))?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<(), PublishError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(headers.content_type)
            .cache_control(headers.cache_control)
            .send()
            .await
            .map_err(|e| PublishError::transfer(Operation::Upload, key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), PublishError> {
        let first = keys.first().map(String::as_str).unwrap_or_default();
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PublishError::transfer(Operation::Delete, first, e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| PublishError::transfer(Operation::Delete, first, e))?;
        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| PublishError::transfer(Operation::Delete, first, DisplayErrorContext(&e)))?;
        if let Some(failed) = output.errors().first() {
            return Err(PublishError::transfer(
                Operation::Delete,
                failed.key().unwrap_or(first),
                failed.message().unwrap_or("delete rejected"),
            ));
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, PublishError> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                PublishError::transfer(Operation::List, self.location(), DisplayErrorContext(&e))
            })?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }
        Ok(keys)
    }
}

pub struct CloudFrontCache {
    client: aws_sdk_cloudfront::Client,
    distribution_id: String,
}

impl EdgeCache for CloudFrontCache {
    async fn invalidate(&self, paths: &[String]) -> Result<(), PublishError> {
        let target = format!("cloudfront:{}", self.distribution_id);
        let quantity = i32::try_from(paths.len())
            .map_err(|_| PublishError::transfer(Operation::Invalidate, &target, "too many paths"))?;
        let paths = Paths::builder()
            .quantity(quantity)
            .set_items(Some(paths.to_vec()))
            .build()
            .map_err(|e| PublishError::transfer(Operation::Invalidate, &target, e))?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(format!(
                "postalgic-{}",
                chrono::Utc::now().timestamp_millis()
            ))
            .build()
            .map_err(|e| PublishError::transfer(Operation::Invalidate, &target, e))?;
        self.client
            .create_invalidation()
            .distribution_id(&self.distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| {
                PublishError::transfer(Operation::Invalidate, &target, DisplayErrorContext(&e))
            })?;
        Ok(())
    }
}
