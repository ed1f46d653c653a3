//! `object_store`-backed implementation of [`ObjectStorage`].
//!
//! Each logical bucket name maps to its own `ObjectStore`. Production uses
//! Google Cloud Storage; tests register `InMemory` stores under the same names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, PutOptions, PutPayload,
    RetryConfig,
};
use tracing::debug;

use crate::contract::ObjectStorage;
use crate::error::StorageError;

#[derive(Debug, Clone, Default)]
pub struct ObjectStoreBuckets {
    stores: HashMap<String, Arc<dyn ObjectStore>>,
}

impl ObjectStoreBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` as the backend for `bucket`.
    pub fn with_bucket(mut self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.stores.insert(bucket.into(), store);
        self
    }

    /// GCS stores for each bucket, credentials taken from the environment.
    pub fn gcs<I, S>(buckets: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut this = Self::new();
        for bucket in buckets {
            let bucket = bucket.as_ref();
            let mut builder = GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .with_retry(RetryConfig::default());

            if let Ok(service_account_key) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
                debug!(bucket, "Constructing GCS builder with service account key");
                builder = builder.with_service_account_key(&service_account_key);
            }

            let store = builder.build().map_err(|source| StorageError::GcsConfig {
                bucket: bucket.to_owned(),
                source,
            })?;
            this = this.with_bucket(bucket, Arc::new(store));
        }
        Ok(this)
    }

    /// Empty in-memory stores for each bucket.
    pub fn in_memory<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        buckets.into_iter().fold(Self::new(), |this, bucket| {
            this.with_bucket(bucket, Arc::new(InMemory::new()))
        })
    }

    fn store(&self, bucket: &str) -> Result<&Arc<dyn ObjectStore>, StorageError> {
        self.stores
            .get(bucket)
            .ok_or_else(|| StorageError::UnknownBucket {
                bucket: bucket.to_owned(),
            })
    }

    async fn list_meta(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let prefix_path = Path::from(prefix);
        self.store(bucket)?
            .list(Some(&prefix_path))
            .try_collect()
            .await
            .map_err(|source| StorageError::ObjectStore {
                bucket: bucket.to_owned(),
                path: prefix.to_owned(),
                source,
            })
    }

    /// Object names under `prefix`, sorted.
    pub async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self
            .list_meta(bucket, prefix)
            .await?
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    pub async fn read(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError> {
        let store = self.store(bucket)?;
        let to_error = |source| StorageError::ObjectStore {
            bucket: bucket.to_owned(),
            path: path.to_owned(),
            source,
        };
        store
            .get(&Path::from(path))
            .await
            .map_err(to_error)?
            .bytes()
            .await
            .map_err(to_error)
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreBuckets {
    async fn write(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let opts = PutOptions {
            attributes: Attributes::from_iter([(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_owned()),
            )]),
            ..Default::default()
        };
        let size = bytes.len();

        self.store(bucket)?
            .put_opts(&Path::from(path), PutPayload::from(bytes), opts)
            .await
            .map_err(|source| StorageError::ObjectStore {
                bucket: bucket.to_owned(),
                path: path.to_owned(),
                source,
            })?;

        debug!(bucket, path, size, content_type, "Wrote object");
        Ok(())
    }

    async fn list_and_delete(
        &self,
        bucket: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<usize, StorageError> {
        let store = self.store(bucket)?;
        let mut deleted = 0;

        for meta in self.list_meta(bucket, prefix).await? {
            if !meta.location.as_ref().ends_with(suffix) {
                continue;
            }
            store
                .delete(&meta.location)
                .await
                .map_err(|source| StorageError::ObjectStore {
                    bucket: bucket.to_owned(),
                    path: meta.location.to_string(),
                    source,
                })?;
            deleted += 1;
        }

        debug!(bucket, prefix, suffix, deleted, "Cleared objects under prefix");
        Ok(deleted)
    }
}
