//! Snapshot publication: dated archive plus a single-object "latest" prefix.
//!
//! For every entity a publish performs, under that entity's lock:
//!
//! 1. write the payload to `<dir>/archive/[<year>/<month>/]<date>_<stem>.<ext>`
//! 2. delete every `.<ext>` object under `<dir>/daily_update/`
//! 3. write the payload to `<dir>/daily_update/<date>_<stem>.<ext>`
//!
//! A failed step aborts the publish without undoing earlier steps. Readers of
//! the latest prefix may briefly see it empty between steps 2 and 3.

use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info};

use crate::clock::RunWindow;
use crate::columnar::encode_parquet;
use crate::contract::{ObjectStorage, OutputRow};
use crate::error::{EncodeError, PipelineError, StorageError};
use crate::locks::EntityLocks;

pub const PARQUET_CONTENT_TYPE: &str = "application/octet-stream";
pub const JSON_CONTENT_TYPE: &str = "application/json";

const PARQUET_EXTENSION: &str = "parquet";
const JSON_EXTENSION: &str = "json";

/// Where one entity's snapshot for one run is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTarget {
    pub bucket: String,
    pub archive_path: String,
    pub latest_prefix: String,
    pub latest_path: String,
    pub content_type: String,
}

impl SnapshotTarget {
    /// The serialized-format suffix, e.g. `.parquet`. Only objects with this
    /// suffix are cleared from the latest prefix.
    pub fn suffix(&self) -> &str {
        self.latest_path
            .rfind('.')
            .map(|i| &self.latest_path[i..])
            .unwrap_or("")
    }
}

/// Bucket names and the root prefix every object path starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub root_prefix: String,
    /// Receives raw JSON copies and field definitions.
    pub raw_bucket: String,
    /// Receives columnar snapshots.
    pub staging_bucket: String,
}

impl StorageLayout {
    fn join(&self, parts: &[&str]) -> String {
        std::iter::once(self.root_prefix.trim_matches('/'))
            .chain(parts.iter().map(|p| p.trim_matches('/')))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn file_name(window: &RunWindow, stem: &str, extension: &str) -> String {
        format!("{}_{stem}.{extension}", window.file_date())
    }

    fn archive_path(
        &self,
        dir: &str,
        stem: &str,
        partitioned: bool,
        window: &RunWindow,
        extension: &str,
    ) -> String {
        let file = Self::file_name(window, stem, extension);
        if partitioned {
            self.join(&[dir, "archive", &window.year(), &window.month(), &file])
        } else {
            self.join(&[dir, "archive", &file])
        }
    }

    /// Columnar snapshot target in the staging bucket.
    pub fn snapshot_target(
        &self,
        dir: &str,
        stem: &str,
        partitioned: bool,
        window: &RunWindow,
    ) -> SnapshotTarget {
        let latest_prefix = format!("{}/", self.join(&[dir, "daily_update"]));
        let latest_path = format!(
            "{latest_prefix}{}",
            Self::file_name(window, stem, PARQUET_EXTENSION)
        );
        SnapshotTarget {
            bucket: self.staging_bucket.clone(),
            archive_path: self.archive_path(dir, stem, partitioned, window, PARQUET_EXTENSION),
            latest_prefix,
            latest_path,
            content_type: PARQUET_CONTENT_TYPE.to_owned(),
        }
    }

    /// Raw JSON archive path of an entity's records, in the raw bucket.
    pub fn raw_archive_path(
        &self,
        dir: &str,
        stem: &str,
        partitioned: bool,
        window: &RunWindow,
    ) -> String {
        self.archive_path(dir, stem, partitioned, window, JSON_EXTENSION)
    }

    /// Path of a dated JSON copy directly under `dir`, in the raw bucket.
    pub fn raw_list_path(&self, dir: &str, stem: &str, window: &RunWindow) -> String {
        self.join(&[dir, &Self::file_name(window, stem, JSON_EXTENSION)])
    }
}

/// Runs the publish sequence against an [`ObjectStorage`].
pub struct SnapshotPublisher<'a> {
    storage: &'a dyn ObjectStorage,
    locks: &'a EntityLocks,
}

impl<'a> SnapshotPublisher<'a> {
    pub fn new(storage: &'a dyn ObjectStorage, locks: &'a EntityLocks) -> Self {
        Self { storage, locks }
    }

    /// Encode `rows` as Parquet and publish them to `target`.
    /// Returns the size of the published file.
    pub async fn publish_rows(
        &self,
        entity: &str,
        target: &SnapshotTarget,
        rows: &[OutputRow],
    ) -> Result<usize, PipelineError> {
        let payload = Bytes::from(encode_parquet(rows)?);
        let size = payload.len();
        self.publish(entity, target, payload).await?;
        Ok(size)
    }

    /// Archive `payload`, then replace the latest prefix with it.
    pub async fn publish(
        &self,
        entity: &str,
        target: &SnapshotTarget,
        payload: Bytes,
    ) -> Result<(), StorageError> {
        let _guard = self.locks.acquire(entity).await;

        self.storage
            .write(
                &target.bucket,
                &target.archive_path,
                payload.clone(),
                &target.content_type,
            )
            .await
            .inspect_err(|e| {
                error!(
                    entity,
                    path = %target.archive_path,
                    error = %e,
                    "[PUBLISH][ERROR] Archive write failed"
                )
            })?;

        let cleared = self
            .storage
            .list_and_delete(&target.bucket, &target.latest_prefix, target.suffix())
            .await
            .inspect_err(|e| {
                error!(
                    entity,
                    prefix = %target.latest_prefix,
                    error = %e,
                    "[PUBLISH][ERROR] Clearing latest prefix failed"
                )
            })?;

        self.storage
            .write(
                &target.bucket,
                &target.latest_path,
                payload,
                &target.content_type,
            )
            .await
            .inspect_err(|e| {
                error!(
                    entity,
                    path = %target.latest_path,
                    error = %e,
                    "[PUBLISH][ERROR] Latest write failed"
                )
            })?;

        info!(
            entity,
            bucket = %target.bucket,
            archive = %target.archive_path,
            latest = %target.latest_path,
            cleared,
            "[PUBLISH] Snapshot published"
        );
        Ok(())
    }

    /// Write `value` as indented JSON text. Archive-only: no latest prefix is touched.
    pub async fn write_json<T>(
        &self,
        bucket: &str,
        path: &str,
        value: &T,
    ) -> Result<(), PipelineError>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_vec_pretty(value).map_err(EncodeError::from)?;
        self.storage
            .write(bucket, path, Bytes::from(text), JSON_CONTENT_TYPE)
            .await?;
        info!(bucket, path, "[PUBLISH] JSON copy written");
        Ok(())
    }
}
