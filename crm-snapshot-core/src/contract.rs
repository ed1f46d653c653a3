//! # contract: interfaces to the CRM and to object storage
//!
//! The pipeline only ever talks to the outside world through the two traits in
//! this module. Production implementations are the HTTP client in the
//! `crm-snapshot` crate and [`crate::storage::ObjectStoreBuckets`]; tests use the
//! `mockall` mocks exported under the `test-export-mocks` feature.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use mockall::automock;
use serde_json::{Map, Value};

use crate::catalog::{Entity, ReferenceList};
use crate::clock::RunWindow;
use crate::error::{FetchError, StorageError};

/// A record exactly as the CRM returned it, keyed by field code.
pub type RawRecord = Map<String, Value>;

/// A flattened record keyed by output column name.
pub type OutputRow = Map<String, Value>;

/// Read access to the CRM.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Fetch every record of `entity` modified inside `window`, following pagination.
    async fn fetch_records(
        &self,
        entity: Entity,
        window: &RunWindow,
    ) -> Result<Vec<RawRecord>, FetchError>;

    /// Mapping from CRM field code to output column name for `entity`.
    fn column_renames(&self, entity: Entity) -> HashMap<String, String>;

    /// Fetch a plain list endpoint (field definitions or a reference list).
    async fn fetch_list(&self, list: ReferenceList) -> Result<Vec<Value>, FetchError>;
}

/// Write access to object storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `bytes` to `path` in `bucket`, replacing any existing object.
    async fn write(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Delete every object under `prefix` whose name ends with `suffix`.
    /// Returns the number of objects deleted.
    async fn list_and_delete(
        &self,
        bucket: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<usize, StorageError>;
}
