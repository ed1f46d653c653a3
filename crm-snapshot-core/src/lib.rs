#![doc = "crm-snapshot-core: core logic library for crm-snapshot."]

//! This crate holds the collaborator-agnostic part of the pipeline: field schema
//! building, custom-field decoding, record flattening, columnar encoding and the
//! snapshot publication sequence, plus the orchestrator that runs them for every
//! entity.
//!
//! Concrete CRM and HTTP trigger integrations live in the `crm-snapshot` binary crate.
//! Storage is provided here through `object_store` so tests can run against an
//! in-memory bucket.

pub mod catalog;
pub mod clock;
pub mod columnar;
pub mod contract;
pub mod decode;
pub mod error;
pub mod flatten;
pub mod locks;
pub mod pipeline;
pub mod publish;
pub mod schema;
pub mod storage;

pub use catalog::{Entity, ReferenceList, Step};
pub use clock::{Clock, FixedClock, RunWindow, SystemClock};
pub use contract::{CrmApi, ObjectStorage, OutputRow, RawRecord};
pub use error::{EncodeError, FetchError, PipelineError, RunFailure, StorageError};
pub use locks::EntityLocks;
pub use pipeline::{Pipeline, PipelineSettings, RunReport};
pub use publish::{SnapshotPublisher, SnapshotTarget, StorageLayout};
pub use schema::{FieldDescriptor, FieldKind, FieldSchema};
pub use storage::ObjectStoreBuckets;
