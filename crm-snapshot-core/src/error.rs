//! Error types for every stage of a run.
//!
//! Nothing here is retried: each error surfaces as the single failure of the
//! run, wrapped in [`RunFailure`] together with the step that produced it.

use thiserror::Error;

use crate::catalog::Step;
use crate::pipeline::RunReport;

/// Failure to obtain data from the CRM.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
}

/// Failure while talking to object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no object store configured for bucket '{bucket}'")]
    UnknownBucket { bucket: String },

    #[error("storage operation on {bucket}/{path} failed: {source}")]
    ObjectStore {
        bucket: String,
        path: String,
        #[source]
        source: object_store::Error,
    },

    #[error("GCS configuration error for bucket '{bucket}': {source}")]
    GcsConfig {
        bucket: String,
        #[source]
        source: object_store::Error,
    },
}

/// Failure while serializing a payload.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Any error that aborts a pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("serialization failed: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A run that stopped part way through.
///
/// `completed` holds the counts recorded by every step that finished before
/// `step` failed; whatever those steps published stays published.
#[derive(Debug, Error)]
#[error("step {step} failed: {source}")]
pub struct RunFailure {
    pub step: Step,
    pub completed: RunReport,
    #[source]
    pub source: PipelineError,
}
