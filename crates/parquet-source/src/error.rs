//! Error types for discovery, streaming and the sync run.

use parquet_sync_file::ObjectStoreError;
use sync_core::SchemaError;

use crate::config::ConfigError;
use crate::decoder::DecodeError;

/// Failure while processing one object.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error(transparent)]
    Fetch(#[from] ObjectStoreError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to create scratch file: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("sink closed while sending records of {key}")]
    SinkClosed { key: String },

    #[error("cancelled while sending records of {key}")]
    Cancelled { key: String },

    #[error("task for {key} failed: {source}")]
    Task {
        key: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Error type for discovery. Any discovery error aborts the whole pass.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to list objects: {0}")]
    Listing(#[source] ObjectStoreError),

    #[error("failed to read schema of {key}: {source}")]
    SchemaRead {
        key: String,
        #[source]
        source: ObjectError,
    },

    #[error(
        "schema mismatch in table {table}: file {first_key} has {first_fields}, file {other_key} has {other_fields}"
    )]
    SchemaMismatch {
        table: String,
        first_key: String,
        first_fields: String,
        other_key: String,
        other_fields: String,
    },

    #[error("invalid table definition: {0}")]
    Definition(#[from] SchemaError),
}

/// Error type for a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Selection(#[from] ConfigError),

    #[error("failed to sync table {table}: object {key}: {source}")]
    Table {
        table: String,
        key: String,
        #[source]
        source: ObjectError,
    },

    #[error("sync cancelled")]
    Cancelled,

    #[error("sink closed")]
    SinkClosed,
}
