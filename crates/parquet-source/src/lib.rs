//! Parquet source for parquet-sync
//!
//! Discovers tables in a bucket of Parquet files and streams their rows to
//! a message sink, incrementally when a cursor backend remembers what was
//! already synced.
//!
//! # Pipeline
//!
//! ```text
//! list objects ─► group by directory ─► resolve + validate schemas
//!                                              │
//!            ┌─────────────── per table ◄──────┘
//!            ▼
//!   cursor filter ─► announce ─► stream objects (bounded pool) ─► advance cursor
//! ```
//!
//! # Example
//!
//! ```ignore
//! use parquet_sync_source::{SourceSpec, Syncer, TableFilter};
//!
//! let spec = SourceSpec::load(Path::new("spec.yaml"))?;
//! let store = Arc::new(S3Client::new(spec.s3_options()).await);
//! let syncer = Syncer::new(store, spec, Arc::new(FilesystemStore::new("state.json")));
//! let summary = syncer.sync(&TableFilter::all(), tx, cancel).await?;
//! ```

pub mod classify;
pub mod config;
pub mod decoder;
pub mod discover;
pub mod engine;
mod error;
pub mod filter;
pub mod naming;
mod scratch;
pub mod sink;
pub mod sync;

#[cfg(test)]
mod testing;

pub use classify::ErrorClass;
pub use config::{Concurrency, ConfigError, SourceSpec};
pub use discover::{group_by_prefix, DiscoveredTable, Discoverer};
pub use engine::{stream_table, StreamContext, TableStats};
pub use error::{DiscoveryError, ObjectError, SyncError};
pub use filter::TableFilter;
pub use naming::normalize;
pub use sink::MessageSink;
pub use sync::{filter_objects_by_cursor, max_last_modified, SyncSummary, Syncer};
