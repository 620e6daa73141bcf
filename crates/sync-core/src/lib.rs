//! Core types for the parquet-sync framework.
//!
//! This crate provides the foundational types shared between the source
//! implementation and the host that consumes its output:
//!
//! - [`ColumnDefinition`] / [`TableDefinition`] - Table schema advertised downstream
//! - [`SyncMessage`] - The two message kinds a sync emits
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── parquet-sync-source  (builds definitions, emits messages)
//!    │
//!    └─── parquet-sync         (host: writes messages out)
//! ```

pub mod message;
pub mod schema;

// Re-exports for convenience
pub use message::SyncMessage;
pub use schema::{ColumnDefinition, SchemaError, TableDefinition, SYNC_ID_COLUMN, SYNC_PARENT_ID_COLUMN};
