//! Cursor storage for parquet-sync
//!
//! Provides storage-agnostic persistence of per-table incremental sync
//! watermarks.
//!
//! # Architecture
//!
//! This crate provides a small cursor system that:
//! - Defines the `KvStore` trait for string key-value backends
//! - Maps `(bucket, table)` to a stable state key via `cursor_key`
//! - Reads and advances watermarks through the `CursorStore` adapter
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - Stores all keys in one JSON file, committed on flush
//! - `MemoryStore` - Keeps keys in memory (tests, throwaway runs)
//!
//! ## Failure Policy
//!
//! Cursor reads that fail at the backend are returned as `CursorError` so the
//! caller can choose a fallback. Cursor writes and flushes are best-effort:
//! they return `CursorWrite::Absorbed` after logging instead of an error.

mod cursor;
mod filesystem;
mod memory;
pub mod store;


// Re-export cursor types
pub use cursor::{cursor_key, CursorError, CursorStore, CursorWrite, Watermark};

// Re-export store trait
pub use store::KvStore;

// Re-export storage implementations
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
