//! Object store abstraction for listing and fetching bucket objects
//!
//! This crate provides a unified interface over the places parquet-sync reads
//! objects from, with paginated listing and whole-object download to a local
//! path (columnar decoders need random access, so objects are never streamed
//! straight into a decoder).
//!
//! # Store Types
//!
//! - **S3**: Objects in an AWS S3 (or S3-compatible) bucket
//! - **Local**: Files below a local directory, treated as a bucket
//!
//! # Example
//!
//! ```ignore
//! use parquet_sync_file::{ObjectStore, S3Client, S3Options};
//!
//! let store = S3Client::new(S3Options::new("my-bucket", "us-east-1")).await;
//! for object in store.list(Some("data/")).await? {
//!     if object.has_extension("parquet") {
//!         store.fetch_to(&object.key, &scratch_path).await?;
//!     }
//! }
//! ```

mod local;
mod s3;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub use local::LocalStore;
pub use s3::{explain_list_error, S3Client, S3Options};

/// Metadata about a single stored object, as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Object key, `/`-separated
    pub key: String,
    /// Size in bytes
    pub size: i64,
    /// Last modification time reported by the store
    pub last_modified: DateTime<Utc>,
}

impl ObjectRecord {
    /// Create a new object record.
    pub fn new(key: impl Into<String>, size: i64, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified,
        }
    }

    /// Check whether the key ends with `.{extension}`, ignoring ASCII case.
    pub fn has_extension(&self, extension: &str) -> bool {
        let suffix_len = extension.len() + 1;
        if self.key.len() <= suffix_len {
            return false;
        }
        let split = self.key.len() - suffix_len;
        if !self.key.is_char_boundary(split) {
            return false;
        }
        let (_, tail) = self.key.split_at(split);
        tail.starts_with('.') && tail[1..].eq_ignore_ascii_case(extension)
    }
}

/// Errors returned by object store operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// The object does not exist (deleted after it was listed, or never existed)
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Listing the bucket failed
    #[error("failed to list objects in bucket {bucket}: {message}")]
    List { bucket: String, message: String },

    /// Downloading an object failed
    #[error("failed to download {key}: {message}")]
    Get { key: String, message: String },

    /// Local I/O failed while listing or writing a download
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ObjectStoreError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, missing file)
    pub fn is_not_found(&self) -> bool {
        matches!(self, ObjectStoreError::NotFound { .. })
    }
}

/// A bucket-style object store.
///
/// Implementations must be safe to share between concurrently running
/// download tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket (or bucket-like scope) this store reads from.
    fn bucket(&self) -> &str;

    /// List every object, optionally restricted to keys starting with `prefix`.
    ///
    /// Directory markers (keys ending with `/`) are not returned.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectRecord>, ObjectStoreError>;

    /// Download the object at `key` into the file at `dest`, returning the
    /// number of bytes written.
    async fn fetch_to(&self, key: &str, dest: &Path) -> Result<u64, ObjectStoreError>;
}
