//! Key-value backend trait for cursor storage
//!
//! The cursor adapter only needs three string operations from its backend,
//! which keeps alternative backends (a file, an in-memory map, a remote
//! state service) trivial to plug in.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for key-value state backends.
///
/// Writes may be batched by the implementation; they are only guaranteed to
/// be durable after [`KvStore::flush`] returns `Ok`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns None if the key doesn't exist.
    async fn get_key(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`.
    async fn set_key(&self, key: &str, value: &str) -> Result<()>;

    /// Commit any batched writes.
    async fn flush(&self) -> Result<()>;
}
