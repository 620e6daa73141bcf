//! In-memory key-value backend.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::KvStore;

/// In-memory implementation of the KvStore trait.
///
/// Useful for tests and one-shot runs that do not need to persist cursors.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored key and value.
    pub fn entries(&self) -> HashMap<String, String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map of strings
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_key(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set_key(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
