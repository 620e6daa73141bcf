//! Filesystem-based key-value storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::store::KvStore;

#[derive(Debug, Default)]
struct State {
    loaded: bool,
    committed: BTreeMap<String, String>,
    pending: BTreeMap<String, String>,
}

/// Filesystem implementation of KvStore trait.
///
/// Stores every key in a single pretty-printed JSON object. Writes are kept
/// in memory until `flush`, which rewrites the file through a temporary
/// sibling and an atomic rename. A missing file is an empty store.
pub struct FilesystemStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl FilesystemStore {
    /// Create a new FilesystemStore backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(State::default()),
        }
    }

    async fn load(&self, state: &mut State) -> Result<()> {
        if state.loaded {
            return Ok(());
        }

        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => {}
            Ok(content) => {
                state.committed = serde_json::from_str(&content).with_context(|| {
                    format!("Failed to parse state file: {}", self.path.display())
                })?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read state file: {}", self.path.display())
                })
            }
        }

        state.loaded = true;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FilesystemStore {
    async fn get_key(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        if let Some(value) = state.pending.get(key) {
            return Ok(Some(value.clone()));
        }
        self.load(&mut state).await?;
        Ok(state.committed.get(key).cloned())
    }

    async fn set_key(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.pending.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return Ok(());
        }
        self.load(&mut state).await?;

        let mut merged = state.committed.clone();
        merged.extend(state.pending.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, serde_json::to_string_pretty(&merged)?)
            .await
            .with_context(|| format!("Failed to write state file: {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        tracing::debug!(
            "Flushed {} state keys to {}",
            state.pending.len(),
            self.path.display()
        );

        state.committed = merged;
        state.pending.clear();
        Ok(())
    }
}
