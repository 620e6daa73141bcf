//! Local filesystem object store implementation
//!
//! Treats a directory as a bucket: every regular file below it is an object
//! whose key is its `/`-separated path relative to the root.

use crate::{ObjectRecord, ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Serves objects from a local directory tree.
pub struct LocalStore {
    root: PathBuf,
    bucket: String,
}

impl LocalStore {
    /// Create a store rooted at `root`, reporting `bucket` as its scope.
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    fn io_error(path: &Path, source: std::io::Error) -> ObjectStoreError {
        ObjectStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Turn a path below the root into a `/`-separated key.
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    /// List all files below the root (recursive)
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectRecord>, ObjectStoreError> {
        let mut results = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| Self::io_error(&dir, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::io_error(&dir, e))?
            {
                let entry_path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| Self::io_error(&entry_path, e))?;

                if metadata.is_dir() {
                    pending.push(entry_path);
                    continue;
                }
                if !metadata.is_file() {
                    continue;
                }

                let Some(key) = self.key_for(&entry_path) else {
                    continue;
                };
                if prefix.is_some_and(|p| !key.starts_with(p)) {
                    continue;
                }

                let last_modified = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .map_err(|e| Self::io_error(&entry_path, e))?;

                results.push(ObjectRecord {
                    key,
                    size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
                    last_modified,
                });
            }
        }

        // Sort for consistent ordering
        results.sort_by(|a, b| a.key.cmp(&b.key));

        tracing::debug!(
            root = %self.root.display(),
            "Listed {} files",
            results.len()
        );

        Ok(results)
    }

    async fn fetch_to(&self, key: &str, dest: &Path) -> Result<u64, ObjectStoreError> {
        let source = self.root.join(key);
        match tokio::fs::copy(&source, dest).await {
            Ok(written) => Ok(written),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ObjectStoreError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            }),
            Err(e) => Err(Self::io_error(&source, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_recursive_keys() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        std::fs::create_dir_all(root.join("data/2024")).unwrap();
        std::fs::write(root.join("data/2024/a.parquet"), "a").unwrap();
        std::fs::write(root.join("data/2024/b.parquet"), "bb").unwrap();
        std::fs::write(root.join("root.parquet"), "ccc").unwrap();

        let store = LocalStore::new(root, "local");
        let objects = store.list(None).await.unwrap();

        let keys: Vec<_> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["data/2024/a.parquet", "data/2024/b.parquet", "root.parquet"]
        );
        assert_eq!(objects[2].size, 3);
        assert_eq!(store.bucket(), "local");
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        std::fs::create_dir_all(root.join("logs")).unwrap();
        std::fs::write(root.join("logs/access.parquet"), "a").unwrap();
        std::fs::write(root.join("other.parquet"), "b").unwrap();

        let store = LocalStore::new(root, "local");
        let objects = store.list(Some("logs/")).await.unwrap();

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "logs/access.parquet");
    }

    #[tokio::test]
    async fn test_list_directory_not_found() {
        let store = LocalStore::new("/nonexistent/path", "local");
        let result = store.list(None).await;
        assert!(matches!(result, Err(ObjectStoreError::Io { .. })));
    }

    #[tokio::test]
    async fn test_fetch_to_copies_bytes() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("file.parquet"), "hello world").unwrap();
        let dest = temp_dir.path().join("copy.bin");

        let store = LocalStore::new(temp_dir.path(), "local");
        let written = tokio_test::assert_ok!(store.fetch_to("file.parquet", &dest).await);

        assert_eq!(written, 11);
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path(), "local");

        let err = store
            .fetch_to("gone.parquet", &temp_dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
