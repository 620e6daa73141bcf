//! Local scratch copies of objects.
//!
//! The Parquet reader needs random access, so every object is downloaded to
//! a temporary file first. The file is deleted when the returned handle is
//! dropped, whichever way processing ends.

use parquet_sync_file::ObjectStore;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::ObjectError;

const SCRATCH_PREFIX: &str = "parquet-sync-";

/// Download `key` into a fresh scratch file under `dir` (or the system
/// temp directory).
pub async fn fetch(
    store: &dyn ObjectStore,
    key: &str,
    dir: Option<&Path>,
) -> Result<NamedTempFile, ObjectError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX).suffix(".parquet");
    let scratch = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(ObjectError::Scratch)?;

    let bytes = store.fetch_to(key, scratch.path()).await?;
    tracing::debug!(key = %key, bytes, "Fetched object to scratch file");
    Ok(scratch)
}
