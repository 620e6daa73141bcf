//! Source configuration.
//!
//! A [`SourceSpec`] is read from a YAML or JSON document, completed with
//! [`SourceSpec::set_defaults`] and checked with [`SourceSpec::validate`]
//! before anything touches the bucket.

use parquet_sync_file::S3Options;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The only file type currently supported.
pub const DEFAULT_FILE_TYPE: &str = "parquet";

/// Rows per emitted record batch when not configured.
pub const DEFAULT_ROWS_PER_RECORD: i64 = 500;

/// Object tasks per table when not configured.
pub const DEFAULT_CONCURRENCY: i64 = 50;

/// Error type for configuration problems. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read spec file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse spec: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("unsupported filetype {0:?}, only \"parquet\" is supported")]
    UnsupportedFileType(String),

    #[error("rows_per_record must be at least 1, got {0}")]
    InvalidRowsPerRecord(i64),

    #[error("table {0:?} does not exist in the bucket")]
    UnknownTable(String),
}

/// How many object tasks of one table may run at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// One object at a time on the calling task
    Sequential,
    /// At most this many objects in flight
    Bounded(usize),
    /// Every object gets its own task
    Unbounded,
}

impl Concurrency {
    /// Interpret a configured limit: 1 is sequential, N > 1 bounded,
    /// N < 0 unbounded and 0 the default bound.
    pub fn from_limit(limit: i64) -> Self {
        match limit {
            1 => Concurrency::Sequential,
            0 => Concurrency::Bounded(DEFAULT_CONCURRENCY as usize),
            n if n < 0 => Concurrency::Unbounded,
            n => Concurrency::Bounded(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }
}

/// Bucket, listing and streaming settings for a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    /// Bucket to read from; also scopes the stored cursors
    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub region: String,

    /// Only list keys under this prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    #[serde(default, rename = "filetype")]
    pub file_type: String,

    #[serde(default)]
    pub rows_per_record: i64,

    #[serde(default)]
    pub concurrency: i64,

    /// Endpoint override for S3-compatible stores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub path_style: bool,

    /// Shared credentials profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_profile: Option<String>,
}

impl SourceSpec {
    /// Parse a spec from YAML (JSON is accepted as well).
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load, default and validate a spec file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut spec = Self::from_yaml_str(&content)?;
        spec.set_defaults();
        spec.validate()?;
        Ok(spec)
    }

    /// Fill unset optional values.
    pub fn set_defaults(&mut self) {
        if self.file_type.is_empty() {
            self.file_type = DEFAULT_FILE_TYPE.to_string();
        }
        if self.rows_per_record == 0 {
            self.rows_per_record = DEFAULT_ROWS_PER_RECORD;
        }
        if self.concurrency == 0 {
            self.concurrency = DEFAULT_CONCURRENCY;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::Missing("bucket"));
        }
        if self.region.is_empty() {
            return Err(ConfigError::Missing("region"));
        }
        if self.file_type != DEFAULT_FILE_TYPE {
            return Err(ConfigError::UnsupportedFileType(self.file_type.clone()));
        }
        if self.rows_per_record < 1 {
            return Err(ConfigError::InvalidRowsPerRecord(self.rows_per_record));
        }
        Ok(())
    }

    pub fn concurrency(&self) -> Concurrency {
        Concurrency::from_limit(self.concurrency)
    }

    /// Rows per emitted batch, never zero.
    pub fn batch_rows(&self) -> usize {
        usize::try_from(self.rows_per_record)
            .ok()
            .filter(|&rows| rows > 0)
            .unwrap_or(DEFAULT_ROWS_PER_RECORD as usize)
    }

    pub fn s3_options(&self) -> S3Options {
        let mut options = S3Options::new(&self.bucket, &self.region);
        options.endpoint = self.endpoint.clone();
        options.path_style = self.path_style;
        options.profile = self.local_profile.clone();
        options
    }
}
