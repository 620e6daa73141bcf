//! Per-table watermark cursors on top of a [`KvStore`].
//!
//! A cursor records the newest `last_modified` timestamp that was fully
//! synced for a table. Reads distinguish a backend failure (returned to the
//! caller) from a missing or unreadable value (a zero watermark). Writes and
//! flushes never fail their caller: a failure is logged and reported as
//! [`CursorWrite::Absorbed`].

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::sync::Arc;

use crate::store::KvStore;

/// Build the state key for a table's cursor.
///
/// The format is part of the persisted state and must stay stable.
pub fn cursor_key(scope: &str, table: &str) -> String {
    format!("s3/{scope}/{table}/last_modified_cursor")
}

/// Highest `last_modified` timestamp already synced for a table.
///
/// [`Watermark::ZERO`] means "nothing synced yet" and admits every object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(Option<DateTime<Utc>>);

impl Watermark {
    /// The "no cursor" sentinel.
    pub const ZERO: Watermark = Watermark(None);

    /// A watermark at `timestamp`.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self(Some(timestamp))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    /// Whether an object modified at `timestamp` is newer than this watermark.
    ///
    /// Strict comparison: an object exactly at the watermark is not admitted.
    pub fn admits(&self, timestamp: DateTime<Utc>) -> bool {
        match self.0 {
            None => true,
            Some(watermark) => timestamp > watermark,
        }
    }

    /// Parse a stored cursor value (RFC 3339).
    pub fn parse(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value.trim())
            .ok()
            .map(|t| Self::at(t.with_timezone(&Utc)))
    }

    /// Format a timestamp the way cursors are stored.
    pub fn format(timestamp: DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => f.write_str("zero"),
            Some(t) => f.write_str(&Self::format(t)),
        }
    }
}

/// Error type for cursor reads the caller has to handle.
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    /// The backend failed to return the stored value
    #[error("failed to get cursor for {table}: {source}")]
    Read {
        table: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Outcome of a best-effort cursor write or flush.
///
/// `Absorbed` failures have already been logged; callers only inspect the
/// variant when they want to report it.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorWrite {
    /// The value was handed to the backend
    Stored,
    /// Nothing to write: the stored watermark is already at or past the value
    Unchanged,
    /// The operation failed and was logged
    Absorbed { reason: String },
}

impl CursorWrite {
    pub fn is_absorbed(&self) -> bool {
        matches!(self, CursorWrite::Absorbed { .. })
    }
}

/// Cursor store adapter scoped to one bucket.
#[derive(Clone)]
pub struct CursorStore {
    backend: Arc<dyn KvStore>,
    scope: String,
}

impl CursorStore {
    /// Create an adapter storing cursors for `scope` (the bucket name) in `backend`.
    pub fn new(backend: Arc<dyn KvStore>, scope: impl Into<String>) -> Self {
        Self {
            backend,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Read the watermark for `table`.
    ///
    /// A missing value is [`Watermark::ZERO`]. An unparsable value is logged
    /// and also treated as [`Watermark::ZERO`], so a corrupt cursor costs a
    /// full resync of the table rather than a failure.
    pub async fn get_cursor(&self, table: &str) -> Result<Watermark, CursorError> {
        let key = cursor_key(&self.scope, table);
        let value = self
            .backend
            .get_key(&key)
            .await
            .map_err(|source| CursorError::Read {
                table: table.to_string(),
                source,
            })?;

        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            return Ok(Watermark::ZERO);
        };

        match Watermark::parse(&value) {
            Some(watermark) => Ok(watermark),
            None => {
                tracing::warn!(
                    table = %table,
                    key = %key,
                    value = %value,
                    "Ignoring unparsable cursor value, table will be fully resynced"
                );
                Ok(Watermark::ZERO)
            }
        }
    }

    /// Advance the watermark for `table` to `timestamp`.
    ///
    /// The stored value only ever moves forward: if the current cursor is
    /// already at or past `timestamp`, nothing is written. If the current
    /// cursor cannot be read, nothing is written either.
    pub async fn set_cursor(&self, table: &str, timestamp: DateTime<Utc>) -> CursorWrite {
        let current = match self.get_cursor(table).await {
            Ok(current) => current,
            Err(e) => return Self::absorb(table, "failed to check current cursor", &e.into()),
        };
        if !current.admits(timestamp) {
            tracing::debug!(
                table = %table,
                current = %current,
                "Cursor already at or past {}",
                Watermark::format(timestamp)
            );
            return CursorWrite::Unchanged;
        }

        let key = cursor_key(&self.scope, table);
        match self.backend.set_key(&key, &Watermark::format(timestamp)).await {
            Ok(()) => {
                tracing::debug!(table = %table, "Cursor set to {}", Watermark::format(timestamp));
                CursorWrite::Stored
            }
            Err(e) => Self::absorb(table, "failed to set cursor", &e),
        }
    }

    /// Commit batched cursor writes.
    pub async fn flush(&self) -> CursorWrite {
        match self.backend.flush().await {
            Ok(()) => CursorWrite::Stored,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "Failed to flush state backend");
                CursorWrite::Absorbed {
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    fn absorb(table: &str, what: &str, error: &anyhow::Error) -> CursorWrite {
        tracing::warn!(table = %table, error = %format!("{error:#}"), "{what}");
        CursorWrite::Absorbed {
            reason: format!("{what}: {error:#}"),
        }
    }
}
