//! Incremental sync orchestration
//!
//! A run discovers the bucket's tables and then works through them one at a
//! time. For each table it reads the stored cursor, keeps the objects
//! modified after it, announces the table, streams the kept objects and
//! finally advances the cursor to the newest object it streamed.

use chrono::{DateTime, Utc};
use checkpoint::{CursorStore, KvStore, Watermark};
use parquet_sync_file::{ObjectRecord, ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use sync_core::{SyncMessage, TableDefinition};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SourceSpec;
use crate::discover::{DiscoveredTable, Discoverer};
use crate::engine::{stream_table, StreamContext, TableStats};
use crate::error::SyncError;
use crate::filter::TableFilter;
use crate::sink::{MessageSink, SendError};

/// Totals for a completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    /// Tables announced
    pub tables: usize,
    /// Objects streamed to completion
    pub objects: usize,
    /// Objects skipped as vanished or malformed
    pub skipped_objects: usize,
    pub rows: u64,
}

impl SyncSummary {
    fn add(&mut self, stats: &TableStats) {
        self.tables += 1;
        self.objects += stats.objects;
        self.skipped_objects += stats.skipped();
        self.rows += stats.rows;
    }
}

/// Objects modified strictly after `watermark`, in their original order.
pub fn filter_objects_by_cursor(
    objects: &[ObjectRecord],
    watermark: Watermark,
) -> Vec<ObjectRecord> {
    objects
        .iter()
        .filter(|o| watermark.admits(o.last_modified))
        .cloned()
        .collect()
}

/// Newest modification time among `objects`.
pub fn max_last_modified(objects: &[ObjectRecord]) -> Option<DateTime<Utc>> {
    objects.iter().map(|o| o.last_modified).max()
}

/// Drives discovery and incremental syncs for one source.
pub struct Syncer {
    store: Arc<dyn ObjectStore>,
    spec: SourceSpec,
    cursors: CursorStore,
    scratch_dir: Option<PathBuf>,
}

impl Syncer {
    /// Cursors are kept in `state`, scoped by the spec's bucket.
    pub fn new(store: Arc<dyn ObjectStore>, spec: SourceSpec, state: Arc<dyn KvStore>) -> Self {
        let cursors = CursorStore::new(state, spec.bucket.clone());
        Self {
            store,
            spec,
            cursors,
            scratch_dir: None,
        }
    }

    /// Put scratch copies under `dir` instead of the system temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    fn discoverer(&self) -> Discoverer {
        Discoverer::new(self.store.clone(), &self.spec).with_scratch_dir(self.scratch_dir.clone())
    }

    async fn selected_tables(
        &self,
        filter: &TableFilter,
    ) -> Result<Vec<DiscoveredTable>, SyncError> {
        let tables = self.discoverer().discover().await?;
        Ok(filter.apply(tables)?)
    }

    /// Definitions of the selected tables, sorted by name.
    pub async fn tables(
        &self,
        filter: &TableFilter,
    ) -> Result<Vec<Arc<TableDefinition>>, SyncError> {
        Ok(self
            .selected_tables(filter)
            .await?
            .into_iter()
            .filter_map(|t| t.definition)
            .collect())
    }

    /// Run one sync pass, sending every message to `tx`.
    ///
    /// Tables are processed in name order. A fatal error in any table stops
    /// the run before the cursor backend is flushed.
    pub async fn sync(
        &self,
        filter: &TableFilter,
        tx: mpsc::Sender<SyncMessage>,
        cancel: CancellationToken,
    ) -> Result<SyncSummary, SyncError> {
        let tables = self.selected_tables(filter).await?;
        let sink = MessageSink::new(tx, cancel.clone());

        info!(
            bucket = %self.spec.bucket,
            tables = tables.len(),
            "Starting sync"
        );

        let mut summary = SyncSummary::default();
        for table in &tables {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let stats = self.sync_table(table, &sink).await?;
            summary.add(&stats);
        }

        let flushed = self.cursors.flush().await;
        debug!(?flushed, "Flushed cursor state");

        info!(
            tables = summary.tables,
            objects = summary.objects,
            skipped = summary.skipped_objects,
            rows = summary.rows,
            "Sync completed"
        );
        Ok(summary)
    }

    async fn sync_table(
        &self,
        table: &DiscoveredTable,
        sink: &MessageSink,
    ) -> Result<TableStats, SyncError> {
        let Some(definition) = table.definition.clone() else {
            debug!(table = %table.name, "Table has no resolved schema, skipping");
            return Ok(TableStats::default());
        };

        let watermark = match self.cursors.get_cursor(&table.name).await {
            Ok(watermark) => watermark,
            Err(e) => {
                warn!(
                    table = %table.name,
                    error = %e,
                    "Failed to read cursor, doing a full sync"
                );
                Watermark::ZERO
            }
        };

        let pending = filter_objects_by_cursor(&table.objects, watermark);
        debug!(
            table = %table.name,
            cursor = %watermark,
            total = table.objects.len(),
            pending = pending.len(),
            "Filtered objects by cursor"
        );

        sink.send(SyncMessage::MigrateTable { table: definition })
            .await
            .map_err(|e| match e {
                SendError::Cancelled => SyncError::Cancelled,
                SendError::Closed => SyncError::SinkClosed,
            })?;

        let Some(newest) = max_last_modified(&pending) else {
            info!(table = %table.name, "No new objects since last sync");
            return Ok(TableStats::default());
        };

        let ctx = Arc::new(StreamContext {
            store: self.store.clone(),
            sink: sink.clone(),
            table: table.name.clone(),
            batch_rows: self.spec.batch_rows(),
            scratch_dir: self.scratch_dir.clone(),
        });
        let stats = stream_table(&ctx, pending, self.spec.concurrency()).await?;

        let cursor = self.cursors.set_cursor(&table.name, newest).await;
        info!(
            table = %table.name,
            objects = stats.objects,
            skipped = stats.skipped(),
            rows = stats.rows,
            ?cursor,
            "Table synced"
        );
        Ok(stats)
    }
}
