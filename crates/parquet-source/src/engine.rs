//! Concurrent per-object streaming for one table.
//!
//! Each object is downloaded to a scratch file, decoded on a blocking
//! thread and forwarded batch by batch to the sink. A per-object channel of
//! depth 1 sits between the decoder and the sink, so decoding never runs
//! more than one batch ahead of delivery.
//!
//! Objects run one at a time, through a bounded pool, or all at once (see
//! [`Concurrency`]). The first fatal object error stops admission of new
//! objects; objects already running finish, and their delivered batches
//! stay delivered.

use arrow::record_batch::RecordBatch;
use parquet_sync_file::{ObjectRecord, ObjectStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use sync_core::SyncMessage;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::ErrorClass;
use crate::config::Concurrency;
use crate::decoder::{self, DecodeError};
use crate::error::{ObjectError, SyncError};
use crate::scratch;
use crate::sink::{MessageSink, SendError};

/// Everything an object task needs, shared by all tasks of a table.
pub struct StreamContext {
    pub store: Arc<dyn ObjectStore>,
    pub sink: MessageSink,
    pub table: String,
    /// Rows per emitted batch
    pub batch_rows: usize,
    /// Where scratch copies go; the system temp directory when `None`
    pub scratch_dir: Option<PathBuf>,
}

impl StreamContext {
    fn cancel(&self) -> &CancellationToken {
        self.sink.cancel_token()
    }

    fn table_error(&self, key: String, error: ObjectError) -> SyncError {
        match error {
            ObjectError::Cancelled { .. } => SyncError::Cancelled,
            source => SyncError::Table {
                table: self.table.clone(),
                key,
                source,
            },
        }
    }
}

/// Counters for one table's streaming pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Objects streamed to completion
    pub objects: usize,
    pub vanished: usize,
    pub malformed: usize,
    pub rows: u64,
}

impl TableStats {
    pub fn skipped(&self) -> usize {
        self.vanished + self.malformed
    }

    fn record(&mut self, outcome: ObjectOutcome) {
        match outcome {
            ObjectOutcome::Streamed { rows } => {
                self.objects += 1;
                self.rows += rows;
            }
            ObjectOutcome::Skipped(ErrorClass::Vanished) => self.vanished += 1,
            ObjectOutcome::Skipped(_) => self.malformed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ObjectOutcome {
    Streamed { rows: u64 },
    Skipped(ErrorClass),
}

/// Stream every object of a table into the sink.
pub async fn stream_table(
    ctx: &Arc<StreamContext>,
    objects: Vec<ObjectRecord>,
    concurrency: Concurrency,
) -> Result<TableStats, SyncError> {
    debug!(
        table = %ctx.table,
        objects = objects.len(),
        ?concurrency,
        "Streaming table"
    );
    match concurrency {
        Concurrency::Sequential => stream_sequential(ctx, objects).await,
        Concurrency::Bounded(limit) => {
            ObjectPool::new(ctx.clone(), Some(limit.max(1)))
                .run(objects)
                .await
        }
        Concurrency::Unbounded => ObjectPool::new(ctx.clone(), None).run(objects).await,
    }
}

async fn stream_sequential(
    ctx: &StreamContext,
    objects: Vec<ObjectRecord>,
) -> Result<TableStats, SyncError> {
    let mut stats = TableStats::default();
    for object in objects {
        if ctx.cancel().is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        match run_object(ctx, &object).await {
            Ok(outcome) => stats.record(outcome),
            Err(e) => return Err(ctx.table_error(object.key, e)),
        }
    }
    Ok(stats)
}

/// First fatal error of a pool; later errors are only logged.
#[derive(Default)]
struct FirstError(Mutex<Option<(String, ObjectError)>>);

impl FirstError {
    fn latch(&self, key: String, error: ObjectError) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some((key, error));
        } else {
            debug!(key = %key, error = %error, "Dropping error after first failure");
        }
    }

    fn is_set(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn take(&self) -> Option<(String, ObjectError)> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Worker pool for one `stream_table` call.
struct ObjectPool {
    ctx: Arc<StreamContext>,
    /// `None` when unbounded
    permits: Option<Arc<Semaphore>>,
    failure: Arc<FirstError>,
    tasks: JoinSet<Option<ObjectOutcome>>,
    keys: HashMap<Id, String>,
    stats: TableStats,
}

impl ObjectPool {
    fn new(ctx: Arc<StreamContext>, limit: Option<usize>) -> Self {
        Self {
            ctx,
            permits: limit.map(|n| Arc::new(Semaphore::new(n))),
            failure: Arc::new(FirstError::default()),
            tasks: JoinSet::new(),
            keys: HashMap::new(),
            stats: TableStats::default(),
        }
    }

    async fn run(mut self, objects: Vec<ObjectRecord>) -> Result<TableStats, SyncError> {
        let cancel = self.ctx.cancel().clone();
        let mut cancelled = false;

        for object in objects {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if self.failure.is_set() {
                break;
            }

            let permit = match &self.permits {
                None => None,
                Some(permits) => {
                    let acquired = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            cancelled = true;
                            break;
                        }
                        permit = permits.clone().acquire_owned() => permit,
                    };
                    // The semaphore is never closed
                    let Ok(permit) = acquired else { break };
                    Some(permit)
                }
            };

            // A task may have failed while admission was blocked
            if self.failure.is_set() {
                break;
            }
            self.spawn(object, permit);
        }

        self.drain().await;

        if let Some((key, error)) = self.failure.take() {
            return Err(self.ctx.table_error(key, error));
        }
        if cancelled {
            return Err(SyncError::Cancelled);
        }
        Ok(self.stats)
    }

    fn spawn(&mut self, object: ObjectRecord, permit: Option<OwnedSemaphorePermit>) {
        let ctx = self.ctx.clone();
        let failure = self.failure.clone();
        let key = object.key.clone();

        let handle = self.tasks.spawn(async move {
            let _permit = permit;
            match run_object(&ctx, &object).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    failure.latch(object.key, e);
                    None
                }
            }
        });
        self.keys.insert(handle.id(), key);
    }

    /// Wait for every admitted task.
    async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    self.keys.remove(&id);
                    if let Some(outcome) = outcome {
                        self.stats.record(outcome);
                    }
                }
                Err(e) => {
                    let key = self.keys.remove(&e.id()).unwrap_or_default();
                    self.failure.latch(
                        key.clone(),
                        ObjectError::Task { key, source: e },
                    );
                }
            }
        }
    }
}

/// Stream one object and classify its failure, if any.
async fn run_object(
    ctx: &StreamContext,
    object: &ObjectRecord,
) -> Result<ObjectOutcome, ObjectError> {
    let error = match stream_object(ctx, object).await {
        Ok(rows) => {
            debug!(table = %ctx.table, key = %object.key, rows, "Object streamed");
            return Ok(ObjectOutcome::Streamed { rows });
        }
        Err(e) => e,
    };

    match ErrorClass::of(&error) {
        ErrorClass::Vanished => {
            warn!(
                table = %ctx.table,
                key = %object.key,
                "Object disappeared after listing, skipping"
            );
            Ok(ObjectOutcome::Skipped(ErrorClass::Vanished))
        }
        ErrorClass::Malformed => {
            warn!(
                table = %ctx.table,
                key = %object.key,
                error = %error,
                "Skipping malformed file"
            );
            Ok(ObjectOutcome::Skipped(ErrorClass::Malformed))
        }
        ErrorClass::Fatal => Err(error),
    }
}

async fn stream_object(ctx: &StreamContext, object: &ObjectRecord) -> Result<u64, ObjectError> {
    let file = scratch::fetch(ctx.store.as_ref(), &object.key, ctx.scratch_dir.as_deref()).await?;

    let (tx, mut rx) = mpsc::channel::<RecordBatch>(1);
    let key = object.key.clone();
    let batch_rows = ctx.batch_rows;
    let decode = tokio::task::spawn_blocking(move || -> Result<(), DecodeError> {
        let reader = decoder::open_batches(file.path(), &key, batch_rows)?;
        for batch in reader {
            let batch = batch.map_err(|source| DecodeError::Read {
                key: key.clone(),
                source,
            })?;
            if tx.blocking_send(batch).is_err() {
                // Delivery stopped
                break;
            }
        }
        Ok(())
    });

    let mut rows = 0u64;
    let mut delivered = Ok(());
    while let Some(record) = rx.recv().await {
        let batch_rows = record.num_rows() as u64;
        let message = SyncMessage::Insert {
            table: ctx.table.clone(),
            record,
        };
        if let Err(e) = ctx.sink.send(message).await {
            let key = object.key.clone();
            delivered = Err(match e {
                SendError::Cancelled => ObjectError::Cancelled { key },
                SendError::Closed => ObjectError::SinkClosed { key },
            });
            break;
        }
        rows += batch_rows;
    }
    // Unblocks the decoder if delivery stopped early
    drop(rx);

    let decoded = decode.await.map_err(|source| ObjectError::Task {
        key: object.key.clone(),
        source,
    })?;
    delivered?;
    decoded?;
    Ok(rows)
}
