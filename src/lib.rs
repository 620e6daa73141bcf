//! parquet-sync library
//!
//! Host side of the Parquet source: opening the configured object store,
//! running the `tables` and `sync` commands and writing the emitted
//! messages as JSON lines.
//!
//! # CLI Usage
//!
//! ```bash
//! # List the tables a bucket would produce
//! parquet-sync tables --spec spec.yaml
//!
//! # Incremental sync of two tables into a file
//! parquet-sync sync --spec spec.yaml --state state.json \
//!   --tables logs,metrics_cpu --output out.jsonl
//!
//! # Treat a local directory as the bucket
//! parquet-sync sync --spec spec.yaml --state state.json --local-dir ./bucket
//! ```

use anyhow::Context;
use checkpoint::{FilesystemStore, KvStore, MemoryStore};
use clap::Parser;
use parquet_sync_file::{LocalStore, ObjectStore, S3Client};
use parquet_sync_source::{SourceSpec, SyncSummary, Syncer, TableFilter};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub mod sink;

/// Messages buffered between the sync and the output writer.
const CHANNEL_CAPACITY: usize = 64;

/// Source options shared by every command.
#[derive(Parser, Clone, Debug)]
pub struct SourceOpts {
    /// Source spec file (YAML or JSON)
    #[arg(long, value_name = "PATH", env = "PARQUET_SYNC_SPEC")]
    pub spec: PathBuf,

    /// Serve objects from this directory instead of S3
    #[arg(long, value_name = "DIR")]
    pub local_dir: Option<PathBuf>,

    /// Only these tables (comma-separated, `*` wildcards allowed)
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Never these tables (comma-separated, `*` wildcards allowed)
    #[arg(long, value_delimiter = ',')]
    pub skip_tables: Vec<String>,
}

impl SourceOpts {
    pub fn load_spec(&self) -> anyhow::Result<SourceSpec> {
        SourceSpec::load(&self.spec)
            .with_context(|| format!("Failed to load source spec from {:?}", self.spec))
    }

    pub fn filter(&self) -> TableFilter {
        TableFilter::new(self.tables.clone(), self.skip_tables.clone())
    }

    /// Open the object store the spec points at.
    pub async fn open_store(&self, spec: &SourceSpec) -> Arc<dyn ObjectStore> {
        match &self.local_dir {
            Some(dir) => {
                info!(dir = ?dir, bucket = %spec.bucket, "Using local directory as bucket");
                Arc::new(LocalStore::new(dir, spec.bucket.clone()))
            }
            None => Arc::new(S3Client::new(spec.s3_options()).await),
        }
    }

    async fn syncer(&self, state: Arc<dyn KvStore>) -> anyhow::Result<Syncer> {
        let spec = self.load_spec()?;
        let store = self.open_store(&spec).await;
        Ok(Syncer::new(store, spec, state))
    }
}

/// Print one JSON table definition per line to `out`.
pub async fn list_tables<W: Write>(opts: &SourceOpts, mut out: W) -> anyhow::Result<usize> {
    let syncer = opts.syncer(Arc::new(MemoryStore::new())).await?;
    let tables = syncer.tables(&opts.filter()).await?;
    for table in &tables {
        serde_json::to_writer(&mut out, table.as_ref())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(tables.len())
}

/// Run one sync pass, writing every message to `out` as a JSON line.
///
/// Cursors are kept in the JSON file at `state`.
pub async fn run_sync<W>(
    opts: &SourceOpts,
    state: PathBuf,
    out: W,
    cancel: CancellationToken,
) -> anyhow::Result<SyncSummary>
where
    W: Write + Send + 'static,
{
    let syncer = opts
        .syncer(Arc::new(FilesystemStore::new(state)))
        .await?;

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let writer = tokio::task::spawn_blocking(move || sink::write_messages(rx, out));

    let result = syncer.sync(&opts.filter(), tx, cancel).await;

    // A writer failure closes the sink, so it explains the sync error
    let lines = writer
        .await
        .context("Output writer panicked")?
        .context("Failed to write sync output")?;
    let summary = result?;

    info!(
        tables = summary.tables,
        objects = summary.objects,
        skipped = summary.skipped_objects,
        rows = summary.rows,
        lines,
        "Sync completed"
    );
    Ok(summary)
}
