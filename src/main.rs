//! Command-line interface for parquet-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Show the table definitions discovered in a bucket
//! parquet-sync tables --spec spec.yaml --skip-tables 'tmp_*'
//!
//! # Sync everything new since the last run, messages on stdout
//! parquet-sync sync --spec spec.yaml --state .parquet-sync-state.json
//! ```
//!
//! Logs go to stderr and are controlled with `RUST_LOG`, e.g.
//! `RUST_LOG=parquet_sync_source=debug`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use parquet_sync::SourceOpts;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Parser)]
#[command(name = "parquet-sync")]
#[command(about = "A tool for syncing Parquet tables from S3 buckets")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tables discovered in the bucket as JSON lines
    Tables {
        #[command(flatten)]
        source: SourceOpts,
    },

    /// Sync new objects of every selected table
    Sync {
        #[command(flatten)]
        source: SourceOpts,

        /// JSON file holding the per-table cursors
        #[arg(long, value_name = "PATH", default_value = ".parquet-sync-state.json")]
        state: PathBuf,

        /// Write messages to this file instead of stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing; stdout carries the messages
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tables { source } => {
            parquet_sync::list_tables(&source, io::stdout().lock()).await?;
        }
        Commands::Sync {
            source,
            state,
            output,
        } => {
            let out: Box<dyn Write + Send> = match &output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path)
                        .with_context(|| format!("Failed to create output file {path:?}"))?,
                )),
                None => Box::new(BufWriter::new(io::stdout())),
            };

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping sync");
                    on_signal.cancel();
                }
            });

            parquet_sync::run_sync(&source, state, out, cancel).await?;
        }
    }

    Ok(())
}
