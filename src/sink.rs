//! JSON-lines rendering of sync messages.
//!
//! Every message becomes one line:
//!
//! ```text
//! {"type":"migrate_table","table":"logs","definition":{"name":"logs","columns":[...],"is_incremental":true}}
//! {"type":"insert","table":"logs","rows":2,"records":[{"id":1},{"id":2}]}
//! ```

use anyhow::Context;
use arrow::json::ArrayWriter;
use arrow::record_batch::RecordBatch;
use serde_json::{json, Value};
use std::io::Write;
use sync_core::SyncMessage;
use tokio::sync::mpsc;

/// Render a record batch as a JSON array of row objects. Null values are omitted.
pub fn batch_to_json(batch: &RecordBatch) -> anyhow::Result<Value> {
    let mut writer = ArrayWriter::new(Vec::new());
    writer
        .write(batch)
        .context("Failed to encode record batch as JSON")?;
    writer.finish().context("Failed to finish JSON array")?;
    let bytes = writer.into_inner();
    serde_json::from_slice(&bytes).context("Record batch produced invalid JSON")
}

pub fn message_to_json(message: &SyncMessage) -> anyhow::Result<Value> {
    match message {
        SyncMessage::MigrateTable { table } => Ok(json!({
            "type": "migrate_table",
            "table": table.name,
            "definition": table.as_ref(),
        })),
        SyncMessage::Insert { table, record } => Ok(json!({
            "type": "insert",
            "table": table,
            "rows": record.num_rows(),
            "records": batch_to_json(record)?,
        })),
    }
}

/// Writes messages to `out`, one JSON document per line.
pub struct JsonLinesWriter<W: Write> {
    out: W,
    lines: u64,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    pub fn write_message(&mut self, message: &SyncMessage) -> anyhow::Result<()> {
        let value = message_to_json(message)?;
        serde_json::to_writer(&mut self.out, &value).context("Failed to write message")?;
        self.out
            .write_all(b"\n")
            .context("Failed to write message")?;
        self.lines += 1;
        Ok(())
    }

    /// Lines written so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> anyhow::Result<W> {
        self.out.flush().context("Failed to flush output")?;
        Ok(self.out)
    }
}

/// Drain `rx` into `out` until every sender is dropped, returning the
/// number of lines written.
///
/// Blocks the calling thread; run it on a blocking task. Returning early
/// with an error drops `rx`, which the sync observes as a closed sink.
pub fn write_messages<W: Write>(
    mut rx: mpsc::Receiver<SyncMessage>,
    out: W,
) -> anyhow::Result<u64> {
    let mut writer = JsonLinesWriter::new(out);
    while let Some(message) = rx.blocking_recv() {
        writer.write_message(&message)?;
    }
    let lines = writer.lines();
    writer.finish()?;
    Ok(lines)
}
