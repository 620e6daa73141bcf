//! Parquet access for a single local file.
//!
//! Both entry points do blocking file I/O and must run off the async
//! runtime (see `tokio::task::spawn_blocking`).

use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::errors::ParquetError;
use std::fs::File;
use std::path::Path;

/// Error type for decoding one object.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The file could not be opened as Parquet (bad magic, corrupt footer, ...)
    #[error("failed to open parquet file {key}: {source}")]
    Open {
        key: String,
        #[source]
        source: ParquetError,
    },

    /// A row group could not be decoded
    #[error("error reading records from {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: ArrowError,
    },

    #[error("failed to open scratch copy of {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

fn builder(
    path: &Path,
    key: &str,
) -> Result<ParquetRecordBatchReaderBuilder<File>, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Io {
        key: key.to_string(),
        source,
    })?;
    ParquetRecordBatchReaderBuilder::try_new(file).map_err(|source| DecodeError::Open {
        key: key.to_string(),
        source,
    })
}

/// Read the Arrow schema from the file footer without decoding any rows.
pub fn read_schema(path: &Path, key: &str) -> Result<SchemaRef, DecodeError> {
    Ok(builder(path, key)?.schema().clone())
}

/// Open a lazy reader yielding batches of at most `batch_rows` rows.
pub fn open_batches(
    path: &Path,
    key: &str,
    batch_rows: usize,
) -> Result<ParquetRecordBatchReader, DecodeError> {
    builder(path, key)?
        .with_batch_size(batch_rows.max(1))
        .build()
        .map_err(|source| DecodeError::Open {
            key: key.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_fixture(path: &Path, rows: i64) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from_iter_values(0..rows)),
                Arc::new(StringArray::from_iter_values(
                    (0..rows).map(|i| format!("row-{i}")),
                )),
            ],
        )
        .unwrap();

        let mut writer = ArrowWriter::try_new(File::create(path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_read_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.parquet");
        write_fixture(&path, 3);

        let schema = read_schema(&path, "f.parquet").unwrap();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert!(!schema.field(0).is_nullable());
    }

    #[test]
    fn test_open_batches_respects_batch_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.parquet");
        write_fixture(&path, 25);

        let sizes: Vec<usize> = open_batches(&path, "f.parquet", 10)
            .unwrap()
            .map(|b| b.unwrap().num_rows())
            .collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn test_garbage_is_open_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"this is definitely not parquet data").unwrap();

        let err = read_schema(&path, "bad.parquet").unwrap_err();
        assert!(matches!(err, DecodeError::Open { .. }));
        assert!(err
            .to_string()
            .starts_with("failed to open parquet file bad.parquet"));
    }

    #[test]
    fn test_missing_scratch_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_schema(&dir.path().join("nope"), "nope").unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }
}
