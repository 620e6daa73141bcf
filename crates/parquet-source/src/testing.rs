//! In-memory object store and Parquet fixtures for unit tests.

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet_sync_file::{ObjectRecord, ObjectStore, ObjectStoreError};
use rand::Rng;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// Encode `rows` rows as Parquet. `wide` adds an extra column.
pub(crate) fn parquet_bytes(rows: i64, wide: bool) -> Vec<u8> {
    let mut fields = vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ];
    let mut columns: Vec<arrow::array::ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(0..rows)),
        Arc::new(StringArray::from_iter_values(
            (0..rows).map(|i| format!("name-{i}")),
        )),
    ];
    if wide {
        fields.push(Field::new("score", DataType::Int64, true));
        columns.push(Arc::new(Int64Array::from_iter_values(0..rows)));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let mut writer = ArrowWriter::try_new(Vec::new(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.into_inner().unwrap()
}

enum Behavior {
    Serve(Vec<u8>),
    /// Serve once, then fail with the message
    ServeOnce(Vec<u8>, String),
    Missing,
    Fail(String),
}

struct MockObject {
    record: ObjectRecord,
    behavior: Behavior,
}

/// Object store kept in memory that records fetch concurrency.
#[derive(Default)]
pub(crate) struct MockStore {
    objects: Mutex<BTreeMap<String, MockObject>>,
    max_delay_ms: u64,
    barrier: Option<Barrier>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sleep a random 0..=`ms` milliseconds in every successful fetch.
    pub(crate) fn with_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Hold every fetch until `n` fetches are in flight.
    pub(crate) fn with_barrier(mut self, n: usize) -> Self {
        self.barrier = Some(Barrier::new(n));
        self
    }

    fn put(&self, key: &str, last_modified: DateTime<Utc>, behavior: Behavior) -> ObjectRecord {
        let size = match &behavior {
            Behavior::Serve(body) | Behavior::ServeOnce(body, _) => body.len() as i64,
            _ => 0,
        };
        let record = ObjectRecord::new(key, size, last_modified);
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                record: record.clone(),
                behavior,
            },
        );
        record
    }

    pub(crate) fn insert(
        &self,
        key: &str,
        last_modified: DateTime<Utc>,
        body: Vec<u8>,
    ) -> ObjectRecord {
        self.put(key, last_modified, Behavior::Serve(body))
    }

    /// Listed, but gone by the time it is fetched.
    pub(crate) fn insert_missing(&self, key: &str, last_modified: DateTime<Utc>) -> ObjectRecord {
        self.put(key, last_modified, Behavior::Missing)
    }

    pub(crate) fn insert_failing(
        &self,
        key: &str,
        last_modified: DateTime<Utc>,
        message: &str,
    ) -> ObjectRecord {
        self.put(key, last_modified, Behavior::Fail(message.to_string()))
    }

    /// Readable during discovery, failing when streamed.
    pub(crate) fn insert_serve_once(
        &self,
        key: &str,
        last_modified: DateTime<Utc>,
        body: Vec<u8>,
        message: &str,
    ) -> ObjectRecord {
        self.put(
            key,
            last_modified,
            Behavior::ServeOnce(body, message.to_string()),
        )
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn fetch_inner(&self, key: &str, dest: &Path) -> Result<u64, ObjectStoreError> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        let body = {
            let mut objects = self.objects.lock().unwrap();
            let Some(object) = objects.get_mut(key) else {
                return Err(ObjectStoreError::NotFound {
                    bucket: "mock".to_string(),
                    key: key.to_string(),
                });
            };
            match &object.behavior {
                Behavior::Serve(body) => body.clone(),
                Behavior::ServeOnce(body, message) => {
                    let body = body.clone();
                    object.behavior = Behavior::Fail(message.clone());
                    body
                }
                Behavior::Fail(message) => {
                    return Err(ObjectStoreError::Get {
                        key: key.to_string(),
                        message: message.clone(),
                    })
                }
                Behavior::Missing => {
                    return Err(ObjectStoreError::NotFound {
                        bucket: "mock".to_string(),
                        key: key.to_string(),
                    })
                }
            }
        };

        if self.max_delay_ms > 0 {
            let ms = rand::rng().random_range(0..=self.max_delay_ms);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        tokio::fs::write(dest, &body)
            .await
            .map_err(|source| ObjectStoreError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
        Ok(body.len() as u64)
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn bucket(&self) -> &str {
        "mock"
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectRecord>, ObjectStoreError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .values()
            .filter(|o| prefix.is_none_or(|p| o.record.key.starts_with(p)))
            .map(|o| o.record.clone())
            .collect())
    }

    async fn fetch_to(&self, key: &str, dest: &Path) -> Result<u64, ObjectStoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.fetch_inner(key, dest).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
