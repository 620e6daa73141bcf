//! Messages emitted by a sync run.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use crate::schema::TableDefinition;

/// A message delivered to the downstream sink.
///
/// For any given table, its `MigrateTable` is always sent before the first
/// `Insert`. Inserts from different objects of one table may interleave.
#[derive(Debug, Clone)]
pub enum SyncMessage {
    /// Advertises (or re-advertises) the schema of a table.
    MigrateTable { table: Arc<TableDefinition> },

    /// A batch of rows for a previously announced table.
    Insert { table: String, record: RecordBatch },
}

impl SyncMessage {
    /// Name of the table this message belongs to.
    pub fn table_name(&self) -> &str {
        match self {
            SyncMessage::MigrateTable { table } => &table.name,
            SyncMessage::Insert { table, .. } => table,
        }
    }

    /// Number of rows carried by the message (zero for migrations).
    pub fn num_rows(&self) -> usize {
        match self {
            SyncMessage::MigrateTable { .. } => 0,
            SyncMessage::Insert { record, .. } => record.num_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow_schema::{DataType, Field, Schema};

    #[test]
    fn test_message_accessors() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let record =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])
                .unwrap();

        let migrate = SyncMessage::MigrateTable {
            table: Arc::new(TableDefinition::from_arrow_schema("events", &schema)),
        };
        let insert = SyncMessage::Insert {
            table: "events".to_string(),
            record,
        };

        assert_eq!(migrate.table_name(), "events");
        assert_eq!(migrate.num_rows(), 0);
        assert_eq!(insert.table_name(), "events");
        assert_eq!(insert.num_rows(), 3);
    }
}
