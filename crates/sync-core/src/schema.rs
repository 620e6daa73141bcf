//! Table schema definitions for the parquet-sync framework.
//!
//! A [`TableDefinition`] is what a sync advertises to the downstream sink
//! before any rows of that table are delivered. Columns are derived from
//! the Arrow schema of the table's first file, followed by the synthetic
//! identity columns the sink relies on to key rows.

use arrow_schema::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A source column collides with a synthetic identity column
    #[error("Column '{column}' in table '{table}' is reserved for sync identity")]
    ReservedColumn { table: String, column: String },
}

/// Synthetic unique identity column appended to every table.
pub const SYNC_ID_COLUMN: &str = "_sync_id";

/// Synthetic parent identity column appended to every table.
pub const SYNC_PARENT_ID_COLUMN: &str = "_sync_parent_id";

// ============================================================================
// Column / Table Definitions
// ============================================================================

/// Column definition.
///
/// This type represents a single column of a discovered table,
/// including its name, Arrow type, and constraints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Arrow data type of the column
    #[serde(rename = "type")]
    pub data_type: DataType,

    /// Whether this column is nullable
    #[serde(default)]
    pub nullable: bool,

    /// Whether this column is part of the primary key
    #[serde(default)]
    pub primary_key: bool,

    /// Whether values in this column are unique
    #[serde(default)]
    pub unique: bool,
}

impl ColumnDefinition {
    /// Create a new non-nullable column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            primary_key: false,
            unique: false,
        }
    }

    /// Create a new nullable column definition.
    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, data_type)
        }
    }

    /// Build a column from an Arrow field, keeping its name, type and nullability.
    pub fn from_field(field: &Field) -> Self {
        Self {
            nullable: field.is_nullable(),
            ..Self::new(field.name().clone(), field.data_type().clone())
        }
    }
}

/// Table schema definition advertised to the sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDefinition {
    /// Table name
    pub name: String,

    /// Column definitions, in source field order
    pub columns: Vec<ColumnDefinition>,

    /// Whether the table is synced incrementally (cursor based)
    #[serde(default)]
    pub is_incremental: bool,
}

impl TableDefinition {
    /// Create a new table definition.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
            is_incremental: false,
        }
    }

    /// Build a table definition from the fields of an Arrow schema, in field order.
    pub fn from_arrow_schema(name: impl Into<String>, schema: &Schema) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|field| ColumnDefinition::from_field(field))
            .collect();
        Self::new(name, columns)
    }

    /// Mark the table as incrementally synced.
    pub fn incremental(mut self) -> Self {
        self.is_incremental = true;
        self
    }

    /// Append the synthetic identity columns.
    ///
    /// `_sync_id` is a unique, non-null UUID string; `_sync_parent_id` is a
    /// nullable UUID string. The sink fills both when rows are written.
    /// Fails if the source already defines a column with either name.
    pub fn add_sync_ids(&mut self) -> Result<(), SchemaError> {
        for reserved in [SYNC_ID_COLUMN, SYNC_PARENT_ID_COLUMN] {
            if self.get_column(reserved).is_some() {
                return Err(SchemaError::ReservedColumn {
                    table: self.name.clone(),
                    column: reserved.to_string(),
                });
            }
        }

        let mut id = ColumnDefinition::new(SYNC_ID_COLUMN, DataType::Utf8);
        id.unique = true;
        self.columns.push(id);
        self.columns.push(ColumnDefinition::nullable(
            SYNC_PARENT_ID_COLUMN,
            DataType::Utf8,
        ));
        Ok(())
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get all column names, in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ])
    }

    #[test]
    fn test_column_definition_serde() {
        let col = ColumnDefinition::nullable("email", DataType::Utf8);

        let json = serde_json::to_string(&col).unwrap();
        let parsed: ColumnDefinition = serde_json::from_str(&json).unwrap();

        assert_eq!(col, parsed);
    }

    #[test]
    fn test_from_arrow_schema_keeps_field_order() {
        let table = TableDefinition::from_arrow_schema("users", &sample_schema());

        assert_eq!(table.column_names(), vec!["id", "name", "score"]);
        assert!(!table.get_column("id").unwrap().nullable);
        assert!(table.get_column("name").unwrap().nullable);
        assert_eq!(table.get_column("score").unwrap().data_type, DataType::Float64);
    }

    #[test]
    fn test_add_sync_ids_appends_after_source_columns() {
        let mut table = TableDefinition::from_arrow_schema("users", &sample_schema()).incremental();
        tokio_test::assert_ok!(table.add_sync_ids());

        assert!(table.is_incremental);
        assert_eq!(
            table.column_names(),
            vec!["id", "name", "score", SYNC_ID_COLUMN, SYNC_PARENT_ID_COLUMN]
        );

        let id = table.get_column(SYNC_ID_COLUMN).unwrap();
        assert!(id.unique);
        assert!(!id.nullable);
        assert!(table.get_column(SYNC_PARENT_ID_COLUMN).unwrap().nullable);
    }

    #[test]
    fn test_add_sync_ids_rejects_reserved_source_column() {
        let schema = Schema::new(vec![Field::new(SYNC_ID_COLUMN, DataType::Utf8, false)]);
        let mut table = TableDefinition::from_arrow_schema("clash", &schema);

        let err = table.add_sync_ids().unwrap_err();
        assert!(matches!(err, SchemaError::ReservedColumn { .. }));
    }

    #[test]
    fn test_nested_types_survive() {
        let schema = Schema::new(vec![Field::new(
            "tags",
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            true,
        )]);
        let table = TableDefinition::from_arrow_schema("nested", &schema);
        assert!(matches!(
            table.get_column("tags").unwrap().data_type,
            DataType::List(_)
        ));
    }
}
