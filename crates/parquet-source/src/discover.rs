//! Table discovery.
//!
//! Discovery lists the bucket, groups objects into tables by their
//! normalized directory name and resolves each table's schema from its
//! first object. Every other object of the table must have exactly the same
//! schema; a single mismatch fails the whole pass. Nothing is cached between
//! passes.

use arrow::datatypes::{Schema, SchemaRef};
use parquet_sync_file::{ObjectRecord, ObjectStore};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync_core::TableDefinition;
use tracing::{debug, info};

use crate::config::SourceSpec;
use crate::decoder;
use crate::error::{DiscoveryError, ObjectError};
use crate::naming::{key_prefix, normalize};
use crate::scratch;

/// A logical table: every object whose key normalizes to `name`.
#[derive(Debug, Clone)]
pub struct DiscoveredTable {
    pub name: String,
    /// Directory of the first member, `""` for root-level objects
    pub prefix: String,
    /// Members in listing order
    pub objects: Vec<ObjectRecord>,
    /// Authoritative schema, once resolved
    pub schema: Option<SchemaRef>,
    /// Definition advertised downstream, once resolved
    pub definition: Option<Arc<TableDefinition>>,
}

impl DiscoveredTable {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            objects: Vec::new(),
            schema: None,
            definition: None,
        }
    }

    /// Total size in bytes of all members.
    pub fn size_bytes(&self) -> i64 {
        self.objects.iter().map(|o| o.size).sum()
    }
}

/// Partition objects into tables, sorted by table name.
///
/// Objects whose key normalizes to an empty name are dropped. Different
/// directories that normalize to the same name end up in one table.
pub fn group_by_prefix(objects: &[ObjectRecord]) -> Vec<DiscoveredTable> {
    let mut tables: BTreeMap<String, DiscoveredTable> = BTreeMap::new();
    let mut merged: BTreeSet<String> = BTreeSet::new();

    for object in objects {
        let name = normalize(&object.key);
        if name.is_empty() {
            debug!(key = %object.key, "Skipping object without a usable table name");
            continue;
        }

        let prefix = key_prefix(&object.key);
        let table = tables
            .entry(name.clone())
            .or_insert_with(|| DiscoveredTable::new(name.clone(), prefix.clone()));
        if table.prefix != prefix && merged.insert(name) {
            debug!(
                table = %table.name,
                first_prefix = %table.prefix,
                other_prefix = %prefix,
                "Merging objects from different prefixes into one table"
            );
        }
        table.objects.push(object.clone());
    }

    tables.into_values().collect()
}

/// Render a schema's fields for error messages.
pub fn describe_fields(schema: &Schema) -> String {
    let fields: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| {
            if f.is_nullable() {
                format!("{}: {} (nullable)", f.name(), f.data_type())
            } else {
                format!("{}: {}", f.name(), f.data_type())
            }
        })
        .collect();
    format!("[{}]", fields.join(", "))
}

async fn fetch_schema(
    store: &dyn ObjectStore,
    key: &str,
    scratch_dir: Option<&Path>,
) -> Result<SchemaRef, ObjectError> {
    let file = scratch::fetch(store, key, scratch_dir).await?;
    let owned_key = key.to_string();
    let schema = tokio::task::spawn_blocking(move || decoder::read_schema(file.path(), &owned_key))
        .await
        .map_err(|source| ObjectError::Task {
            key: key.to_string(),
            source,
        })??;
    Ok(schema)
}

async fn read_object_schema(
    store: &dyn ObjectStore,
    key: &str,
    scratch_dir: Option<&Path>,
) -> Result<SchemaRef, DiscoveryError> {
    fetch_schema(store, key, scratch_dir)
        .await
        .map_err(|source| DiscoveryError::SchemaRead {
            key: key.to_string(),
            source,
        })
}

/// Resolve and validate the schema of one table.
///
/// The first object's schema is authoritative. The table's definition is
/// built from its fields, in order, followed by the synthetic identity
/// columns. A table without objects is left untouched.
pub async fn resolve_table(
    store: &dyn ObjectStore,
    table: &mut DiscoveredTable,
    scratch_dir: Option<&Path>,
) -> Result<(), DiscoveryError> {
    let Some(first_key) = table.objects.first().map(|o| o.key.clone()) else {
        return Ok(());
    };

    let authoritative = read_object_schema(store, &first_key, scratch_dir).await?;
    for other in table.objects.iter().skip(1) {
        let schema = read_object_schema(store, &other.key, scratch_dir).await?;
        if schema.fields() != authoritative.fields() {
            return Err(DiscoveryError::SchemaMismatch {
                table: table.name.clone(),
                first_key,
                first_fields: describe_fields(&authoritative),
                other_key: other.key.clone(),
                other_fields: describe_fields(&schema),
            });
        }
    }

    let mut definition =
        TableDefinition::from_arrow_schema(&table.name, &authoritative).incremental();
    definition.add_sync_ids()?;

    debug!(
        table = %table.name,
        objects = table.objects.len(),
        bytes = table.size_bytes(),
        columns = definition.columns.len(),
        "Resolved table schema"
    );
    table.schema = Some(authoritative);
    table.definition = Some(Arc::new(definition));
    Ok(())
}

/// Resolve every table in order, stopping at the first error.
pub async fn resolve_tables(
    store: &dyn ObjectStore,
    tables: &mut [DiscoveredTable],
    scratch_dir: Option<&Path>,
) -> Result<(), DiscoveryError> {
    for table in tables.iter_mut() {
        resolve_table(store, table, scratch_dir).await?;
    }
    Ok(())
}

/// Runs discovery passes against one store.
pub struct Discoverer {
    store: Arc<dyn ObjectStore>,
    path_prefix: Option<String>,
    file_type: String,
    scratch_dir: Option<PathBuf>,
}

impl Discoverer {
    pub fn new(store: Arc<dyn ObjectStore>, spec: &SourceSpec) -> Self {
        Self {
            store,
            path_prefix: spec.path_prefix.clone().filter(|p| !p.is_empty()),
            file_type: spec.file_type.clone(),
            scratch_dir: None,
        }
    }

    /// Put scratch copies under `dir` instead of the system temp directory.
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    /// List the objects that carry the configured file extension.
    pub async fn list_objects(&self) -> Result<Vec<ObjectRecord>, DiscoveryError> {
        let listed = self
            .store
            .list(self.path_prefix.as_deref())
            .await
            .map_err(DiscoveryError::Listing)?;
        let total = listed.len();

        let objects: Vec<ObjectRecord> = listed
            .into_iter()
            .filter(|o| o.has_extension(&self.file_type))
            .collect();
        debug!(
            bucket = %self.store.bucket(),
            "Kept {} of {} listed objects with extension .{}",
            objects.len(),
            total,
            self.file_type
        );
        Ok(objects)
    }

    /// List, group and resolve. All or nothing.
    pub async fn discover(&self) -> Result<Vec<DiscoveredTable>, DiscoveryError> {
        let objects = self.list_objects().await?;
        let mut tables = group_by_prefix(&objects);
        resolve_tables(
            self.store.as_ref(),
            &mut tables,
            self.scratch_dir.as_deref(),
        )
        .await?;

        info!(
            bucket = %self.store.bucket(),
            "Discovered {} tables from {} objects",
            tables.len(),
            objects.len()
        );
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rand::seq::SliceRandom;

    fn object(key: &str) -> ObjectRecord {
        ObjectRecord::new(key, 10, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    fn membership(tables: &[DiscoveredTable]) -> BTreeMap<String, BTreeSet<String>> {
        tables
            .iter()
            .map(|t| {
                (
                    t.name.clone(),
                    t.objects.iter().map(|o| o.key.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_group_by_prefix() {
        let objects = vec![
            object("root_file.parquet"),
            object("metrics/cpu/usage.parquet"),
            object("data/2024/file_a.parquet"),
            object("logs/access.parquet"),
            object("data/2024/file_b.parquet"),
        ];

        let tables = group_by_prefix(&objects);
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["data_2024", "logs", "metrics_cpu", "root_file"]);

        assert_eq!(tables[0].prefix, "data/2024/");
        assert_eq!(tables[0].objects.len(), 2);
        assert_eq!(tables[0].objects[0].key, "data/2024/file_a.parquet");
        assert_eq!(tables[0].size_bytes(), 20);
        assert_eq!(tables[3].prefix, "");
    }

    #[test]
    fn test_group_drops_unnamed_objects() {
        let tables = group_by_prefix(&[object("___.parquet"), object("---/x.parquet")]);
        assert!(tables.is_empty());
    }

    #[test]
    fn test_group_merges_colliding_prefixes() {
        let tables = group_by_prefix(&[
            object("my-data/a.parquet"),
            object("my_data/b.parquet"),
            object("my data/c.parquet"),
        ]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "my_data");
        assert_eq!(tables[0].prefix, "my-data/");
        assert_eq!(tables[0].objects.len(), 3);
    }

    #[test]
    fn test_group_cleans_prefixes() {
        let tables = group_by_prefix(&[
            object("data//2024/a.parquet"),
            object("data/2024/b.parquet"),
            object("data/x/../2024/c.parquet"),
        ]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "data_2024");
        assert_eq!(tables[0].prefix, "data/2024/");
        assert_eq!(tables[0].objects.len(), 3);
    }

    #[test]
    fn test_group_is_order_independent() {
        let mut objects: Vec<ObjectRecord> = [
            "a/1.parquet",
            "a/2.parquet",
            "a-/3.parquet",
            "b/c/4.parquet",
            "b_c/5.parquet",
            "top.parquet",
            "x/y/z/6.parquet",
            "___.parquet",
        ]
        .iter()
        .map(|k| object(k))
        .collect();

        let expected = membership(&group_by_prefix(&objects));
        let mut rng = rand::rng();
        for _ in 0..50 {
            objects.shuffle(&mut rng);
            let tables = group_by_prefix(&objects);
            let names: Vec<_> = tables.iter().map(|t| t.name.clone()).collect();
            let mut sorted = names.clone();
            sorted.sort();
            assert_eq!(names, sorted);
            assert_eq!(membership(&tables), expected);
        }
    }

    #[test]
    fn test_describe_fields() {
        use arrow::datatypes::{DataType, Field};
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        assert_eq!(describe_fields(&schema), "[id: Int64, name: Utf8 (nullable)]");
    }
}
