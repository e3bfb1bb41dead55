//! Store collaborator trait and an in-memory implementation.
//!
//! The finder only ever reads: it fetches single rows from the tree table and
//! range-scans tier tables. Anything offering those two calls can back it.

use anyhow::anyhow;
use std::{collections::BTreeMap, ops::Bound, sync::Arc};
use tracing::trace;

use crate::{
    config::FinderConfig,
    row::{
        child_column, data_row_key, sample_column, AGG_METHOD_COLUMN, LEAF_MARKER_COLUMN,
        RETENTION_COLUMN, ROOT_ROW,
    },
    tier::RetentionTier,
};

/// Column name to value mapping of a single row.
pub type Columns = BTreeMap<String, String>;

/// The read capabilities required from a wide-column store.
///
/// Implementations must be shareable across the worker threads that run
/// tier scans in parallel.
pub trait TreeStore: Send + Sync {
    /// Fetches one row. `Ok(None)` means the row does not exist.
    fn get_row(&self, table: &str, row_id: &str) -> anyhow::Result<Option<Columns>>;

    /// Returns every row with `start_key <= key < end_key`, in key order.
    fn scan(
        &self,
        table: &str,
        start_key: &str,
        end_key: &str,
    ) -> anyhow::Result<Vec<(String, Columns)>>;
}

impl<S: TreeStore + ?Sized> TreeStore for Arc<S> {
    fn get_row(&self, table: &str, row_id: &str) -> anyhow::Result<Option<Columns>> {
        (**self).get_row(table, row_id)
    }

    fn scan(
        &self,
        table: &str,
        start_key: &str,
        end_key: &str,
    ) -> anyhow::Result<Vec<(String, Columns)>> {
        (**self).scan(table, start_key, end_key)
    }
}

/// An in-memory store: one ordered row map per table.
///
/// Tree rows are addressed by their dotted path, with the synthetic `ROOT`
/// row at the top. Parents reference children through `t::c_<name>` columns.
#[derive(Debug, Clone)]
pub struct MemStore {
    tables: BTreeMap<String, BTreeMap<String, Columns>>,
    meta_table: String,
    bucket_seconds: i64,
}

/// Creates an empty in-memory store laid out for `config`.
pub fn memory_store(config: &FinderConfig) -> MemStore {
    MemStore::new(config)
}

impl MemStore {
    pub fn new(config: &FinderConfig) -> Self {
        Self {
            tables: BTreeMap::new(),
            meta_table: config.meta_table_name(),
            bucket_seconds: config.bucket_seconds,
        }
    }

    /// Replaces a row wholesale.
    pub fn put_row(&mut self, table: &str, row_id: &str, columns: Columns) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(row_id.to_string(), columns);
    }

    /// Sets a single column, creating the row if needed.
    pub fn put_column(&mut self, table: &str, row_id: &str, column: &str, value: &str) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .entry(row_id.to_string())
            .or_default()
            .insert(column.to_string(), value.to_string());
    }

    pub fn remove_row(&mut self, table: &str, row_id: &str) -> Option<Columns> {
        self.tables.get_mut(table)?.remove(row_id)
    }

    /// Creates the branch rows for every prefix of `path`, linking each to its
    /// parent. Returns the row id of the deepest branch.
    pub fn add_branch(&mut self, path: &str) -> String {
        let meta = self.meta_table.clone();
        let mut parent = ROOT_ROW.to_string();
        self.tables
            .entry(meta.clone())
            .or_default()
            .entry(parent.clone())
            .or_default();

        let mut current = String::new();
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('.');
            }
            current.push_str(segment);
            self.put_column(&meta, &parent, &child_column(segment), &current);
            self.tables
                .entry(meta.clone())
                .or_default()
                .entry(current.clone())
                .or_default();
            parent = current.clone();
        }
        trace!(path, row_id = %parent, "Added branch rows");
        parent
    }

    /// Creates a leaf row at `path` (and its ancestors) carrying retention and
    /// aggregation metadata. Returns the leaf's row id.
    pub fn add_leaf(&mut self, path: &str, retentions: &[RetentionTier], method: &str) -> String {
        let row_id = self.add_branch(path);
        let spec: Vec<(i64, i64)> = retentions.iter().map(|r| (r.step, r.points)).collect();
        let meta = self.meta_table.clone();
        self.put_column(&meta, &row_id, LEAF_MARKER_COLUMN, "1");
        // Serializing a list of integer pairs cannot fail.
        let payload = serde_json::to_string(&spec).unwrap_or_else(|_| "[]".to_string());
        self.put_column(&meta, &row_id, RETENTION_COLUMN, &payload);
        self.put_column(&meta, &row_id, AGG_METHOD_COLUMN, method);
        row_id
    }

    /// Writes one raw sample into a tier table, bucketed the way tier scans
    /// expect to find it.
    pub fn put_sample(&mut self, table: &str, metric_id: &str, timestamp: i64, value: f64) {
        let bucket = timestamp - timestamp.rem_euclid(self.bucket_seconds);
        let key = data_row_key(metric_id, bucket);
        self.put_column(table, &key, &sample_column(timestamp), &value.to_string());
    }

    pub fn meta_table(&self) -> &str {
        &self.meta_table
    }
}

impl TreeStore for MemStore {
    fn get_row(&self, table: &str, row_id: &str) -> anyhow::Result<Option<Columns>> {
        Ok(self
            .tables
            .get(table)
            .and_then(|rows| rows.get(row_id))
            .cloned())
    }

    fn scan(
        &self,
        table: &str,
        start_key: &str,
        end_key: &str,
    ) -> anyhow::Result<Vec<(String, Columns)>> {
        if start_key > end_key {
            return Err(anyhow!(
                "Scan start key '{}' is after end key '{}'",
                start_key,
                end_key
            ));
        }
        let rows = match self.tables.get(table) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };
        Ok(rows
            .range::<str, _>((Bound::Included(start_key), Bound::Excluded(end_key)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_leaf_links_every_ancestor() {
        let config = FinderConfig::default();
        let mut store = memory_store(&config);
        let row_id = store.add_leaf(
            "Platform.MySQL.qps",
            &[RetentionTier::new(60, 1440)],
            "avg",
        );
        assert_eq!(row_id, "Platform.MySQL.qps");

        let root = store.get_row("meta", ROOT_ROW).unwrap().unwrap();
        assert_eq!(root.get("t::c_Platform").map(String::as_str), Some("Platform"));

        let mysql = store.get_row("meta", "Platform.MySQL").unwrap().unwrap();
        assert_eq!(
            mysql.get("t::c_qps").map(String::as_str),
            Some("Platform.MySQL.qps")
        );

        let leaf = store.get_row("meta", &row_id).unwrap().unwrap();
        assert_eq!(leaf.get(RETENTION_COLUMN).map(String::as_str), Some("[[60,1440]]"));
        assert_eq!(leaf.get(AGG_METHOD_COLUMN).map(String::as_str), Some("avg"));
        assert!(leaf.contains_key(LEAF_MARKER_COLUMN));
    }

    #[test]
    fn scan_end_key_is_exclusive() {
        let mut store = memory_store(&FinderConfig::default());
        store.put_sample("t", "m", 1_700_000_000, 1.0);
        store.put_sample("t", "m", 1_700_007_200, 2.0);

        let first_bucket = 1_700_000_000 - 1_700_000_000 % 7200;
        let rows = store
            .scan(
                "t",
                &data_row_key("m", first_bucket),
                &data_row_key("m", first_bucket + 7200),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, data_row_key("m", first_bucket));
    }

    #[test]
    fn missing_table_and_row_are_absent() {
        let store = memory_store(&FinderConfig::default());
        assert!(store.get_row("meta", "nope").unwrap().is_none());
        assert!(store.scan("nope", "a", "b").unwrap().is_empty());
    }
}
