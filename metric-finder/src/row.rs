//! Column conventions of tree rows and tier data rows.
use std::collections::BTreeMap;
use tracing::trace;

use crate::{
    aggregation::AggregationMethod,
    error::{FinderError, Result},
    store::Columns,
    tier::RetentionTier,
};

/// Row id of the synthetic tree root.
pub const ROOT_ROW: &str = "ROOT";

/// Presence marks the row as a leaf.
pub const LEAF_MARKER_COLUMN: &str = "t::NODE";
/// JSON list of `[secondsPerPoint, points]` pairs.
pub const RETENTION_COLUMN: &str = "t::AGG";
/// Aggregation method name.
pub const AGG_METHOD_COLUMN: &str = "t::AGG_METHOD";
/// Prefix of child entry columns; the remainder is the child's segment name.
pub const CHILD_PREFIX: &str = "t::c_";

/// Column family of tier data rows; qualifiers are sample timestamps.
pub const DATA_FAMILY: &str = "d:";

pub fn child_column(segment: &str) -> String {
    format!("{CHILD_PREFIX}{segment}")
}

pub fn data_row_key(metric_id: &str, bucket_start: i64) -> String {
    format!("{metric_id}:{bucket_start}")
}

pub fn sample_column(timestamp: i64) -> String {
    format!("{DATA_FAMILY}{timestamp}")
}

/// Extracts the sample timestamp from a data column qualifier.
pub fn parse_sample_column(column: &str) -> Option<i64> {
    column.strip_prefix(DATA_FAMILY)?.parse().ok()
}

/// Leaf metadata stored on a tree row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafMeta {
    pub retentions: Vec<RetentionTier>,
    pub method: AggregationMethod,
}

/// A decoded tree row. A row may carry both leaf metadata and children; the
/// resolver tolerates that even though writers never produce it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeRow {
    pub leaf_marker: Option<String>,
    pub retention: Option<String>,
    pub method: Option<String>,
    /// Child segment name to child row id.
    pub children: BTreeMap<String, String>,
}

impl TreeRow {
    pub fn from_columns(columns: &Columns) -> Self {
        let mut row = TreeRow::default();
        for (name, value) in columns {
            match name.as_str() {
                LEAF_MARKER_COLUMN => row.leaf_marker = Some(value.clone()),
                RETENTION_COLUMN => row.retention = Some(value.clone()),
                AGG_METHOD_COLUMN => row.method = Some(value.clone()),
                other => match other.strip_prefix(CHILD_PREFIX) {
                    Some(child) if !child.is_empty() => {
                        row.children.insert(child.to_string(), value.clone());
                    }
                    _ => trace!(column = other, "Ignoring unrecognized tree column"),
                },
            }
        }
        row
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf_marker.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_marker.is_none()
            && self.retention.is_none()
            && self.method.is_none()
            && self.children.is_empty()
    }

    /// Parses the leaf metadata. Fails when the row is a leaf whose retention
    /// payload is missing or malformed; a missing method defaults to `avg`.
    pub fn leaf_meta(&self, row_id: &str) -> Result<Option<LeafMeta>> {
        if !self.is_leaf() {
            return Ok(None);
        }
        let payload = self
            .retention
            .as_deref()
            .ok_or_else(|| FinderError::InvalidRetention {
                row_id: row_id.to_string(),
                reason: "missing retention column".to_string(),
            })?;
        let retentions = parse_retentions(payload).map_err(|reason| {
            FinderError::InvalidRetention {
                row_id: row_id.to_string(),
                reason,
            }
        })?;
        let method = AggregationMethod::from_name(self.method.as_deref().unwrap_or(""));
        Ok(Some(LeafMeta { retentions, method }))
    }
}

/// Parses a retention payload such as `[[60,1440],[3600,720]]`.
pub fn parse_retentions(payload: &str) -> std::result::Result<Vec<RetentionTier>, String> {
    let pairs: Vec<(i64, i64)> = serde_json::from_str(payload).map_err(|e| e.to_string())?;
    if pairs.is_empty() {
        return Err("no retention tiers".to_string());
    }
    pairs
        .into_iter()
        .map(|(step, points)| {
            if step <= 0 || points <= 0 {
                Err(format!("non-positive tier ({step}, {points})"))
            } else {
                Ok(RetentionTier::new(step, points))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(pairs: &[(&str, &str)]) -> Columns {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn decodes_children_by_prefix() {
        let row = TreeRow::from_columns(&columns(&[
            ("t::c_MySQL", "Platform.MySQL"),
            ("t::c_Redis", "row-42"),
            ("t::other", "x"),
        ]));
        assert!(!row.is_leaf());
        assert_eq!(row.children.len(), 2);
        assert_eq!(row.children["Redis"], "row-42");
    }

    #[test]
    fn decodes_leaf_meta() {
        let row = TreeRow::from_columns(&columns(&[
            (LEAF_MARKER_COLUMN, "1"),
            (RETENTION_COLUMN, "[[60,1440],[3600,720]]"),
            (AGG_METHOD_COLUMN, "max"),
        ]));
        let meta = row.leaf_meta("a.b").unwrap().unwrap();
        assert_eq!(
            meta.retentions,
            vec![RetentionTier::new(60, 1440), RetentionTier::new(3600, 720)]
        );
        assert_eq!(meta.method, AggregationMethod::Max);
    }

    #[test]
    fn malformed_retention_is_an_error() {
        let row = TreeRow::from_columns(&columns(&[
            (LEAF_MARKER_COLUMN, "1"),
            (RETENTION_COLUMN, "sixty by a day"),
        ]));
        assert!(matches!(
            row.leaf_meta("a.b"),
            Err(FinderError::InvalidRetention { .. })
        ));
    }

    #[test]
    fn empty_row() {
        assert!(TreeRow::from_columns(&Columns::new()).is_empty());
        assert_eq!(parse_sample_column("d:1700000060"), Some(1_700_000_060));
        assert_eq!(parse_sample_column("x:1"), None);
    }
}
