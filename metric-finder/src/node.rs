//! Branch and leaf nodes handed to the caller of a find.
use std::{fmt, sync::Arc};
use tracing::{trace, warn};

use crate::{
    config::FinderConfig,
    error::Result,
    interval::IntervalSet,
    reader::{Reader, TieredReader},
    resolver::Resolved,
    row::{LeafMeta, TreeRow},
    series::Series,
    store::TreeStore,
};

/// A namespace node without data of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNode {
    pub path: String,
}

impl BranchNode {
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// A node backed by a series, readable through its bound reader.
#[derive(Clone)]
pub struct LeafNode {
    pub path: String,
    pub row_id: String,
    reader: Arc<dyn Reader>,
}

impl LeafNode {
    pub fn new(path: impl Into<String>, row_id: impl Into<String>, reader: Arc<dyn Reader>) -> Self {
        Self {
            path: path.into(),
            row_id: row_id.into(),
            reader,
        }
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// Fetches `[start, end)`, waiting for the reader if it answers lazily.
    pub fn fetch(&self, start: i64, end: i64) -> Result<Series> {
        self.reader.fetch(start, end)?.wait()
    }

    pub fn intervals(&self) -> IntervalSet {
        self.reader.intervals()
    }

    pub fn reader(&self) -> &Arc<dyn Reader> {
        &self.reader
    }
}

impl fmt::Debug for LeafNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafNode")
            .field("path", &self.path)
            .field("row_id", &self.row_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Branch(BranchNode),
    Leaf(LeafNode),
}

impl Node {
    pub fn path(&self) -> &str {
        match self {
            Node::Branch(branch) => &branch.path,
            Node::Leaf(leaf) => &leaf.path,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

/// Turns resolver matches into nodes, binding a tiered reader to each leaf.
pub struct NodeClassifier<S: TreeStore + 'static> {
    store: Arc<S>,
    config: Arc<FinderConfig>,
}

impl<S: TreeStore + 'static> NodeClassifier<S> {
    pub fn new(store: Arc<S>, config: Arc<FinderConfig>) -> Self {
        Self { store, config }
    }

    /// Classifies one match. `None` means the match was dropped: its row
    /// vanished or could not be read, or its leaf metadata is unusable.
    pub fn classify(&self, resolved: Resolved) -> Option<Node> {
        match resolved {
            Resolved::Leaf { path, row_id, row } => self.leaf(path, row_id, &row),
            Resolved::Candidate { path, row_id, .. } => {
                let columns = match self.store.get_row(&self.config.meta_table_name(), &row_id) {
                    Ok(Some(columns)) => columns,
                    Ok(None) => {
                        trace!(row_id = %row_id, "Candidate row absent; skipping");
                        return None;
                    }
                    Err(e) => {
                        warn!(row_id = %row_id, "Failed to read candidate row, skipping: {}", e);
                        return None;
                    }
                };
                let row = TreeRow::from_columns(&columns);
                if row.is_leaf() {
                    self.leaf(path, row_id, &row)
                } else {
                    Some(Node::Branch(BranchNode { path }))
                }
            }
        }
    }

    fn leaf(&self, path: String, row_id: String, row: &TreeRow) -> Option<Node> {
        let LeafMeta { retentions, method } = match row.leaf_meta(&row_id) {
            Ok(Some(meta)) => meta,
            Ok(None) => return Some(Node::Branch(BranchNode { path })),
            Err(e) => {
                warn!(path = %path, "Skipping leaf: {}", e);
                return None;
            }
        };
        let reader = TieredReader::new(
            path.clone(),
            row_id.clone(),
            retentions,
            method,
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        );
        Some(Node::Leaf(LeafNode::new(path, row_id, Arc::new(reader))))
    }
}
