//! Glob-aware traversal of the metric tree stored as rows.
//!
//! The walk is an explicit depth-first stack rather than recursion, so a
//! malformed tree can neither overflow the call stack nor loop forever: every
//! frame carries its depth and frames past `max_depth` are pruned.

use std::collections::VecDeque;
use tracing::{debug, trace, warn};

use crate::{
    config::FinderConfig,
    error::Result,
    glob::{is_glob, match_entries},
    pattern::split_pattern,
    row::{TreeRow, ROOT_ROW},
    store::TreeStore,
};

/// One match produced by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A row carrying the leaf marker, already fetched.
    Leaf {
        path: String,
        row_id: String,
        row: TreeRow,
    },
    /// A child matched by the last pattern segment. Its row has not been
    /// fetched, so it may turn out to be a leaf or a branch.
    Candidate {
        path: String,
        name: String,
        row_id: String,
    },
}

impl Resolved {
    pub fn path(&self) -> &str {
        match self {
            Resolved::Leaf { path, .. } | Resolved::Candidate { path, .. } => path,
        }
    }
}

/// Resolves dotted glob patterns against the tree table of a store.
pub struct PathResolver<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    config: &'a FinderConfig,
}

impl<'a, S: TreeStore + ?Sized> PathResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a FinderConfig) -> Self {
        Self { store, config }
    }

    /// Starts resolving `pattern`. Matches are produced lazily.
    pub fn resolve(&self, pattern: &str) -> Resolution<'a, S> {
        let mut segments = split_pattern(pattern);
        let first = if segments.is_empty() {
            ROOT_ROW.to_string()
        } else {
            segments[0].clone()
        };

        let start = if first == ROOT_ROW {
            segments.remove(0);
            Frame::new(ROOT_ROW.to_string(), String::new(), segments)
        } else if is_glob(&first) {
            Frame::new(ROOT_ROW.to_string(), String::new(), segments)
        } else {
            segments.remove(0);
            Frame::new(first.clone(), first, segments)
        };
        debug!(pattern, start_row = %start.row_id, "Resolving pattern");

        Resolution {
            store: self.store,
            meta_table: self.config.meta_table_name(),
            max_depth: self.config.max_depth,
            stack: vec![start],
            ready: VecDeque::new(),
            started: false,
        }
    }
}

/// A row still to be visited.
struct Frame {
    row_id: String,
    path: String,
    patterns: Vec<String>,
    depth: usize,
    /// Set when the parent already fetched this row while checking it.
    row: Option<TreeRow>,
}

impl Frame {
    fn new(row_id: String, path: String, patterns: Vec<String>) -> Self {
        Self {
            row_id,
            path,
            patterns,
            depth: 0,
            row: None,
        }
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

/// Lazy iterator over the matches of one pattern.
///
/// Only a failure to read the starting row is reported as an error; rows that
/// are missing, empty or unreadable further down are pruned.
pub struct Resolution<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    meta_table: String,
    max_depth: usize,
    stack: Vec<Frame>,
    ready: VecDeque<Resolved>,
    started: bool,
}

impl<'a, S: TreeStore + ?Sized> Resolution<'a, S> {
    fn fetch_row(&self, row_id: &str) -> anyhow::Result<Option<TreeRow>> {
        Ok(self
            .store
            .get_row(&self.meta_table, row_id)?
            .map(|columns| TreeRow::from_columns(&columns)))
    }

    /// Visits one frame, queueing its matches and pushing its sub-frames.
    fn visit(&mut self, frame: Frame) -> Result<()> {
        let is_start = !self.started;
        self.started = true;

        let row = match frame.row {
            Some(row) => row,
            None => match self.fetch_row(&frame.row_id) {
                Ok(Some(row)) => row,
                Ok(None) => {
                    trace!(row_id = %frame.row_id, "Row absent; dead branch");
                    return Ok(());
                }
                Err(e) if is_start => return Err(e.into()),
                Err(e) => {
                    warn!(row_id = %frame.row_id, "Failed to read row, pruning: {}", e);
                    return Ok(());
                }
            },
        };
        if row.is_empty() {
            trace!(row_id = %frame.row_id, "Row empty; dead branch");
            return Ok(());
        }

        if row.is_leaf() {
            self.ready.push_back(Resolved::Leaf {
                path: frame.path.clone(),
                row_id: frame.row_id.clone(),
                row: row.clone(),
            });
        }

        let (pattern, remaining) = match frame.patterns.split_first() {
            Some((first, rest)) => (first.as_str(), rest.to_vec()),
            None => ("*", Vec::new()),
        };
        let matched = match_entries(row.children.keys().map(String::as_str), pattern);

        if remaining.is_empty() {
            for name in matched {
                let row_id = row.children[&name].clone();
                self.ready.push_back(Resolved::Candidate {
                    path: child_path(&frame.path, &name),
                    name,
                    row_id,
                });
            }
            return Ok(());
        }

        if frame.depth + 1 >= self.max_depth {
            warn!(
                row_id = %frame.row_id,
                depth = frame.depth,
                "Maximum tree depth reached; pruning"
            );
            return Ok(());
        }

        let mut children = Vec::with_capacity(matched.len());
        for name in matched {
            let row_id = row.children[&name].clone();
            let child = match self.fetch_row(&row_id) {
                Ok(Some(child)) => child,
                Ok(None) => continue,
                Err(e) => {
                    warn!(row_id = %row_id, "Failed to read child row, pruning: {}", e);
                    continue;
                }
            };
            // A leaf cannot match while pattern segments remain.
            if child.is_leaf() {
                trace!(row_id = %row_id, "Skipping leaf with pattern remaining");
                continue;
            }
            children.push(Frame {
                path: child_path(&frame.path, &name),
                row_id,
                patterns: remaining.clone(),
                depth: frame.depth + 1,
                row: Some(child),
            });
        }
        self.stack.extend(children.into_iter().rev());
        Ok(())
    }
}

impl<'a, S: TreeStore + ?Sized> Iterator for Resolution<'a, S> {
    type Item = Result<Resolved>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(resolved) = self.ready.pop_front() {
                return Some(Ok(resolved));
            }
            let frame = self.stack.pop()?;
            if let Err(e) = self.visit(frame) {
                self.stack.clear();
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::FinderError,
        row::{AGG_METHOD_COLUMN, LEAF_MARKER_COLUMN, RETENTION_COLUMN},
        store::{memory_store, Columns, MemStore},
        tier::RetentionTier,
    };

    fn tiers() -> Vec<RetentionTier> {
        vec![RetentionTier::new(60, 1440), RetentionTier::new(3600, 720)]
    }

    fn platform_store() -> MemStore {
        let mut store = memory_store(&FinderConfig::default());
        store.add_leaf("Platform.MySQL.qps", &tiers(), "avg");
        store.add_leaf("Platform.MySQL.latency", &tiers(), "max");
        store.add_branch("Platform.Redis");
        store.add_leaf("Infra.web01.cpu", &tiers(), "avg");
        store
    }

    fn resolve<S: TreeStore>(store: &S, pattern: &str) -> Vec<Resolved> {
        let config = FinderConfig::default();
        PathResolver::new(store, &config)
            .resolve(pattern)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    fn paths(resolved: &[Resolved]) -> Vec<&str> {
        resolved.iter().map(Resolved::path).collect()
    }

    #[test]
    fn wildcard_level_skips_dead_branch() {
        let store = platform_store();
        let resolved = resolve(&store, "Platform.*.qps");
        assert_eq!(paths(&resolved), vec!["Platform.MySQL.qps"]);
        match &resolved[0] {
            Resolved::Candidate { name, row_id, .. } => {
                assert_eq!(name, "qps");
                assert_eq!(row_id, "Platform.MySQL.qps");
            }
            other => panic!("unexpected match: {other:?}"),
        }
    }

    #[test]
    fn literal_path_yields_the_leaf_row() {
        let store = platform_store();
        let resolved = resolve(&store, "Platform.MySQL.qps");
        assert_eq!(resolved.len(), 1);
        match &resolved[0] {
            Resolved::Leaf { path, row, .. } => {
                assert_eq!(path, "Platform.MySQL.qps");
                assert_eq!(row.method.as_deref(), Some("avg"));
            }
            other => panic!("unexpected match: {other:?}"),
        }
    }

    #[test]
    fn star_lists_root_children() {
        let store = platform_store();
        assert_eq!(paths(&resolve(&store, "*")), vec!["Infra", "Platform"]);
        assert_eq!(paths(&resolve(&store, "ROOT")), vec!["Infra", "Platform"]);
    }

    #[test]
    fn glob_first_segment_is_matched_against_root() {
        let store = platform_store();
        assert_eq!(paths(&resolve(&store, "P*.MySQL.*")), vec![
            "Platform.MySQL.latency",
            "Platform.MySQL.qps"
        ]);
        assert_eq!(paths(&resolve(&store, "{Infra,Platform}.*")), vec![
            "Infra.web01",
            "Platform.MySQL",
            "Platform.Redis"
        ]);
    }

    #[test]
    fn pattern_cannot_match_past_a_leaf() {
        let store = platform_store();
        assert!(resolve(&store, "Platform.MySQL.*.extra").is_empty());
    }

    #[test]
    fn missing_start_row_is_no_match() {
        let store = platform_store();
        assert!(resolve(&store, "Nope.*").is_empty());
    }

    #[test]
    fn cyclic_tree_is_cut_at_max_depth() {
        let mut store = memory_store(&FinderConfig::default());
        let mut loop_row = Columns::new();
        loop_row.insert("t::c_again".to_string(), "loop".to_string());
        store.put_row("meta", "loop", loop_row);

        let config = FinderConfig {
            max_depth: 4,
            ..FinderConfig::default()
        };
        let resolved: Vec<_> = PathResolver::new(&store, &config)
            .resolve("loop.*.*.*.*.*.*")
            .collect::<Result<_>>()
            .unwrap();
        assert!(resolved.is_empty());
    }

    struct DownStore;

    impl TreeStore for DownStore {
        fn get_row(&self, _: &str, _: &str) -> anyhow::Result<Option<Columns>> {
            Err(anyhow::anyhow!("connection refused"))
        }

        fn scan(&self, _: &str, _: &str, _: &str) -> anyhow::Result<Vec<(String, Columns)>> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    #[test]
    fn unreachable_store_surfaces_once() {
        let config = FinderConfig::default();
        let results: Vec<_> = PathResolver::new(&DownStore, &config)
            .resolve("Platform.*")
            .collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(FinderError::Backend(_))));
    }

    /// Fails reads of a single row id and serves everything else.
    struct FailingRow {
        inner: MemStore,
        row_id: &'static str,
    }

    impl TreeStore for FailingRow {
        fn get_row(&self, table: &str, row_id: &str) -> anyhow::Result<Option<Columns>> {
            if row_id == self.row_id {
                Err(anyhow::anyhow!("region server timed out"))
            } else {
                self.inner.get_row(table, row_id)
            }
        }

        fn scan(&self, table: &str, start: &str, end: &str) -> anyhow::Result<Vec<(String, Columns)>> {
            self.inner.scan(table, start, end)
        }
    }

    #[test]
    fn unreadable_child_row_is_pruned() {
        let store = FailingRow {
            inner: platform_store(),
            row_id: "Platform.Redis",
        };
        let config = FinderConfig::default();
        let results: Vec<_> = PathResolver::new(&store, &config)
            .resolve("Platform.*.qps")
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().path(), "Platform.MySQL.qps");
    }

    fn columns(pairs: &[(&str, &str)]) -> Columns {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn child_row_ids_need_not_match_paths() {
        let mut store = memory_store(&FinderConfig::default());
        store.put_row("meta", ROOT_ROW, columns(&[("t::c_Platform", "row-1")]));
        store.put_row(
            "meta",
            "row-1",
            columns(&[("t::c_MySQL", "row-2"), ("t::c_Redis", "row-3")]),
        );
        store.put_row("meta", "row-2", columns(&[("t::c_qps", "row-4")]));
        store.put_row("meta", "row-3", Columns::new());
        store.put_row(
            "meta",
            "row-4",
            columns(&[
                (LEAF_MARKER_COLUMN, "1"),
                (RETENTION_COLUMN, "[[60,1440]]"),
                (AGG_METHOD_COLUMN, "avg"),
            ]),
        );

        let resolved = resolve(&store, "*.*.qps");
        assert_eq!(
            resolved,
            vec![Resolved::Candidate {
                path: "Platform.MySQL.qps".to_string(),
                name: "qps".to_string(),
                row_id: "row-4".to_string(),
            }]
        );
        assert_eq!(paths(&resolve(&store, "Platform*.*")), vec![
            "Platform.MySQL",
            "Platform.Redis"
        ]);
    }

    /// `a.b` is a leaf that also lists a child `c`.
    fn leaf_with_children() -> MemStore {
        let mut store = memory_store(&FinderConfig::default());
        store.add_leaf("a.b.c", &tiers(), "avg");
        store.put_column("meta", "a.b", LEAF_MARKER_COLUMN, "1");
        store.put_column("meta", "a.b", RETENTION_COLUMN, "[[60,1440]]");
        store.put_column("meta", "a.b", AGG_METHOD_COLUMN, "sum");
        store
    }

    #[test]
    fn leaf_with_children_is_yielded_then_listed() {
        let store = leaf_with_children();
        let resolved = resolve(&store, "a.b.*");
        assert_eq!(paths(&resolved), vec!["a.b", "a.b.c"]);
        assert!(matches!(resolved[0], Resolved::Leaf { .. }));
        assert!(matches!(resolved[1], Resolved::Candidate { .. }));
    }

    #[test]
    fn leaf_with_children_is_not_descended_into() {
        let store = leaf_with_children();
        assert!(resolve(&store, "a.*.*").is_empty());
    }
}
