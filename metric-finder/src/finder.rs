//! Entry point: from a dotted pattern to classified nodes.
use std::sync::Arc;
use tracing::info;

use crate::{
    config::FinderConfig,
    error::Result,
    node::{Node, NodeClassifier},
    resolver::{PathResolver, Resolution},
    store::TreeStore,
};

/// Finds metric nodes in a store and hands out readers for the leaves.
pub struct Finder<S: TreeStore + 'static> {
    store: Arc<S>,
    config: Arc<FinderConfig>,
    classifier: NodeClassifier<S>,
}

impl<S: TreeStore + 'static> Finder<S> {
    pub fn new(store: Arc<S>, config: FinderConfig) -> Self {
        let config = Arc::new(config);
        info!(meta_table = %config.meta_table_name(), "Creating metric finder");
        Self {
            classifier: NodeClassifier::new(Arc::clone(&store), Arc::clone(&config)),
            store,
            config,
        }
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Lazily finds every node matching `pattern`.
    ///
    /// Dead branches are skipped silently. An error is only produced when the
    /// store cannot be read at all, after which the iterator ends.
    pub fn find_nodes(&self, pattern: &str) -> FindNodes<'_, S> {
        FindNodes {
            resolution: PathResolver::new(&*self.store, &self.config).resolve(pattern),
            classifier: &self.classifier,
        }
    }
}

/// Iterator returned by [`Finder::find_nodes`].
pub struct FindNodes<'a, S: TreeStore + 'static> {
    resolution: Resolution<'a, S>,
    classifier: &'a NodeClassifier<S>,
}

impl<'a, S: TreeStore + 'static> Iterator for FindNodes<'a, S> {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.resolution.next()? {
                Ok(resolved) => {
                    if let Some(node) = self.classifier.classify(resolved) {
                        return Some(Ok(node));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
