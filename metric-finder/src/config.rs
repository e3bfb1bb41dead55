//! Finder configuration, loadable from a JSON file.
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{FinderError, Result};

/// Default width of the coarse row-key buckets in tier tables.
pub const DEFAULT_BUCKET_SECONDS: i64 = 7200;

/// Default cap on resolver recursion depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Settings shared by the finder and every reader it constructs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Table holding the metric tree rows.
    pub meta_table: String,
    /// Prefix joined to every tier table name with `_` when non-empty.
    pub table_prefix: String,
    /// Width of the row-key buckets used to bound tier scans.
    pub bucket_seconds: i64,
    /// Maximum number of tree levels the resolver descends.
    pub max_depth: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            meta_table: "meta".to_string(),
            table_prefix: String::new(),
            bucket_seconds: DEFAULT_BUCKET_SECONDS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl FinderConfig {
    /// Reads a configuration from a JSON file. Missing fields take defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            FinderError::Config(format!("Failed to open config file {:?}: {}", path, e))
        })?;
        let config: FinderConfig = serde_json::from_reader(file).map_err(|e| {
            FinderError::Config(format!("Failed to parse config from {:?}: {}", path, e))
        })?;
        config.validate()?;
        debug!(?config, "Loaded finder configuration");
        Ok(config)
    }

    /// Loads from `path` when given, falling back to defaults if that fails.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load_from_path(path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("{}. Proceeding with default configuration.", e);
                    Self::default()
                }
            },
            None => {
                info!("No config path provided. Using default configuration.");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.bucket_seconds <= 0 {
            return Err(FinderError::Config(format!(
                "bucket_seconds must be positive, got {}",
                self.bucket_seconds
            )));
        }
        if self.max_depth == 0 {
            return Err(FinderError::Config("max_depth must be at least 1".into()));
        }
        Ok(())
    }

    /// Full name of a tier table, with the configured prefix applied.
    pub fn table_name(&self, name: &str) -> String {
        if self.table_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.table_prefix, name)
        }
    }

    /// Full name of the tree table.
    pub fn meta_table_name(&self) -> String {
        self.table_name(&self.meta_table)
    }
}
