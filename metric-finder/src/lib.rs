mod aggregation;
mod cache;
mod config;
mod error;
mod finder;
mod glob;
mod interval;
mod merge;
mod multi;
mod node;
mod pattern;
mod planner;
mod reader;
mod resolver;
mod row;
mod scanner;
mod series;
mod store;
mod tier;

pub use aggregation::{AggregationMethod, SlotAccumulator};
pub use cache::{CacheReader, MemPointCache, PointCache};
pub use config::{FinderConfig, DEFAULT_BUCKET_SECONDS, DEFAULT_MAX_DEPTH};
pub use error::{FinderError, Result};
pub use finder::{FindNodes, Finder};
pub use glob::{glob_to_regex, is_glob, match_entries};
pub use interval::{Interval, IntervalSet};
pub use merge::{fold_series, merge};
pub use multi::MultiReader;
pub use node::{BranchNode, LeafNode, Node, NodeClassifier};
pub use pattern::{compress_pattern, split_pattern};
pub use planner::{plan_scans, QueryPlan, ScanDescriptor};
pub use reader::{FetchInProgress, FetchOutcome, Reader, TieredReader};
pub use resolver::{PathResolver, Resolution, Resolved};
pub use row::{LeafMeta, TreeRow, ROOT_ROW};
pub use scanner::scan_tier;
pub use series::Series;
pub use store::{memory_store, Columns, MemStore, TreeStore};
pub use tier::{tier_table_name, total_span, RetentionTier};
