//! Readers: the fetch capability handed out with every leaf.
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::{fmt, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    aggregation::AggregationMethod,
    config::FinderConfig,
    error::{FinderError, Result},
    interval::{Interval, IntervalSet},
    merge::fold_series,
    planner::plan_scans,
    scanner::scan_tier,
    series::Series,
    store::TreeStore,
    tier::{total_span, RetentionTier},
};

/// Anything that can serve a metric's series.
pub trait Reader: Send + Sync {
    /// Starts a fetch of `[start, end)`. The outcome may still be pending.
    fn fetch(&self, start: i64, end: i64) -> Result<FetchOutcome>;

    /// The time ranges this reader can serve.
    fn intervals(&self) -> IntervalSet;
}

/// Result of starting a fetch.
pub enum FetchOutcome {
    Ready(Series),
    Pending(FetchInProgress),
}

impl FetchOutcome {
    /// Blocks until the series is available.
    pub fn wait(self) -> Result<Series> {
        match self {
            FetchOutcome::Ready(series) => Ok(series),
            FetchOutcome::Pending(pending) => pending.wait_for_results(),
        }
    }
}

impl fmt::Debug for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Ready(series) => f.debug_tuple("Ready").field(series).finish(),
            FetchOutcome::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A fetch running elsewhere, resolved by a blocking wait.
pub struct FetchInProgress {
    wait: Box<dyn FnOnce() -> Result<Series> + Send>,
}

impl FetchInProgress {
    pub fn new<F>(wait: F) -> Self
    where
        F: FnOnce() -> Result<Series> + Send + 'static,
    {
        Self {
            wait: Box::new(wait),
        }
    }

    pub fn wait_for_results(self) -> Result<Series> {
        (self.wait)()
    }
}

/// Checks a request window against the clock and returns the effective end,
/// clamped to `now`.
pub(crate) fn validate_window(start: i64, end: i64, now: i64) -> Result<i64> {
    if start > end {
        return Err(FinderError::InvalidRange { start, end });
    }
    if start > now {
        return Err(FinderError::StartInFuture { start, now });
    }
    Ok(end.min(now))
}

/// Reads a leaf from its retention tiers, merging the tiers that cover the
/// requested window.
pub struct TieredReader<S: TreeStore> {
    path: String,
    row_id: String,
    retentions: Vec<RetentionTier>,
    method: AggregationMethod,
    store: Arc<S>,
    config: Arc<FinderConfig>,
}

impl<S: TreeStore> TieredReader<S> {
    pub fn new(
        path: impl Into<String>,
        row_id: impl Into<String>,
        retentions: Vec<RetentionTier>,
        method: AggregationMethod,
        store: Arc<S>,
        config: Arc<FinderConfig>,
    ) -> Self {
        Self {
            path: path.into(),
            row_id: row_id.into(),
            retentions,
            method,
            store,
            config,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn row_id(&self) -> &str {
        &self.row_id
    }

    pub fn retentions(&self) -> &[RetentionTier] {
        &self.retentions
    }

    pub fn method(&self) -> AggregationMethod {
        self.method
    }

    fn finest_step(&self) -> i64 {
        self.retentions.iter().map(|r| r.step).min().unwrap_or(1)
    }

    /// Fetches `[start, end)` as seen at `now`.
    ///
    /// Every planned tier is scanned on its own worker of a pool that lives
    /// for this call only. Failed tiers are logged and left out; the fetch
    /// fails only when no tier produced a series.
    pub fn fetch_at(&self, start: i64, end: i64, now: i64) -> Result<Series> {
        let end = validate_window(start, end, now)?;

        let plan = plan_scans(
            &self.row_id,
            &self.retentions,
            self.method,
            start,
            end,
            now,
            &self.config,
        );
        if plan.is_empty() {
            // Nothing older than the last tier exists, so the series starts
            // no earlier than the coverage horizon.
            let horizon = now.saturating_sub(total_span(&self.retentions));
            let start = start.max(horizon).min(end);
            debug!(path = %self.path, start, end, "No tier covers the window");
            return Ok(Series::aligned(start, end, self.finest_step()));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(plan.len())
            .thread_name(|i| format!("tier-scan-{i}"))
            .build()
            .map_err(|e| FinderError::WorkerPool(e.to_string()))?;

        let bucket_seconds = self.config.bucket_seconds;
        let store = &*self.store;
        let results: Vec<Result<Series>> = pool.install(|| {
            plan.scans
                .par_iter()
                .map(|scan| scan_tier(store, scan, bucket_seconds))
                .collect()
        });

        let mut series = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (scan, result) in plan.scans.iter().zip(results) {
            match result {
                Ok(s) => series.push(s),
                Err(e) => {
                    warn!(path = %self.path, table = %scan.table, "Tier scan failed: {}", e);
                    failures.push(format!("{}: {}", scan.table, e));
                }
            }
        }

        let merged = fold_series(series).ok_or_else(|| FinderError::AllTiersFailed {
            metric: self.path.clone(),
            failures,
        })?;
        info!(
            path = %self.path,
            tiers = plan.len(),
            step = merged.step,
            slots = merged.len(),
            filled = merged.filled(),
            "Fetched series"
        );
        Ok(merged)
    }

    /// Coverage as seen at `now`: back as far as all tiers together reach.
    pub fn intervals_at(&self, now: i64) -> IntervalSet {
        IntervalSet::new(vec![Interval::new(
            now.saturating_sub(total_span(&self.retentions)),
            now,
        )])
    }
}

impl<S: TreeStore> Reader for TieredReader<S> {
    fn fetch(&self, start: i64, end: i64) -> Result<FetchOutcome> {
        self.fetch_at(start, end, Utc::now().timestamp())
            .map(FetchOutcome::Ready)
    }

    fn intervals(&self) -> IntervalSet {
        self.intervals_at(Utc::now().timestamp())
    }
}

impl<S: TreeStore> fmt::Debug for TieredReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredReader")
            .field("path", &self.path)
            .field("row_id", &self.row_id)
            .field("retentions", &self.retentions)
            .field("method", &self.method)
            .finish()
    }
}
