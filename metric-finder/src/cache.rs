//! Reading of recent datapoints held by a write cache.
use chrono::Utc;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};
use tracing::{debug, trace};

use crate::{
    error::{FinderError, Result},
    interval::{Interval, IntervalSet},
    reader::{validate_window, FetchOutcome, Reader},
    series::Series,
};

/// Source of not-yet-persisted datapoints, keyed by metric path.
pub trait PointCache: Send + Sync {
    /// Every cached `(timestamp, value)` for `metric`, in any order.
    fn query(&self, metric: &str) -> anyhow::Result<Vec<(i64, f64)>>;
}

/// In-memory `PointCache`.
#[derive(Debug, Default)]
pub struct MemPointCache {
    points: RwLock<HashMap<String, Vec<(i64, f64)>>>,
}

impl MemPointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, metric: &str, timestamp: i64, value: f64) -> anyhow::Result<()> {
        let mut points = self
            .points
            .write()
            .map_err(|_| anyhow::anyhow!("point cache lock poisoned"))?;
        points
            .entry(metric.to_string())
            .or_default()
            .push((timestamp, value));
        Ok(())
    }
}

impl PointCache for MemPointCache {
    fn query(&self, metric: &str) -> anyhow::Result<Vec<(i64, f64)>> {
        let points = self
            .points
            .read()
            .map_err(|_| anyhow::anyhow!("point cache lock poisoned"))?;
        Ok(points.get(metric).cloned().unwrap_or_default())
    }
}

/// Serves a metric from a `PointCache` at a fixed step. Points sharing a slot
/// keep the latest one.
pub struct CacheReader<C: PointCache> {
    metric: String,
    step: i64,
    cache: Arc<C>,
}

impl<C: PointCache> CacheReader<C> {
    pub fn new(metric: impl Into<String>, step: i64, cache: Arc<C>) -> Self {
        Self {
            metric: metric.into(),
            step,
            cache,
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    fn cached_points(&self) -> Result<Vec<(i64, f64)>> {
        let mut points = self.cache.query(&self.metric).map_err(FinderError::Backend)?;
        points.sort_by_key(|(ts, _)| *ts);
        Ok(points)
    }

    /// Fetches `[start, end)` as seen at `now`. The series starts no earlier
    /// than the slot of the oldest cached point.
    pub fn fetch_at(&self, start: i64, end: i64, now: i64) -> Result<Series> {
        if self.step <= 0 {
            return Err(FinderError::Config(format!(
                "cache step must be positive, got {}",
                self.step
            )));
        }
        let end = validate_window(start, end, now)?;
        let points = self.cached_points()?;
        let oldest = points
            .first()
            .map_or(end, |(ts, _)| ts.saturating_sub(ts.rem_euclid(self.step)));
        let mut series = Series::aligned(start.max(oldest).min(end), end, self.step);

        let mut placed = 0usize;
        for (timestamp, value) in &points {
            let slot_start = timestamp.saturating_sub(timestamp.rem_euclid(self.step));
            match series.slot_of(slot_start) {
                Some(slot) => {
                    series.values[slot] = Some(*value);
                    placed += 1;
                }
                None => trace!(metric = %self.metric, timestamp, "Cached point outside window"),
            }
        }
        debug!(
            metric = %self.metric,
            cached = points.len(),
            placed,
            "Read series from point cache"
        );
        Ok(series)
    }
}

impl<C: PointCache> Reader for CacheReader<C> {
    fn fetch(&self, start: i64, end: i64) -> Result<FetchOutcome> {
        self.fetch_at(start, end, Utc::now().timestamp())
            .map(FetchOutcome::Ready)
    }

    fn intervals(&self) -> IntervalSet {
        let points = match self.cached_points() {
            Ok(points) => points,
            Err(e) => {
                debug!(metric = %self.metric, "Point cache unavailable: {}", e);
                return IntervalSet::default();
            }
        };
        match (points.first(), points.last()) {
            (Some((first, _)), Some((last, _))) => {
                IntervalSet::new(vec![Interval::new(*first, last.saturating_add(self.step))])
            }
            _ => IntervalSet::default(),
        }
    }
}

impl<C: PointCache> fmt::Debug for CacheReader<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheReader")
            .field("metric", &self.metric)
            .field("step", &self.step)
            .finish()
    }
}
