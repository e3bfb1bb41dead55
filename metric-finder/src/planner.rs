//! Selection of the retention tiers that can serve a time window.
//!
//! Tiers are laid back to back from `now` into the past, finest first: the
//! finest tier covers `[now - span0, now)`, the next one
//! `[now - span0 - span1, now - span0)`, and so on. Only tiers whose interval
//! intersects the request are planned, each clamped to the intersection.

use tracing::{debug, trace};

use crate::{
    aggregation::AggregationMethod,
    config::FinderConfig,
    tier::{tier_table_name, RetentionTier},
};

/// One tier scan of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanDescriptor {
    /// Row-key prefix of the metric in tier tables.
    pub metric_id: String,
    /// Fully prefixed tier table name.
    pub table: String,
    pub tier: RetentionTier,
    pub start: i64,
    pub end: i64,
    pub method: AggregationMethod,
}

/// The scans needed to answer one fetch. Lives only for that fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    pub scans: Vec<ScanDescriptor>,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }
}

/// Plans the tier scans serving `[start, end)` relative to `now`.
///
/// `tiers` may arrive in any order; they are walked finest first. Table names
/// are derived from the tiers in their stored order.
pub fn plan_scans(
    metric_id: &str,
    tiers: &[RetentionTier],
    method: AggregationMethod,
    start: i64,
    end: i64,
    now: i64,
    config: &FinderConfig,
) -> QueryPlan {
    let mut ordered = tiers.to_vec();
    ordered.sort();

    let mut scans = Vec::new();
    let mut offset = 0i64;
    for tier in ordered {
        let tier_end = now.saturating_sub(offset);
        offset = offset.saturating_add(tier.span());
        let tier_start = now.saturating_sub(offset);

        if tier_end <= start {
            trace!(?tier, tier_start, tier_end, "Window lies before this tier; stopping");
            break;
        }
        if tier_start >= end {
            trace!(?tier, tier_start, tier_end, "Window lies after this tier; skipping");
            continue;
        }

        scans.push(ScanDescriptor {
            metric_id: metric_id.to_string(),
            table: config.table_name(&tier_table_name(&tier, tiers)),
            tier,
            start: tier_start.max(start),
            end: tier_end.min(end),
            method,
        });
    }

    debug!(metric_id, start, end, now, scans = scans.len(), "Planned tier scans");
    QueryPlan { scans }
}
