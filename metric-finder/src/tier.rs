//! Retention tiers and their backing table names.
use serde::{Deserialize, Serialize};
use std::fmt;

/// One resolution level: `step` seconds per point, `points` points retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RetentionTier {
    pub step: i64,
    pub points: i64,
}

impl RetentionTier {
    pub fn new(step: i64, points: i64) -> Self {
        Self { step, points }
    }

    /// Seconds of history this tier holds.
    pub fn span(&self) -> i64 {
        self.step.saturating_mul(self.points)
    }
}

impl fmt::Display for RetentionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.step, self.points)
    }
}

/// Unprefixed table name of `tier` for a leaf retaining `all` tiers, e.g.
/// `60.60_1440.3600_720`.
pub fn tier_table_name(tier: &RetentionTier, all: &[RetentionTier]) -> String {
    let spec = all
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".");
    format!("{}.{}", tier.step, spec)
}

/// Total seconds covered by all tiers together.
pub fn total_span(tiers: &[RetentionTier]) -> i64 {
    tiers.iter().fold(0i64, |acc, t| acc.saturating_add(t.span()))
}
