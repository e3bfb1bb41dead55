//! Half-open time intervals describing what a reader can serve.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn size(&self) -> i64 {
        self.end - self.start
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A sorted set of disjoint intervals. Overlapping or touching members are
/// coalesced on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new(mut intervals: Vec<Interval>) -> Self {
        intervals.sort();
        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if interval.start <= last.end => {
                    last.end = last.end.max(interval.end);
                }
                _ => merged.push(interval),
            }
        }
        Self { intervals: merged }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn union(&self, other: &IntervalSet) -> IntervalSet {
        IntervalSet::new(
            self.intervals
                .iter()
                .chain(other.intervals.iter())
                .copied()
                .collect(),
        )
    }

    pub fn intersects(&self, interval: &Interval) -> bool {
        self.intervals.iter().any(|i| i.intersects(interval))
    }
}

impl FromIterator<Interval> for IntervalSet {
    fn from_iter<T: IntoIterator<Item = Interval>>(iter: T) -> Self {
        IntervalSet::new(iter.into_iter().collect())
    }
}
