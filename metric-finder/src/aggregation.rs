//! Reduction functions used when several raw samples land in one slot.
use serde::{Deserialize, Serialize};

/// How samples collapsing into the same slot are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    #[default]
    Avg,
    Min,
    Max,
    Sum,
    Last,
}

impl AggregationMethod {
    /// Selects a method from its stored name. Unrecognized names fall back to
    /// `Avg`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        if name.contains("max") {
            AggregationMethod::Max
        } else if name.contains("min") {
            AggregationMethod::Min
        } else if name.contains("sum") {
            AggregationMethod::Sum
        } else if name.contains("last") {
            AggregationMethod::Last
        } else {
            AggregationMethod::Avg
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregationMethod::Avg => "avg",
            AggregationMethod::Min => "min",
            AggregationMethod::Max => "max",
            AggregationMethod::Sum => "sum",
            AggregationMethod::Last => "last",
        }
    }

    /// Reduces a group of samples. `None` for an empty group.
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        let mut acc = SlotAccumulator::default();
        for value in values {
            acc.push(*value);
        }
        acc.finish(*self)
    }
}

/// Running state for one output slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotAccumulator {
    count: u32,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl SlotAccumulator {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(&self, method: AggregationMethod) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(match method {
            AggregationMethod::Avg => self.sum / self.count as f64,
            AggregationMethod::Min => self.min,
            AggregationMethod::Max => self.max,
            AggregationMethod::Sum => self.sum,
            AggregationMethod::Last => self.last,
        })
    }
}
