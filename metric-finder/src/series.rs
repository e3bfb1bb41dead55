//! Fixed-step time series with nullable slots.
use serde::{Deserialize, Serialize};

/// Values over `[start, end)`, one slot per `step` seconds. A slot is `None`
/// when no data exists for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub start: i64,
    pub end: i64,
    pub step: i64,
    pub values: Vec<Option<f64>>,
}

impl Series {
    /// An all-null series covering `[start, end)`. `end - start` is expected
    /// to be a multiple of `step`; any remainder is dropped.
    pub fn empty(start: i64, end: i64, step: i64) -> Self {
        let len = slot_count(start, end, step);
        Self {
            start,
            end: start.saturating_add((len as i64).saturating_mul(step)),
            step,
            values: vec![None; len],
        }
    }

    /// An all-null series whose window is `[start, end)` widened outwards to
    /// multiples of `step`.
    pub fn aligned(start: i64, end: i64, step: i64) -> Self {
        let (start, end) = align_window(start, end, step);
        Self::empty(start, end, step)
    }

    pub fn from_values(start: i64, step: i64, values: Vec<Option<f64>>) -> Self {
        Self {
            start,
            end: start.saturating_add((values.len() as i64).saturating_mul(step)),
            step,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Slot index holding timestamp `t`, if it lies inside the window.
    pub fn slot_of(&self, t: i64) -> Option<usize> {
        if t < self.start || t >= self.end || self.step <= 0 {
            return None;
        }
        let index = ((t - self.start) / self.step) as usize;
        (index < self.values.len()).then_some(index)
    }

    /// The value of the slot containing `t`.
    pub fn value_at(&self, t: i64) -> Option<f64> {
        self.slot_of(t).and_then(|i| self.values[i])
    }

    /// Number of slots holding data.
    pub fn filled(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// `(timestamp, value)` for every slot.
    pub fn points(&self) -> impl Iterator<Item = (i64, Option<f64>)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (self.start + i as i64 * self.step, *v))
    }
}

/// Floors `start` and rounds `end` up to multiples of `step`. Saturates at
/// the ends of the `i64` range.
pub fn align_window(start: i64, end: i64, step: i64) -> (i64, i64) {
    if step <= 0 {
        return (start, end);
    }
    let start = start.saturating_sub(start.rem_euclid(step));
    let rem = end.rem_euclid(step);
    let end = if rem == 0 {
        end
    } else {
        end.saturating_add(step - rem)
    };
    (start, end.max(start))
}

fn slot_count(start: i64, end: i64, step: i64) -> usize {
    if step <= 0 || end <= start {
        0
    } else {
        (end.saturating_sub(start) / step) as usize
    }
}
