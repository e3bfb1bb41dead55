//! Finer-wins merging of series with different resolutions.
use std::cmp::Ordering;
use tracing::trace;

use crate::series::Series;

/// Orders two series as `(finer, coarser)`. On equal steps the one reaching
/// further forward counts as finer; full ties keep argument order.
fn finer_first<'a>(a: &'a Series, b: &'a Series) -> (&'a Series, &'a Series) {
    match a.step.cmp(&b.step) {
        Ordering::Less => (a, b),
        Ordering::Greater => (b, a),
        Ordering::Equal if b.end > a.end => (b, a),
        Ordering::Equal => (a, b),
    }
}

/// Merges two series into one at the finer step over the union of their
/// windows. Each output slot takes the finer series' value when it has one
/// and falls back to the coarser series otherwise.
pub fn merge(a: &Series, b: &Series) -> Series {
    let (fine, coarse) = finer_first(a, b);
    let step = fine.step;
    let start = fine.start.min(coarse.start);
    let end = fine.end.max(coarse.end);

    if step <= 0 {
        return fine.clone();
    }

    let values: Vec<Option<f64>> = (start..end)
        .step_by(step as usize)
        .map(|t| fine.value_at(t).or_else(|| coarse.value_at(t)))
        .collect();

    trace!(
        fine_step = fine.step,
        coarse_step = coarse.step,
        start,
        end,
        slots = values.len(),
        "Merged series"
    );
    Series::from_values(start, step, values)
}

/// Folds any number of series with `merge`, finest step first, so the
/// result does not depend on the order the series arrive in.
pub fn fold_series<I: IntoIterator<Item = Series>>(series: I) -> Option<Series> {
    let mut series: Vec<Series> = series.into_iter().collect();
    series.sort_by_key(|s| s.step);
    series.into_iter().reduce(|acc, next| merge(&acc, &next))
}
