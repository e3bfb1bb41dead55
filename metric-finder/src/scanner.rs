//! Execution of a single tier scan.
use tracing::{debug, trace};

use crate::{
    aggregation::SlotAccumulator,
    error::Result,
    planner::ScanDescriptor,
    row::{data_row_key, parse_sample_column},
    series::Series,
    store::TreeStore,
};

/// Scans one tier table and folds its raw samples into a series at the
/// tier's step.
///
/// Tier rows hold one bucket of samples each, keyed `metric:bucketStart`. The
/// scan covers every bucket overlapping the window; since the stop key is
/// exclusive it is padded by one bucket. Samples outside the (step-aligned)
/// window are dropped, and samples sharing a slot are combined with the
/// scan's aggregation method.
pub fn scan_tier<S: TreeStore + ?Sized>(
    store: &S,
    scan: &ScanDescriptor,
    bucket_seconds: i64,
) -> Result<Series> {
    let step = scan.tier.step;
    let mut series = Series::aligned(scan.start, scan.end, step);

    let start_floor = scan.start - scan.start.rem_euclid(bucket_seconds);
    let end_floor = scan.end - scan.end.rem_euclid(bucket_seconds) + bucket_seconds;
    let start_key = data_row_key(&scan.metric_id, start_floor);
    let end_key = data_row_key(&scan.metric_id, end_floor);

    let rows = store.scan(&scan.table, &start_key, &end_key)?;
    let key_prefix = format!("{}:", scan.metric_id);

    let mut slots = vec![SlotAccumulator::default(); series.len()];
    let mut samples = 0usize;
    for (key, columns) in &rows {
        if !key.starts_with(&key_prefix) {
            trace!(row_key = %key, "Skipping row of another metric");
            continue;
        }
        for (column, raw) in columns {
            let Some(timestamp) = parse_sample_column(column) else {
                trace!(row_key = %key, column = %column, "Skipping non-sample column");
                continue;
            };
            let value = match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    trace!(row_key = %key, column = %column, raw = %raw, "Skipping unparsable sample");
                    continue;
                }
            };
            if let Some(slot) = series.slot_of(timestamp) {
                slots[slot].push(value);
                samples += 1;
            }
        }
    }

    series.values = slots.iter().map(|acc| acc.finish(scan.method)).collect();
    debug!(
        table = %scan.table,
        metric_id = %scan.metric_id,
        rows = rows.len(),
        samples,
        filled = series.filled(),
        "Scanned tier"
    );
    Ok(series)
}
