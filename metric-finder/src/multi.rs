//! Merging of several readers that serve the same metric.
use std::{fmt, sync::Arc};
use tracing::{debug, error};

use crate::{
    error::{FinderError, Result},
    interval::IntervalSet,
    merge::fold_series,
    reader::{FetchOutcome, Reader},
};

/// Combines readers for one metric, e.g. a tiered backend and a write cache.
///
/// All sources are started before any is waited on. A source that fails to
/// start or to complete is logged and dropped; the fetch only fails when
/// every source did.
#[derive(Clone)]
pub struct MultiReader {
    readers: Vec<Arc<dyn Reader>>,
}

impl MultiReader {
    pub fn new(readers: Vec<Arc<dyn Reader>>) -> Self {
        Self { readers }
    }

    pub fn push(&mut self, reader: Arc<dyn Reader>) {
        self.readers.push(reader);
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl Reader for MultiReader {
    fn fetch(&self, start: i64, end: i64) -> Result<FetchOutcome> {
        let started: Vec<Result<FetchOutcome>> = self
            .readers
            .iter()
            .map(|reader| reader.fetch(start, end))
            .collect();

        let mut results = Vec::with_capacity(started.len());
        let mut failures = Vec::new();
        for (source, outcome) in started.into_iter().enumerate() {
            match outcome.and_then(FetchOutcome::wait) {
                Ok(series) => results.push(series),
                Err(e) => {
                    error!(source, "Failed to complete subfetch: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        debug!(
            sources = self.readers.len(),
            succeeded = results.len(),
            "Multi-source fetch completed"
        );
        fold_series(results)
            .map(FetchOutcome::Ready)
            .ok_or(FinderError::AllSourcesFailed { failures })
    }

    fn intervals(&self) -> IntervalSet {
        self.readers
            .iter()
            .fold(IntervalSet::default(), |acc, r| acc.union(&r.intervals()))
    }
}

impl fmt::Debug for MultiReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiReader")
            .field("sources", &self.readers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interval::Interval,
        reader::FetchInProgress,
        series::Series,
    };

    struct FixedReader(Series);

    impl Reader for FixedReader {
        fn fetch(&self, _start: i64, _end: i64) -> Result<FetchOutcome> {
            Ok(FetchOutcome::Ready(self.0.clone()))
        }

        fn intervals(&self) -> IntervalSet {
            IntervalSet::new(vec![Interval::new(self.0.start, self.0.end)])
        }
    }

    /// Hands out a pending fetch that resolves to the wrapped series.
    struct DeferredReader(Series);

    impl Reader for DeferredReader {
        fn fetch(&self, _start: i64, _end: i64) -> Result<FetchOutcome> {
            let series = self.0.clone();
            Ok(FetchOutcome::Pending(FetchInProgress::new(move || Ok(series))))
        }

        fn intervals(&self) -> IntervalSet {
            IntervalSet::new(vec![Interval::new(self.0.start, self.0.end)])
        }
    }

    struct FailingReader {
        deferred: bool,
    }

    impl Reader for FailingReader {
        fn fetch(&self, _start: i64, _end: i64) -> Result<FetchOutcome> {
            if self.deferred {
                Ok(FetchOutcome::Pending(FetchInProgress::new(|| {
                    Err(FinderError::Backend(anyhow::anyhow!("cache timed out")))
                })))
            } else {
                Err(FinderError::Backend(anyhow::anyhow!("backend down")))
            }
        }

        fn intervals(&self) -> IntervalSet {
            IntervalSet::default()
        }
    }

    fn series() -> Series {
        Series::from_values(0, 60, vec![Some(1.0), None, Some(3.0)])
    }

    #[test]
    fn all_sources_failing_fails_the_fetch() {
        let multi = MultiReader::new(vec![
            Arc::new(FailingReader { deferred: false }),
            Arc::new(FailingReader { deferred: true }),
        ]);
        match multi.fetch(0, 180) {
            Err(FinderError::AllSourcesFailed { failures }) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn one_success_is_returned_unchanged() {
        let multi = MultiReader::new(vec![
            Arc::new(FailingReader { deferred: false }),
            Arc::new(FixedReader(series())),
        ]);
        assert_eq!(multi.fetch(0, 180).unwrap().wait().unwrap(), series());
    }

    #[test]
    fn pending_sources_are_waited_on_and_merged() {
        let coarse = Series::from_values(0, 120, vec![Some(10.0), Some(20.0)]);
        let mut multi = MultiReader::new(vec![Arc::new(DeferredReader(coarse))]);
        multi.push(Arc::new(FixedReader(series())));
        multi.push(Arc::new(FailingReader { deferred: true }));
        assert_eq!(multi.len(), 3);

        let merged = multi.fetch(0, 240).unwrap().wait().unwrap();
        assert_eq!(merged.step, 60);
        assert_eq!(merged.values, vec![Some(1.0), Some(10.0), Some(3.0), Some(20.0)]);
    }

    #[test]
    fn source_order_does_not_decide_precedence() {
        let fine = Series::from_values(0, 60, vec![None]);
        let middle = Series::from_values(0, 120, vec![Some(2.0)]);
        let coarse = Series::from_values(0, 240, vec![Some(3.0)]);

        let ordered = MultiReader::new(vec![
            Arc::new(FixedReader(fine.clone())),
            Arc::new(FixedReader(middle.clone())),
            Arc::new(FixedReader(coarse.clone())),
        ]);
        let shuffled = MultiReader::new(vec![
            Arc::new(FixedReader(fine)),
            Arc::new(FixedReader(coarse)),
            Arc::new(DeferredReader(middle)),
        ]);

        let a = ordered.fetch(0, 240).unwrap().wait().unwrap();
        let b = shuffled.fetch(0, 240).unwrap().wait().unwrap();
        assert_eq!(a.value_at(0), Some(2.0));
        assert_eq!(a, b);
    }

    #[test]
    fn intervals_are_the_union_of_sources() {
        let multi = MultiReader::new(vec![
            Arc::new(FixedReader(Series::from_values(0, 60, vec![None; 2]))),
            Arc::new(FixedReader(Series::from_values(300, 60, vec![None; 2]))),
            Arc::new(FailingReader { deferred: false }),
        ]);
        assert_eq!(
            multi.intervals().intervals(),
            &[Interval::new(0, 120), Interval::new(300, 420)]
        );
    }
}
