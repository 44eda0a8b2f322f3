//! Continuous daily series assembly
//!
//! Sales rows are sparse: an item may have no sales on a given day, or
//! several rows for the same day. Downstream consumers (forecasting,
//! metric alignment) rely on a continuous, strictly ascending daily series
//! over an inclusive date range, so assembly sums duplicates and fills
//! gaps with zero.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

/// A continuous daily series over an inclusive date range.
///
/// Invariant: `len() == (end - start).num_days() + 1` and dates are
/// strictly ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    /// Number of days backed by at least one recorded sales row
    observed_days: usize,
}

impl DailySeries {
    /// Get the series dates
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Get the series values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the length of the series
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Last date in the series, if any
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Number of days in the range that had at least one recorded sales row.
    /// Gap-filled zeros do not count.
    pub fn observed_days(&self) -> usize {
        self.observed_days
    }

    /// Build a series directly from aligned dates and values (for callers
    /// that already hold a continuous series, e.g. tests).
    pub fn from_parts(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }
        let observed_days = dates.len();
        Ok(Self {
            dates,
            values,
            observed_days,
        })
    }
}

/// Upstream data-access capability consumed by the pipeline.
///
/// The storage layer implements this; tests can substitute a fixture.
pub trait SalesSource {
    /// Sum of quantity grouped by date for a dataset/item pair within
    /// `[start, end]` inclusive, ordered ascending by date.
    fn daily_totals(
        &self,
        dataset_id: i64,
        item_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>>;

    /// Latest recorded sale date for a dataset, if it has any sales.
    fn latest_sale_date(&self, dataset_id: i64) -> Result<Option<NaiveDate>>;
}

/// Assemble a gap-filled daily series for one dataset/item over
/// `[start, end]` inclusive.
///
/// Multiple aggregates on the same date are summed; days with no aggregate
/// get 0.0. Fails with `InvalidRange` if `end < start`.
pub fn assemble_daily_series<S: SalesSource>(
    source: &S,
    dataset_id: i64,
    item_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<DailySeries> {
    if end < start {
        return Err(ForecastError::InvalidRange(format!(
            "series end {end} must be >= start {start}"
        )));
    }

    let mut by_date: HashMap<NaiveDate, f64> = HashMap::new();
    for (date, quantity) in source.daily_totals(dataset_id, item_id, start, end)? {
        *by_date.entry(date).or_insert(0.0) += quantity;
    }

    let days = (end - start).num_days() as usize + 1;
    let mut dates = Vec::with_capacity(days);
    let mut values = Vec::with_capacity(days);
    let mut observed_days = 0;
    let mut d = start;
    while d <= end {
        dates.push(d);
        match by_date.get(&d) {
            Some(&v) => {
                values.push(v);
                observed_days += 1;
            }
            None => values.push(0.0),
        }
        d += Duration::days(1);
    }

    Ok(DailySeries {
        dates,
        values,
        observed_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FixtureSource(Vec<(NaiveDate, f64)>);

    impl SalesSource for FixtureSource {
        fn daily_totals(
            &self,
            _dataset_id: i64,
            _item_id: i64,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<(NaiveDate, f64)>> {
            Ok(self
                .0
                .iter()
                .filter(|(d, _)| *d >= start && *d <= end)
                .copied()
                .collect())
        }

        fn latest_sale_date(&self, _dataset_id: i64) -> Result<Option<NaiveDate>> {
            Ok(self.0.iter().map(|(d, _)| *d).max())
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn fills_gaps_with_zero_over_full_range() {
        let source = FixtureSource(vec![(day("2025-03-01"), 4.0), (day("2025-03-04"), 9.0)]);
        let series =
            assemble_daily_series(&source, 1, 1, day("2025-03-01"), day("2025-03-05")).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(series.values(), &[4.0, 0.0, 0.0, 9.0, 0.0]);
        assert_eq!(series.observed_days(), 2);
    }

    #[test]
    fn sums_duplicate_rows_on_the_same_date() {
        let source = FixtureSource(vec![
            (day("2025-03-02"), 3.0),
            (day("2025-03-02"), 5.0),
        ]);
        let series =
            assemble_daily_series(&source, 1, 1, day("2025-03-01"), day("2025-03-03")).unwrap();
        assert_eq!(series.values(), &[0.0, 8.0, 0.0]);
    }

    #[test]
    fn length_matches_inclusive_range_and_dates_ascend() {
        let source = FixtureSource(vec![]);
        let start = day("2025-01-01");
        let end = day("2025-02-11");
        let series = assemble_daily_series(&source, 1, 1, start, end).unwrap();
        assert_eq!(series.len() as i64, (end - start).num_days() + 1);
        assert!(series.dates().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(series.observed_days(), 0);
    }

    #[test]
    fn single_day_range_is_valid() {
        let source = FixtureSource(vec![(day("2025-03-01"), 2.0)]);
        let series =
            assemble_daily_series(&source, 1, 1, day("2025-03-01"), day("2025-03-01")).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.last_date(), Some(day("2025-03-01")));
    }

    #[test]
    fn rejects_end_before_start() {
        let source = FixtureSource(vec![]);
        let err = assemble_daily_series(&source, 1, 1, day("2025-03-05"), day("2025-03-01"))
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidRange(_)));
    }
}
