//! Training and backtest window arithmetic
//!
//! All windows are inclusive calendar-date ranges derived from a dataset's
//! latest recorded sale date. A "week" is always exactly 7 days.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Accepted bounds for the training length, in weeks.
pub const MIN_TRAIN_WEEKS: u32 = 4;
pub const MAX_TRAIN_WEEKS: u32 = 8;

/// An inclusive calendar-date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Number of days covered, inclusive of both ends
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Train/holdout window pair for a backtest.
///
/// The training window and holdout window are contiguous and
/// non-overlapping by construction: `train.end + 1 day == holdout.start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BacktestWindows {
    pub train: DateWindow,
    pub holdout: DateWindow,
}

fn require_train_weeks(train_weeks: u32) -> Result<()> {
    if !(MIN_TRAIN_WEEKS..=MAX_TRAIN_WEEKS).contains(&train_weeks) {
        return Err(ForecastError::InvalidParameter(format!(
            "train_weeks must be between {MIN_TRAIN_WEEKS} and {MAX_TRAIN_WEEKS}, got {train_weeks}"
        )));
    }
    Ok(())
}

fn require_latest(latest: Option<NaiveDate>) -> Result<NaiveDate> {
    latest.ok_or_else(|| ForecastError::NoData("dataset has no sales data".to_string()))
}

/// Derive the training window ending at the dataset's latest sale date.
///
/// Returns `[latest - (7 * train_weeks - 1) days, latest]`, a range of
/// exactly `7 * train_weeks` days.
pub fn train_window(latest: Option<NaiveDate>, train_weeks: u32) -> Result<DateWindow> {
    require_train_weeks(train_weeks)?;
    let end = require_latest(latest)?;
    let start = end - Duration::days(i64::from(train_weeks) * 7 - 1);
    Ok(DateWindow { start, end })
}

/// Derive contiguous train/holdout windows for a backtest.
///
/// The holdout covers the last `7 * horizon_weeks` days of history; the
/// training window is the `7 * train_weeks` days immediately before it.
pub fn backtest_windows(
    latest: Option<NaiveDate>,
    train_weeks: u32,
    horizon_weeks: u32,
) -> Result<BacktestWindows> {
    if horizon_weeks == 0 {
        return Err(ForecastError::InvalidParameter(
            "horizon_weeks must be > 0".to_string(),
        ));
    }
    require_train_weeks(train_weeks)?;
    let holdout_end = require_latest(latest)?;

    let holdout_days = i64::from(horizon_weeks) * 7;
    let train_end = holdout_end - Duration::days(holdout_days);
    let holdout_start = train_end + Duration::days(1);
    let train_start = train_end - Duration::days(i64::from(train_weeks) * 7 - 1);

    Ok(BacktestWindows {
        train: DateWindow {
            start: train_start,
            end: train_end,
        },
        holdout: DateWindow {
            start: holdout_start,
            end: holdout_end,
        },
    })
}
