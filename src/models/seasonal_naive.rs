//! Seasonal-naive baseline with a fixed 7-day lookback
//!
//! For the i-th future day (1-indexed) the prediction is
//! `history[len - 7 + (i - 1)]` when that index is valid, otherwise the
//! last observed value. Only the first 7 forecast days therefore exhibit
//! weekly seasonality; every later day flattens to the last observation.
//! That flat-line behavior beyond day 7 is intentional and must not be
//! changed silently: stored backtest results depend on it.

use crate::error::{ForecastError, Result};
use crate::models::{ForecastPoint, ForecastSeries, Forecaster};
use crate::series::DailySeries;
use chrono::Duration;

/// Fixed lookback, in days
const SEASON_LENGTH: i64 = 7;

/// The built-in baseline algorithm ("seasonal-naive-7").
///
/// Produces point estimates only; interval bounds are always absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonalNaive;

impl Forecaster for SeasonalNaive {
    fn fit_and_predict(
        &self,
        history: &DailySeries,
        horizon_days: usize,
    ) -> Result<ForecastSeries> {
        let values = history.values();
        let (last_value, last_date) = match (values.last(), history.last_date()) {
            (Some(&v), Some(d)) => (v, d),
            _ => {
                return Err(ForecastError::InvalidParameter(
                    "history is empty".to_string(),
                ))
            }
        };

        let mut forecast = Vec::with_capacity(horizon_days);
        for i in 1..=horizon_days as i64 {
            let idx = values.len() as i64 - SEASON_LENGTH + (i - 1);
            let yhat = if (0..values.len() as i64).contains(&idx) {
                values[idx as usize]
            } else {
                last_value
            };
            forecast.push(ForecastPoint {
                date: last_date + Duration::days(i),
                yhat,
                yhat_lower: None,
                yhat_upper: None,
            });
        }
        Ok(forecast)
    }

    fn name(&self) -> &str {
        "baseline_seasonal_naive_7"
    }
}
