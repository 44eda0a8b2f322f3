//! Forecasting algorithms and dispatch
//!
//! Algorithm selection happens once at the API boundary, where a raw
//! string is resolved into the closed [`Algorithm`] enum; everything past
//! that point works with the typed value. The external statistical model
//! is abstracted behind the [`Forecaster`] trait so the pipeline never
//! depends on its internals and tests can plug in a deterministic stub.

use crate::error::{ForecastError, Result};
use crate::series::DailySeries;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::fmt::Debug;
use std::str::FromStr;

pub mod seasonal_naive;

pub use seasonal_naive::SeasonalNaive;

/// Closed set of supported forecasting algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Built-in seasonal-naive baseline with a fixed 7-day lookback
    SeasonalNaive,
    /// Externally supplied statistical model behind [`Forecaster`]
    External,
}

impl Algorithm {
    /// Canonical name used in persisted run records
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::SeasonalNaive => "baseline_seasonal_naive_7",
            Algorithm::External => "external_model",
        }
    }
}

impl FromStr for Algorithm {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "baseline" | "seasonal_naive" | "seasonal_naive_7" | "seasonal-naive-7"
            | "baseline_seasonal_naive_7" => Ok(Algorithm::SeasonalNaive),
            "external" | "external_model" | "external-model" => Ok(Algorithm::External),
            other => Err(ForecastError::InvalidParameter(format!(
                "algorithm must be one of baseline, seasonal_naive, seasonal_naive_7, \
                 external-model; got {other:?}"
            ))),
        }
    }
}

/// One forecasted future day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: Option<f64>,
    pub yhat_upper: Option<f64>,
}

/// Ordered forecast over consecutive future days
pub type ForecastSeries = Vec<ForecastPoint>;

/// A fitted-per-call forecasting capability.
///
/// Implementations fit on the given history and predict exactly
/// `horizon_days` consecutive days immediately following its last date.
pub trait Forecaster: Debug {
    /// Fit on `history` and predict `horizon_days` future days
    fn fit_and_predict(&self, history: &DailySeries, horizon_days: usize)
        -> Result<ForecastSeries>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Dispatches a forecast request to the selected algorithm.
#[derive(Debug, Default)]
pub struct ForecastEngine {
    external: Option<Box<dyn Forecaster>>,
}

impl ForecastEngine {
    /// Engine with only the built-in baseline available
    pub fn new() -> Self {
        Self { external: None }
    }

    /// Engine with an external model capability attached
    pub fn with_external(model: Box<dyn Forecaster>) -> Self {
        Self {
            external: Some(model),
        }
    }

    /// Produce a forecast for exactly `horizon_days` future days
    /// immediately following the last date in `history`.
    pub fn forecast(
        &self,
        history: &DailySeries,
        horizon_days: usize,
        algorithm: Algorithm,
    ) -> Result<ForecastSeries> {
        if horizon_days == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon_days must be > 0".to_string(),
            ));
        }
        if history.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "history is empty".to_string(),
            ));
        }

        let forecast = match algorithm {
            Algorithm::SeasonalNaive => {
                SeasonalNaive.fit_and_predict(history, horizon_days)?
            }
            Algorithm::External => {
                let model = self.external.as_ref().ok_or_else(|| {
                    ForecastError::InvalidParameter(
                        "no external model capability configured".to_string(),
                    )
                })?;
                model.fit_and_predict(history, horizon_days)?
            }
        };

        self.rekey_to_future_dates(history, horizon_days, forecast)
    }

    /// Validate the point count and re-key every point to the expected
    /// future date sequence. Model output dates are not trusted.
    fn rekey_to_future_dates(
        &self,
        history: &DailySeries,
        horizon_days: usize,
        forecast: ForecastSeries,
    ) -> Result<ForecastSeries> {
        if forecast.len() != horizon_days {
            return Err(ForecastError::MalformedInput(format!(
                "model returned {} points, expected {horizon_days}",
                forecast.len()
            )));
        }
        let last = history.last_date().ok_or_else(|| {
            ForecastError::InvalidParameter("history is empty".to_string())
        })?;
        Ok(forecast
            .into_iter()
            .enumerate()
            .map(|(i, point)| ForecastPoint {
                date: last + Duration::days(i as i64 + 1),
                ..point
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn history(values: &[f64]) -> DailySeries {
        let start = day("2025-03-01");
        let dates = (0..values.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        DailySeries::from_parts(dates, values.to_vec()).unwrap()
    }

    #[rstest]
    #[case("baseline", Algorithm::SeasonalNaive)]
    #[case("Seasonal_Naive", Algorithm::SeasonalNaive)]
    #[case("seasonal-naive-7", Algorithm::SeasonalNaive)]
    #[case(" EXTERNAL-MODEL ", Algorithm::External)]
    #[case("external", Algorithm::External)]
    fn resolves_algorithm_synonyms(#[case] raw: &str, #[case] expected: Algorithm) {
        assert_eq!(raw.parse::<Algorithm>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_algorithm_name() {
        let err = "arima".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter(_)));
    }

    #[test]
    fn forecast_dates_follow_history() {
        let engine = ForecastEngine::new();
        let h = history(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let fc = engine.forecast(&h, 3, Algorithm::SeasonalNaive).unwrap();
        assert_eq!(fc.len(), 3);
        assert_eq!(fc[0].date, day("2025-03-08"));
        assert_eq!(fc[2].date, day("2025-03-10"));
    }

    #[test]
    fn rejects_zero_horizon() {
        let engine = ForecastEngine::new();
        let h = history(&[1.0]);
        let err = engine
            .forecast(&h, 0, Algorithm::SeasonalNaive)
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter(_)));
    }

    #[test]
    fn rejects_empty_history() {
        let engine = ForecastEngine::new();
        let h = DailySeries::from_parts(vec![], vec![]).unwrap();
        let err = engine.forecast(&h, 7, Algorithm::SeasonalNaive).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter(_)));
    }

    #[test]
    fn external_without_capability_is_rejected() {
        let engine = ForecastEngine::new();
        let h = history(&[1.0, 2.0]);
        let err = engine.forecast(&h, 7, Algorithm::External).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter(_)));
    }

    #[derive(Debug)]
    struct StubModel {
        points: usize,
    }

    impl Forecaster for StubModel {
        fn fit_and_predict(
            &self,
            _history: &DailySeries,
            _horizon_days: usize,
        ) -> Result<ForecastSeries> {
            Ok((0..self.points)
                .map(|i| ForecastPoint {
                    // deliberately wrong dates; the engine re-keys them
                    date: day("1970-01-01"),
                    yhat: i as f64,
                    yhat_lower: Some(i as f64 - 1.0),
                    yhat_upper: Some(i as f64 + 1.0),
                })
                .collect())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn external_output_is_rekeyed_to_future_dates() {
        let engine = ForecastEngine::with_external(Box::new(StubModel { points: 2 }));
        let h = history(&[5.0, 6.0]);
        let fc = engine.forecast(&h, 2, Algorithm::External).unwrap();
        assert_eq!(fc[0].date, day("2025-03-03"));
        assert_eq!(fc[1].date, day("2025-03-04"));
        assert_eq!(fc[0].yhat_lower, Some(-1.0));
        assert_eq!(fc[1].yhat_upper, Some(2.0));
    }

    #[test]
    fn external_output_with_wrong_length_is_rejected() {
        let engine = ForecastEngine::with_external(Box::new(StubModel { points: 3 }));
        let h = history(&[5.0, 6.0]);
        let err = engine.forecast(&h, 2, Algorithm::External).unwrap_err();
        assert!(matches!(err, ForecastError::MalformedInput(_)));
    }
}
