//! Forecast accuracy metrics
//!
//! Pure functions over two equal-length sequences that the caller has
//! already aligned by date. Empty input is a defined fallback (0.0), not
//! an error; deciding whether an empty alignment is acceptable is the
//! caller's job.

use crate::models::ForecastSeries;
use crate::series::DailySeries;
use serde::Serialize;
use std::collections::HashMap;

/// Accuracy metric triple for one aligned actual/predicted pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
}

impl Metrics {
    /// Compute all three metrics over aligned sequences
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            mae: mae(actual, predicted),
            rmse: rmse(actual, predicted),
            mape: mape(actual, predicted),
        }
    }
}

/// Mean absolute error; 0.0 for empty input
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();
    sum / actual.len() as f64
}

/// Root mean squared error; 0.0 for empty input
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sum / actual.len() as f64).sqrt()
}

/// Mean absolute percentage error, computed only over pairs whose actual
/// value is nonzero; 0.0 when no such pair exists.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = actual
        .iter()
        .zip(predicted.iter())
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| (*a, *p))
        .collect();
    if pairs.is_empty() {
        return 0.0;
    }
    let sum: f64 = pairs.iter().map(|(a, p)| ((a - p) / a).abs()).sum();
    100.0 * sum / pairs.len() as f64
}

/// Align a predicted series with an actual series by exact date-key
/// intersection, returning `(actual, predicted)` value vectors in
/// prediction order. Dates present on only one side are dropped silently;
/// callers decide whether an empty intersection is an error.
pub fn align_by_date(actual: &DailySeries, predicted: &ForecastSeries) -> (Vec<f64>, Vec<f64>) {
    let actual_map: HashMap<_, _> = actual
        .dates()
        .iter()
        .copied()
        .zip(actual.values().iter().copied())
        .collect();

    let mut y_true = Vec::new();
    let mut y_pred = Vec::new();
    for point in predicted {
        if let Some(&a) = actual_map.get(&point.date) {
            y_true.push(a);
            y_pred.push(point.yhat);
        }
    }
    (y_true, y_pred)
}
