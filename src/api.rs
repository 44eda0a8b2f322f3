//! High-level operations tying ingestion, forecasting, evaluation and
//! storage together
//!
//! Every function takes the [`Database`] handle explicitly and returns a
//! plain serializable result; callers (a CLI, an HTTP layer) decide how to
//! render it. Raw user strings (algorithm and category names) are resolved
//! into typed values here, at the boundary.

use crate::error::{ForecastError, Result};
use crate::eval::{self, EvaluationOutcome, EvaluationRequest};
use crate::ingest::{normalize_count_column, parse_wide_csv};
use crate::models::{Algorithm, ForecastEngine, ForecastSeries};
use crate::series::{assemble_daily_series, SalesSource};
use crate::store::{Category, Database, EvaluationRun, ItemMetrics, ModelRun, SalesRow};
use crate::window::{train_window, DateWindow};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

/// Summary of one CSV import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub dataset_id: i64,
    pub item_names: Vec<String>,
    pub rows_inserted: usize,
}

/// A freshly produced and persisted forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastOutcome {
    pub model_run_id: i64,
    pub train_window: DateWindow,
    pub horizon_days: u32,
    pub forecast: ForecastSeries,
}

/// A date-restricted view over a stored forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastZoom {
    pub run: ModelRun,
    pub points: ForecastSeries,
}

/// Stored metrics for one evaluation run, grouped per item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub run: EvaluationRun,
    pub items: Vec<ItemMetrics>,
}

/// Import a wide sales CSV as a new dataset.
///
/// The upload is parsed and normalized first; nothing is written unless the
/// whole file is valid. All items in one file share the given category.
pub fn import_csv(
    db: &mut Database,
    raw: &[u8],
    filename: &str,
    dataset_name: &str,
    category: Category,
    notes: Option<&str>,
) -> Result<IngestReport> {
    let parsed = normalize_count_column(parse_wide_csv(raw)?, filename);

    let dataset_id = db.create_dataset(dataset_name, Some(filename), notes)?;
    let ids = db.upsert_items(&parsed.item_names, category)?;

    let mut rows = Vec::with_capacity(parsed.rows.len() * parsed.item_names.len());
    for (date, quantities) in &parsed.rows {
        for (name, &quantity) in parsed.item_names.iter().zip(quantities.iter()) {
            rows.push(SalesRow {
                date: date.clone(),
                item_id: ids[name],
                quantity,
            });
        }
    }
    let rows_inserted = db.insert_sales(dataset_id, &rows)?;

    log::info!(
        "imported {filename:?} as dataset {dataset_id}: {} item(s), {rows_inserted} sales row(s)",
        parsed.item_names.len()
    );
    Ok(IngestReport {
        dataset_id,
        item_names: parsed.item_names,
        rows_inserted,
    })
}

/// Produce and persist a forward forecast for one item.
///
/// Training covers the last `train_weeks` weeks of the dataset's history;
/// the forecast spans the `7 * horizon_weeks` days after it. The run record
/// and its points are stored atomically.
pub fn run_forecast(
    db: &mut Database,
    engine: &ForecastEngine,
    dataset_id: i64,
    item_id: i64,
    algorithm: Algorithm,
    train_weeks: u32,
    horizon_weeks: u32,
) -> Result<ForecastOutcome> {
    if horizon_weeks == 0 {
        return Err(ForecastError::InvalidParameter(
            "horizon_weeks must be > 0".to_string(),
        ));
    }
    db.get_dataset(dataset_id)?;
    db.get_item(item_id)?;

    let latest = db.latest_sale_date(dataset_id)?;
    let train = train_window(latest, train_weeks)?;
    let history = assemble_daily_series(db, dataset_id, item_id, train.start, train.end)?;
    if history.observed_days() == 0 {
        return Err(ForecastError::InsufficientData(format!(
            "item {item_id} has no sales rows in the training window"
        )));
    }

    let horizon_days = horizon_weeks * 7;
    let forecast = engine.forecast(&history, horizon_days as usize, algorithm)?;

    let params_json = json!({
        "train_weeks": train_weeks,
        "horizon_weeks": horizon_weeks,
    })
    .to_string();
    let model_run_id = db.create_model_run_with_forecasts(
        dataset_id,
        item_id,
        algorithm.as_str(),
        &train,
        horizon_days,
        &params_json,
        &forecast,
    )?;

    log::info!(
        "model run {model_run_id}: {} for item {item_id}, {horizon_days} day(s)",
        algorithm.as_str()
    );
    Ok(ForecastOutcome {
        model_run_id,
        train_window: train,
        horizon_days,
        forecast,
    })
}

/// Fetch the points of a stored forecast restricted to `[start, end]`.
pub fn zoom_forecast(
    db: &Database,
    model_run_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ForecastZoom> {
    if end < start {
        return Err(ForecastError::InvalidRange(format!(
            "zoom end {end} must be >= start {start}"
        )));
    }
    let run = db.get_model_run(model_run_id)?;
    let points = db.forecasts_in_range(model_run_id, start, end)?;
    Ok(ForecastZoom { run, points })
}

/// Run a backtest evaluation sweep, resolving raw algorithm and category
/// names at the boundary.
pub fn run_evaluation(
    db: &mut Database,
    engine: &ForecastEngine,
    dataset_id: i64,
    algorithm_names: &[String],
    train_weeks: u32,
    horizon_weeks: u32,
    category: Option<&str>,
    item_ids: Option<Vec<i64>>,
) -> Result<EvaluationOutcome> {
    let algorithms = algorithm_names
        .iter()
        .map(|name| name.parse::<Algorithm>())
        .collect::<Result<Vec<_>>>()?;
    let category = category.map(|c| c.parse::<Category>()).transpose()?;

    let req = EvaluationRequest {
        dataset_id,
        algorithms,
        train_weeks,
        horizon_weeks,
        category,
        item_ids,
    };
    eval::run_evaluation(db, engine, &req)
}

/// Stored metrics for a finished evaluation run, ordered by category and
/// item name.
pub fn evaluation_results(db: &Database, evaluation_run_id: i64) -> Result<EvaluationReport> {
    let run = db.get_evaluation_run(evaluation_run_id)?;
    let items = db.metrics_for_run(evaluation_run_id)?;
    Ok(EvaluationReport { run, items })
}
