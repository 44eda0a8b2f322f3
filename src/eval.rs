//! Backtest evaluation orchestration
//!
//! Runs one backtest per (algorithm, item) pair over a shared train/holdout
//! split, scores the forecast against the holdout, and persists the results.
//! A failure on one item is recorded as that item's outcome and never aborts
//! the rest of the run.

use crate::error::{ForecastError, Result};
use crate::metrics::{align_by_date, Metrics};
use crate::models::{Algorithm, ForecastEngine};
use crate::series::{assemble_daily_series, SalesSource};
use crate::store::{Category, Database, Item};
use crate::window::{backtest_windows, BacktestWindows};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;

/// Parameters for one evaluation sweep over a dataset
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub dataset_id: i64,
    pub algorithms: Vec<Algorithm>,
    pub train_weeks: u32,
    pub horizon_weeks: u32,
    /// Restrict to one category; `None` means all items
    pub category: Option<Category>,
    /// Restrict to explicit item ids; `None` means every item with sales
    pub item_ids: Option<Vec<i64>>,
}

/// Windows and metrics from a single item's backtest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemBacktest {
    pub windows: BacktestWindows,
    pub metrics: Metrics,
}

/// Terminal state of one item within an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemResult {
    Scored { metrics: Metrics },
    Failed { message: String },
}

/// One item's outcome inside an algorithm run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub item: Item,
    pub result: ItemResult,
}

/// All item outcomes for one algorithm, tied to its stored run record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmRun {
    pub evaluation_run_id: i64,
    pub algorithm: String,
    pub items: Vec<ItemOutcome>,
}

/// Result of a full evaluation sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub dataset_id: i64,
    pub runs: Vec<AlgorithmRun>,
}

/// Backtest a single item: train on the training window, forecast the
/// holdout, align by date and score.
pub fn backtest_item(
    db: &Database,
    engine: &ForecastEngine,
    dataset_id: i64,
    item_id: i64,
    algorithm: Algorithm,
    train_weeks: u32,
    horizon_weeks: u32,
) -> Result<ItemBacktest> {
    let latest = db.latest_sale_date(dataset_id)?;
    let windows = backtest_windows(latest, train_weeks, horizon_weeks)?;

    let history = assemble_daily_series(
        db,
        dataset_id,
        item_id,
        windows.train.start,
        windows.train.end,
    )?;
    if history.observed_days() == 0 {
        return Err(ForecastError::InsufficientData(format!(
            "item {item_id} has no sales rows in the training window"
        )));
    }

    let actual = assemble_daily_series(
        db,
        dataset_id,
        item_id,
        windows.holdout.start,
        windows.holdout.end,
    )?;
    if actual.observed_days() == 0 {
        return Err(ForecastError::InsufficientData(format!(
            "item {item_id} has no sales rows in the holdout window"
        )));
    }

    let horizon_days = windows.holdout.days() as usize;
    let forecast = engine.forecast(&history, horizon_days, algorithm)?;

    let (y_true, y_pred) = align_by_date(&actual, &forecast);
    if y_true.is_empty() {
        return Err(ForecastError::InsufficientOverlap(format!(
            "no holdout dates align with the forecast for item {item_id}"
        )));
    }

    Ok(ItemBacktest {
        windows,
        metrics: Metrics::compute(&y_true, &y_pred),
    })
}

fn resolve_items(db: &Database, req: &EvaluationRequest) -> Result<Vec<Item>> {
    let mut items = db.list_items_for_dataset(req.dataset_id, req.category)?;
    if let Some(ids) = &req.item_ids {
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        items.retain(|item| wanted.contains(&item.id));
    }
    if items.is_empty() {
        return Err(ForecastError::InvalidSelection(
            "no items match the evaluation selection".to_string(),
        ));
    }
    Ok(items)
}

/// Run the full evaluation sweep described by `req`.
///
/// For each algorithm a run record is created up front, then every selected
/// item is backtested; scored items get their metrics persisted under the
/// run, failed items are reported in the outcome only.
pub fn run_evaluation(
    db: &mut Database,
    engine: &ForecastEngine,
    req: &EvaluationRequest,
) -> Result<EvaluationOutcome> {
    if req.algorithms.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "at least one algorithm is required".to_string(),
        ));
    }
    db.get_dataset(req.dataset_id)?;
    let items = resolve_items(db, req)?;

    let params_json = json!({
        "train_weeks": req.train_weeks,
        "horizon_weeks": req.horizon_weeks,
        "category": req.category.map(|c| c.as_str()),
    })
    .to_string();

    let mut runs = Vec::with_capacity(req.algorithms.len());
    for &algorithm in &req.algorithms {
        let run_id = db.create_evaluation_run(req.dataset_id, algorithm.as_str(), &params_json)?;
        log::info!(
            "evaluation run {run_id}: {} over {} item(s)",
            algorithm.as_str(),
            items.len()
        );

        let mut outcomes = Vec::with_capacity(items.len());
        for item in &items {
            let result = match backtest_item(
                db,
                engine,
                req.dataset_id,
                item.id,
                algorithm,
                req.train_weeks,
                req.horizon_weeks,
            ) {
                Ok(backtest) => {
                    db.record_item_metrics(run_id, item.id, &backtest.metrics)?;
                    ItemResult::Scored {
                        metrics: backtest.metrics,
                    }
                }
                Err(err) => {
                    log::warn!(
                        "evaluation run {run_id}: item {} ({}) failed: {err}",
                        item.id,
                        item.name
                    );
                    ItemResult::Failed {
                        message: err.to_string(),
                    }
                }
            };
            outcomes.push(ItemOutcome {
                item: item.clone(),
                result,
            });
        }

        runs.push(AlgorithmRun {
            evaluation_run_id: run_id,
            algorithm: algorithm.as_str().to_string(),
            items: outcomes,
        });
    }

    Ok(EvaluationOutcome {
        dataset_id: req.dataset_id,
        runs,
    })
}
