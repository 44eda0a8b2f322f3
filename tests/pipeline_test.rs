use chrono::{Duration, NaiveDate};
use sales_forecast::api;
use sales_forecast::eval::ItemResult;
use sales_forecast::models::{Algorithm, ForecastEngine, ForecastPoint, Forecaster};
use sales_forecast::series::DailySeries;
use sales_forecast::store::{Category, Database, SalesRow};
use sales_forecast::{ForecastError, ForecastSeries, Result};
use std::fmt::Write as _;
use tempfile::TempDir;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

// A 70-day wide CSV ending 31/10/2025 with two items: Cappuccino cycles
// over a strict weekly pattern, Americano sells a flat 5 per day.
fn sample_csv() -> Vec<u8> {
    let mut out = String::from("Date,Cappuccino,Americano\n");
    let start = day("2025-10-31") - Duration::days(69);
    for offset in 0..70 {
        let d = start + Duration::days(offset);
        writeln!(out, "{},{},5", d.format("%d/%m/%Y"), offset % 7 + 1).unwrap();
    }
    out.into_bytes()
}

fn open_db(dir: &TempDir) -> Database {
    let db = Database::open(dir.path().join("sales.db")).unwrap();
    db.init_schema().unwrap();
    db
}

#[test]
fn import_forecast_and_zoom_end_to_end() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);

    // 1. Import the upload
    let report = api::import_csv(
        &mut db,
        &sample_csv(),
        "Pink Cafe Sales.csv",
        "autumn",
        Category::Coffee,
        Some("autumn export"),
    )
    .unwrap();
    assert_eq!(report.item_names, vec!["Cappuccino", "Americano"]);
    assert_eq!(report.rows_inserted, 140);

    // 2. Forecast two weeks ahead for Cappuccino
    let items = db.list_items_for_dataset(report.dataset_id, None).unwrap();
    let cappuccino = items.iter().find(|i| i.name == "Cappuccino").unwrap();
    let engine = ForecastEngine::new();
    let outcome = api::run_forecast(
        &mut db,
        &engine,
        report.dataset_id,
        cappuccino.id,
        Algorithm::SeasonalNaive,
        6,
        2,
    )
    .unwrap();
    assert_eq!(outcome.forecast.len(), 14);
    assert_eq!(outcome.forecast[0].date, day("2025-11-01"));
    assert_eq!(outcome.forecast[13].date, day("2025-11-14"));

    // 3. Zoom into the stored forecast
    let zoom = api::zoom_forecast(
        &db,
        outcome.model_run_id,
        day("2025-11-05"),
        day("2025-11-08"),
    )
    .unwrap();
    assert_eq!(zoom.points.len(), 4);
    assert_eq!(zoom.points, outcome.forecast[4..8].to_vec());
    assert_eq!(zoom.run.algorithm, "baseline_seasonal_naive_7");
}

#[test]
fn evaluation_scores_every_item_and_persists_metrics() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);

    let report = api::import_csv(
        &mut db,
        &sample_csv(),
        "Pink Cafe Sales.csv",
        "autumn",
        Category::Coffee,
        None,
    )
    .unwrap();
    let engine = ForecastEngine::new();

    let sweep = api::run_evaluation(
        &mut db,
        &engine,
        report.dataset_id,
        &["baseline".to_string()],
        6,
        2,
        None,
        None,
    )
    .unwrap();
    assert_eq!(sweep.runs.len(), 1);
    let run = &sweep.runs[0];
    assert_eq!(run.items.len(), 2);
    assert!(run
        .items
        .iter()
        .all(|o| matches!(o.result, ItemResult::Scored { .. })));

    // Both items are perfectly weekly, so the one-week lookback scores a
    // clean holdout within the first 7 days and a flat line after; metrics
    // are finite and non-negative either way.
    let results = api::evaluation_results(&db, run.evaluation_run_id).unwrap();
    assert_eq!(results.items.len(), 2);
    for item in &results.items {
        assert_eq!(item.metrics.len(), 3);
        for (name, value) in &item.metrics {
            assert!(
                value.is_finite() && *value >= 0.0,
                "{name} for {} should be a non-negative finite number",
                item.item.name
            );
        }
    }
    // Americano is flat, so even the flat-line tail is exact.
    let americano = results
        .items
        .iter()
        .find(|m| m.item.name == "Americano")
        .unwrap();
    assert_eq!(americano.metrics["mae"], 0.0);
    assert_eq!(americano.metrics["rmse"], 0.0);
}

#[test]
fn data_poor_item_fails_in_isolation() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);

    let report = api::import_csv(
        &mut db,
        &sample_csv(),
        "Pink Cafe Sales.csv",
        "autumn",
        Category::Coffee,
        None,
    )
    .unwrap();

    // One extra item whose only sale is long before the backtest windows.
    let stale = db
        .upsert_items(&["Stale Scone".to_string()], Category::Food)
        .unwrap()["Stale Scone"];
    db.insert_sales(
        report.dataset_id,
        &[SalesRow {
            date: "2024-01-01".to_string(),
            item_id: stale,
            quantity: 2,
        }],
    )
    .unwrap();

    let engine = ForecastEngine::new();
    let sweep = api::run_evaluation(
        &mut db,
        &engine,
        report.dataset_id,
        &["baseline".to_string()],
        6,
        2,
        None,
        None,
    )
    .unwrap();

    let run = &sweep.runs[0];
    assert_eq!(run.items.len(), 3);
    let failed: Vec<_> = run
        .items
        .iter()
        .filter(|o| matches!(o.result, ItemResult::Failed { .. }))
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].item.name, "Stale Scone");

    // Scored items still have their 3 metric rows each.
    let results = api::evaluation_results(&db, run.evaluation_run_id).unwrap();
    assert_eq!(results.items.len(), 2);
    assert!(results.items.iter().all(|m| m.metrics.len() == 3));
}

#[derive(Debug)]
struct FlatTen;

impl Forecaster for FlatTen {
    fn fit_and_predict(
        &self,
        history: &DailySeries,
        horizon_days: usize,
    ) -> Result<ForecastSeries> {
        let last = history
            .last_date()
            .ok_or_else(|| ForecastError::InvalidParameter("empty history".to_string()))?;
        Ok((1..=horizon_days as i64)
            .map(|i| ForecastPoint {
                date: last + Duration::days(i),
                yhat: 10.0,
                yhat_lower: Some(8.0),
                yhat_upper: Some(12.0),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "flat-ten"
    }
}

#[test]
fn external_model_flows_through_forecast_and_evaluation() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);

    let report = api::import_csv(
        &mut db,
        &sample_csv(),
        "Pink Cafe Sales.csv",
        "autumn",
        Category::Coffee,
        None,
    )
    .unwrap();
    let items = db.list_items_for_dataset(report.dataset_id, None).unwrap();
    let engine = ForecastEngine::with_external(Box::new(FlatTen));

    let outcome = api::run_forecast(
        &mut db,
        &engine,
        report.dataset_id,
        items[0].id,
        Algorithm::External,
        6,
        1,
    )
    .unwrap();
    assert!(outcome.forecast.iter().all(|p| p.yhat == 10.0));
    assert!(outcome.forecast.iter().all(|p| p.yhat_lower == Some(8.0)));

    let sweep = api::run_evaluation(
        &mut db,
        &engine,
        report.dataset_id,
        &["external-model".to_string()],
        6,
        1,
        None,
        None,
    )
    .unwrap();
    // Americano sells a flat 5/day, so the constant-10 model is off by 5.
    let results = api::evaluation_results(&db, sweep.runs[0].evaluation_run_id).unwrap();
    let americano = results
        .items
        .iter()
        .find(|m| m.item.name == "Americano")
        .unwrap();
    assert_eq!(americano.metrics["mae"], 5.0);
    assert_eq!(americano.metrics["mape"], 100.0);
}
