//! # Sales Forecast
//!
//! A Rust library for daily sales forecasting and backtest evaluation over
//! uploaded point-of-sale CSV exports.
//!
//! ## Features
//!
//! - Wide-CSV normalization (one `Date` column plus one column per item)
//! - Gap-filled continuous daily series assembly from sparse sales rows
//! - Training and backtest window arithmetic in whole weeks
//! - A built-in seasonal-naive baseline plus a pluggable external model
//! - MAE / RMSE / MAPE scoring of forecasts against holdout data
//! - Evaluation sweeps with per-item failure isolation
//! - SQLite persistence for datasets, runs, forecasts and metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sales_forecast::api;
//! use sales_forecast::models::{Algorithm, ForecastEngine};
//! use sales_forecast::store::{Category, Database};
//!
//! # fn main() -> sales_forecast::Result<()> {
//! let mut db = Database::open("sales.db")?;
//! db.init_schema()?;
//!
//! // Import a wide sales CSV as a new dataset
//! let raw = std::fs::read("march.csv")?;
//! let report = api::import_csv(&mut db, &raw, "march.csv", "march", Category::Coffee, None)?;
//!
//! // Forecast two weeks ahead for the first imported item
//! let items = db.list_items_for_dataset(report.dataset_id, None)?;
//! let engine = ForecastEngine::new();
//! let outcome = api::run_forecast(
//!     &mut db,
//!     &engine,
//!     report.dataset_id,
//!     items[0].id,
//!     Algorithm::SeasonalNaive,
//!     6, // train weeks
//!     2, // horizon weeks
//! )?;
//! println!("run {} produced {} points", outcome.model_run_id, outcome.forecast.len());
//!
//! // Backtest the baseline over the whole dataset
//! let sweep = api::run_evaluation(
//!     &mut db,
//!     &engine,
//!     report.dataset_id,
//!     &["baseline".to_string()],
//!     6,
//!     2,
//!     None,
//!     None,
//! )?;
//! let results = api::evaluation_results(&db, sweep.runs[0].evaluation_run_id)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod eval;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod series;
pub mod store;
pub mod window;

// Re-export commonly used types
pub use crate::error::{ForecastError, Result};
pub use crate::metrics::Metrics;
pub use crate::models::{Algorithm, ForecastEngine, ForecastPoint, ForecastSeries, Forecaster};
pub use crate::series::{assemble_daily_series, DailySeries, SalesSource};
pub use crate::store::{Category, Database};
pub use crate::window::{backtest_windows, train_window, BacktestWindows, DateWindow};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
