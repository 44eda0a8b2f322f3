//! SQLite persistence for datasets, sales, runs and metrics
//!
//! All state shared across calls lives here; nothing is cached in memory.
//! A [`Database`] handle is passed explicitly into every operation, scoped
//! to the call. Run records and their detail rows (forecast points, metric
//! rows) are always written inside a single transaction so a reader never
//! observes a run without its details.

use crate::error::{ForecastError, Result};
use crate::metrics::Metrics;
use crate::models::{ForecastPoint, ForecastSeries};
use crate::series::SalesSource;
use crate::window::DateWindow;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS datasets (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  uploaded_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  source_filename TEXT,
  notes TEXT
);

CREATE TABLE IF NOT EXISTS items (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT UNIQUE NOT NULL,
  category TEXT NOT NULL CHECK (category IN ('coffee','food'))
);

CREATE TABLE IF NOT EXISTS sales (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  dataset_id INTEGER NOT NULL,
  date TEXT NOT NULL,
  item_id INTEGER NOT NULL,
  quantity INTEGER NOT NULL CHECK (quantity >= 0),
  created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  FOREIGN KEY (dataset_id) REFERENCES datasets(id) ON DELETE CASCADE,
  FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sales_dataset_date ON sales(dataset_id, date);
CREATE INDEX IF NOT EXISTS idx_sales_item_date ON sales(item_id, date);

CREATE TABLE IF NOT EXISTS model_runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  dataset_id INTEGER NOT NULL,
  item_id INTEGER NOT NULL,
  algorithm TEXT NOT NULL,
  train_start TEXT NOT NULL,
  train_end TEXT NOT NULL,
  horizon_days INTEGER NOT NULL,
  created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  params_json TEXT,
  FOREIGN KEY (dataset_id) REFERENCES datasets(id) ON DELETE CASCADE,
  FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS forecasts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  model_run_id INTEGER NOT NULL,
  date TEXT NOT NULL,
  yhat REAL NOT NULL,
  yhat_lower REAL,
  yhat_upper REAL,
  created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  FOREIGN KEY (model_run_id) REFERENCES model_runs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_forecasts_run_date ON forecasts(model_run_id, date);

CREATE TABLE IF NOT EXISTS evaluation_runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  dataset_id INTEGER NOT NULL,
  algorithm TEXT NOT NULL,
  created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  params_json TEXT,
  FOREIGN KEY (dataset_id) REFERENCES datasets(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS evaluation_metrics (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  evaluation_run_id INTEGER NOT NULL,
  item_id INTEGER NOT NULL,
  metric_name TEXT NOT NULL,
  metric_value REAL NOT NULL,
  created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  FOREIGN KEY (evaluation_run_id) REFERENCES evaluation_runs(id) ON DELETE CASCADE,
  FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_eval_run_item ON evaluation_metrics(evaluation_run_id, item_id);
"#;

/// Item category, a closed enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Coffee,
    Food,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Coffee => "coffee",
            Category::Food => "food",
        }
    }
}

impl FromStr for Category {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "coffee" => Ok(Category::Coffee),
            "food" => Ok(Category::Food),
            other => Err(ForecastError::InvalidParameter(format!(
                "category must be 'coffee' or 'food', got {other:?}"
            ))),
        }
    }
}

/// One uploaded batch of sales history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    pub source_filename: Option<String>,
    pub notes: Option<String>,
    pub uploaded_at: String,
}

/// A sellable product, shared across datasets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub category: Category,
}

/// One raw sales row ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRow {
    /// ISO YYYY-MM-DD date
    pub date: String,
    pub item_id: i64,
    pub quantity: u32,
}

/// A persisted forecast invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRun {
    pub id: i64,
    pub dataset_id: i64,
    pub item_id: i64,
    pub algorithm: String,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub horizon_days: u32,
    pub created_at: String,
    pub params_json: Option<String>,
}

/// A persisted evaluation invocation for one (dataset, algorithm) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRun {
    pub id: i64,
    pub dataset_id: i64,
    pub algorithm: String,
    pub created_at: String,
    pub params_json: Option<String>,
}

/// Metrics stored for one item under an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemMetrics {
    pub item: Item,
    pub metrics: BTreeMap<String, f64>,
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_stored_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ForecastError::Database(format!("invalid stored date: {s:?}")))
}

fn parse_stored_category(s: &str) -> Result<Category> {
    s.parse()
        .map_err(|_| ForecastError::Database(format!("invalid stored category: {s:?}")))
}

/// Database wrapper for the sales/forecast schema
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Initialize the schema (idempotent)
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Insert a dataset record; datasets are immutable after creation
    pub fn create_dataset(
        &self,
        name: &str,
        source_filename: Option<&str>,
        notes: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO datasets (name, source_filename, notes) VALUES (?1, ?2, ?3)",
            params![name, source_filename, notes],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch a dataset by id
    pub fn get_dataset(&self, dataset_id: i64) -> Result<Dataset> {
        let found = self
            .conn
            .query_row(
                "SELECT id, name, source_filename, notes, uploaded_at FROM datasets WHERE id = ?1",
                params![dataset_id],
                |row| {
                    Ok(Dataset {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        source_filename: row.get(2)?,
                        notes: row.get(3)?,
                        uploaded_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        found.ok_or_else(|| ForecastError::NoData(format!("unknown dataset id {dataset_id}")))
    }

    /// Delete a dataset; its sales rows go with it (cascade)
    pub fn delete_dataset(&self, dataset_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM datasets WHERE id = ?1", params![dataset_id])?;
        Ok(())
    }

    /// Insert-or-reuse items by unique name, returning name -> id
    pub fn upsert_items(
        &mut self,
        names: &[String],
        category: Category,
    ) -> Result<HashMap<String, i64>> {
        let tx = self.conn.transaction()?;
        let mut out = HashMap::with_capacity(names.len());
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO items (name, category) VALUES (?1, ?2)",
            )?;
            let mut select = tx.prepare("SELECT id FROM items WHERE name = ?1")?;
            for name in names {
                insert.execute(params![name, category.as_str()])?;
                let id: i64 = select.query_row(params![name], |row| row.get(0))?;
                out.insert(name.clone(), id);
            }
        }
        tx.commit()?;
        Ok(out)
    }

    /// Fetch an item by id
    pub fn get_item(&self, item_id: i64) -> Result<Item> {
        let found = self
            .conn
            .query_row(
                "SELECT id, name, category FROM items WHERE id = ?1",
                params![item_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let (id, name, category) =
            found.ok_or_else(|| ForecastError::NoData(format!("unknown item id {item_id}")))?;
        Ok(Item {
            id,
            name,
            category: parse_stored_category(&category)?,
        })
    }

    /// Batch-insert sales rows for one dataset in a single transaction
    pub fn insert_sales(&mut self, dataset_id: i64, rows: &[SalesRow]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sales (dataset_id, date, item_id, quantity) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                stmt.execute(params![dataset_id, row.date, row.item_id, row.quantity])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Items that have at least one sales row in the dataset, optionally
    /// restricted to a category; ordered by category, then name.
    pub fn list_items_for_dataset(
        &self,
        dataset_id: i64,
        category: Option<Category>,
    ) -> Result<Vec<Item>> {
        let sql = "SELECT DISTINCT i.id, i.name, i.category
                   FROM items i
                   JOIN sales s ON s.item_id = i.id
                   WHERE s.dataset_id = ?1
                     AND (?2 IS NULL OR i.category = ?2)
                   ORDER BY i.category, i.name";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(
                params![dataset_id, category.map(|c| c.as_str())],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, name, category)| {
                Ok(Item {
                    id,
                    name,
                    category: parse_stored_category(&category)?,
                })
            })
            .collect()
    }

    /// Persist a model run together with all its forecast points in one
    /// transaction, so a reader never sees a run without points.
    pub fn create_model_run_with_forecasts(
        &mut self,
        dataset_id: i64,
        item_id: i64,
        algorithm: &str,
        train: &DateWindow,
        horizon_days: u32,
        params_json: &str,
        forecast: &ForecastSeries,
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO model_runs
               (dataset_id, item_id, algorithm, train_start, train_end, horizon_days, params_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                dataset_id,
                item_id,
                algorithm,
                iso(train.start),
                iso(train.end),
                horizon_days,
                params_json,
            ],
        )?;
        let run_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO forecasts (model_run_id, date, yhat, yhat_lower, yhat_upper)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for point in forecast {
                stmt.execute(params![
                    run_id,
                    iso(point.date),
                    point.yhat,
                    point.yhat_lower,
                    point.yhat_upper,
                ])?;
            }
        }
        tx.commit()?;
        Ok(run_id)
    }

    /// Fetch a model run by id
    pub fn get_model_run(&self, model_run_id: i64) -> Result<ModelRun> {
        let found = self
            .conn
            .query_row(
                "SELECT id, dataset_id, item_id, algorithm, train_start, train_end,
                        horizon_days, created_at, params_json
                 FROM model_runs WHERE id = ?1",
                params![model_run_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, u32>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()?;
        let (id, dataset_id, item_id, algorithm, train_start, train_end, horizon_days, created_at, params_json) =
            found.ok_or_else(|| {
                ForecastError::NoData(format!("unknown model run id {model_run_id}"))
            })?;
        Ok(ModelRun {
            id,
            dataset_id,
            item_id,
            algorithm,
            train_start: parse_stored_date(&train_start)?,
            train_end: parse_stored_date(&train_end)?,
            horizon_days,
            created_at,
            params_json,
        })
    }

    /// Forecast points for a run restricted to `[start, end]`, ascending
    pub fn forecasts_in_range(
        &self,
        model_run_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ForecastSeries> {
        let mut stmt = self.conn.prepare(
            "SELECT date, yhat, yhat_lower, yhat_upper
             FROM forecasts
             WHERE model_run_id = ?1 AND date BETWEEN ?2 AND ?3
             ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![model_run_id, iso(start), iso(end)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(date, yhat, yhat_lower, yhat_upper)| {
                Ok(ForecastPoint {
                    date: parse_stored_date(&date)?,
                    yhat,
                    yhat_lower,
                    yhat_upper,
                })
            })
            .collect()
    }

    /// Insert an evaluation run record
    pub fn create_evaluation_run(
        &self,
        dataset_id: i64,
        algorithm: &str,
        params_json: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO evaluation_runs (dataset_id, algorithm, params_json) VALUES (?1, ?2, ?3)",
            params![dataset_id, algorithm, params_json],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch an evaluation run by id
    pub fn get_evaluation_run(&self, run_id: i64) -> Result<EvaluationRun> {
        let found = self
            .conn
            .query_row(
                "SELECT id, dataset_id, algorithm, created_at, params_json
                 FROM evaluation_runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok(EvaluationRun {
                        id: row.get(0)?,
                        dataset_id: row.get(1)?,
                        algorithm: row.get(2)?,
                        created_at: row.get(3)?,
                        params_json: row.get(4)?,
                    })
                },
            )
            .optional()?;
        found.ok_or_else(|| ForecastError::NoData(format!("unknown evaluation run id {run_id}")))
    }

    /// Write one item's metric triple under a run, atomically
    pub fn record_item_metrics(
        &mut self,
        evaluation_run_id: i64,
        item_id: i64,
        metrics: &Metrics,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO evaluation_metrics
                   (evaluation_run_id, item_id, metric_name, metric_value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (name, value) in [
                ("mae", metrics.mae),
                ("rmse", metrics.rmse),
                ("mape", metrics.mape),
            ] {
                stmt.execute(params![evaluation_run_id, item_id, name, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All stored metrics for a run, grouped per item and ordered by
    /// category, then item name.
    pub fn metrics_for_run(&self, evaluation_run_id: i64) -> Result<Vec<ItemMetrics>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.item_id, i.name, i.category, m.metric_name, m.metric_value
             FROM evaluation_metrics m
             JOIN items i ON i.id = m.item_id
             WHERE m.evaluation_run_id = ?1
             ORDER BY i.category, i.name, m.metric_name",
        )?;
        let rows = stmt
            .query_map(params![evaluation_run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out: Vec<ItemMetrics> = Vec::new();
        for (item_id, name, category, metric_name, metric_value) in rows {
            if out.last().map(|m| m.item.id) != Some(item_id) {
                out.push(ItemMetrics {
                    item: Item {
                        id: item_id,
                        name,
                        category: parse_stored_category(&category)?,
                    },
                    metrics: BTreeMap::new(),
                });
            }
            if let Some(entry) = out.last_mut() {
                entry.metrics.insert(metric_name, metric_value);
            }
        }
        Ok(out)
    }
}

impl SalesSource for Database {
    fn daily_totals(
        &self,
        dataset_id: i64,
        item_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, SUM(quantity) AS quantity
             FROM sales
             WHERE dataset_id = ?1 AND item_id = ?2 AND date BETWEEN ?3 AND ?4
             GROUP BY date
             ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(
                params![dataset_id, item_id, iso(start), iso(end)],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(date, quantity)| Ok((parse_stored_date(&date)?, quantity)))
            .collect()
    }

    fn latest_sale_date(&self, dataset_id: i64) -> Result<Option<NaiveDate>> {
        let max: Option<String> = self.conn.query_row(
            "SELECT MAX(date) FROM sales WHERE dataset_id = ?1",
            params![dataset_id],
            |row| row.get(0),
        )?;
        max.as_deref().map(parse_stored_date).transpose()
    }
}
