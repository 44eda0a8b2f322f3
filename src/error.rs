//! Error types for the sales_forecast crate

use thiserror::Error;

/// Custom error types for the sales_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Unparseable CSV structure, date or quantity
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Out-of-range train/horizon lengths or unknown algorithm name
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dataset has no recorded sales dates
    #[error("no data: {0}")]
    NoData(String),

    /// A requested window has no usable sales rows
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// End date before start date
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// No aligned dates between predicted and actual series
    #[error("insufficient overlap: {0}")]
    InsufficientOverlap(String),

    /// Empty item set for an evaluation request
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the storage layer
    #[error("database error: {0}")]
    Database(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<rusqlite::Error> for ForecastError {
    fn from(err: rusqlite::Error) -> Self {
        ForecastError::Database(err.to_string())
    }
}
