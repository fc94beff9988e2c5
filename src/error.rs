//! Error types surfaced by the analytics engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Not enough data to perform calculation: {0}")]
    InsufficientData(String),

    #[error("Insufficient history for forecasting: {distinct_dates} distinct date(s), at least 2 required")]
    InsufficientHistory { distinct_dates: usize },

    #[error("Required column '{0}' is missing from the transaction table")]
    MissingColumn(String),

    #[error("Invalid transaction record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    #[error("Clustering failed: {0}")]
    Clustering(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read transaction data: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
