//! Retailcast: analytics and forecasting over retail transaction data
//!
//! This library turns a table of joined transaction records into customer
//! segments, inventory health metrics, top-customer rankings, sales
//! breakdowns and a daily revenue forecast with uncertainty bounds.

pub mod aggregate;
pub mod cli;
pub mod data;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod inventory;
pub mod ranking;
pub mod sales;
pub mod segment;
pub mod settings;

// Re-export public items for easier access
pub use cli::{Args, ReportKind};
pub use data::{load_transactions, TransactionFilter, TransactionRecord, TransactionTable};
pub use engine::AnalyticsEngine;
pub use error::{AnalyticsError, ConfigError};
pub use forecast::{forecast_revenue, Forecast, ForecastComponents, ForecastPoint};
pub use inventory::{InventoryReport, ProductTurnover, TurnoverRate};
pub use ranking::{KpiSummary, RankedCustomer};
pub use sales::{CategoryStats, SalesBreakdown};
pub use segment::{CustomerSegment, SegmentLabel, Segmentation, SegmentSummary};
pub use settings::{load_config, EngineConfig};

/// Common result type used throughout the application
pub type Result<T> = std::result::Result<T, AnalyticsError>;
