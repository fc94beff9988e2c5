//! Command-line interface definitions and argument parsing

use crate::data::{parse_date, TransactionFilter, TransactionTable};
use crate::settings::EngineConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which report to print
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Headline KPIs for the filtered data
    Overview,
    /// Revenue by category, region and month
    Sales,
    /// K-Means customer segments
    Segments,
    /// Turnover, low-stock and overstock alerts
    Inventory,
    /// Highest-revenue customers
    TopCustomers,
    /// Daily revenue forecast
    Forecast,
}

/// Retail analytics and revenue forecasting over a transaction CSV
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "transactions.csv")]
    pub input: PathBuf,

    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Report to produce
    #[arg(short, long, value_enum, default_value_t = ReportKind::Overview)]
    pub report: ReportKind,

    /// Keep transactions on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Keep transactions on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Keep only these categories (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Keep only these regions (repeatable)
    #[arg(long = "region")]
    pub regions: Vec<String>,

    /// Number of customers in the top-customers report
    #[arg(short = 'n', long)]
    pub top: Option<usize>,

    /// Forecast horizon in days
    #[arg(long)]
    pub horizon: Option<u32>,

    /// Seed for clustering and forecast simulation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the transaction filter from the date, category and region flags
    pub fn to_filter(&self) -> anyhow::Result<TransactionFilter> {
        let date = |flag: &str, raw: &Option<String>| -> anyhow::Result<_> {
            raw.as_deref()
                .map(|value| {
                    parse_date(value.trim())
                        .ok_or_else(|| anyhow::anyhow!("Invalid --{} date: {}", flag, value))
                })
                .transpose()
        };

        Ok(TransactionFilter {
            from: date("from", &self.from)?,
            to: date("to", &self.to)?,
            categories: self.categories.iter().cloned().collect(),
            regions: self.regions.iter().cloned().collect(),
        })
    }

    /// Reject `--category` / `--region` values that never occur in `table`
    pub fn check_selection(&self, table: &TransactionTable) -> anyhow::Result<()> {
        let known_categories = table.categories();
        if let Some(unknown) = self.categories.iter().find(|c| !known_categories.contains(c)) {
            anyhow::bail!(
                "Unknown category '{}'; available: {}",
                unknown,
                known_categories.join(", ")
            );
        }
        let known_regions = table.regions();
        if let Some(unknown) = self.regions.iter().find(|r| !known_regions.contains(r)) {
            anyhow::bail!(
                "Unknown region '{}'; available: {}",
                unknown,
                known_regions.join(", ")
            );
        }
        Ok(())
    }

    /// Apply flag overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(top) = self.top {
            config.ranking.top_n = top;
        }
        if let Some(horizon) = self.horizon {
            config.forecast.horizon_days = horizon;
        }
        if let Some(seed) = self.seed {
            config.segmentation.seed = seed;
            config.forecast.seed = seed;
        }
    }
}
