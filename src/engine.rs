//! Stateless facade running each analytics report over a transaction table

use crate::aggregate::{customer_aggregates, daily_revenue, product_aggregates};
use crate::data::TransactionTable;
use crate::error::AnalyticsError;
use crate::forecast::{forecast_revenue, Forecast};
use crate::inventory::{inventory_report, InventoryReport};
use crate::ranking::{kpis, top_customers, KpiSummary, RankedCustomer};
use crate::sales::{sales_breakdown, SalesBreakdown};
use crate::segment::{segment_customers, Segmentation};
use crate::settings::EngineConfig;

/// A stateless calculator for every report derived from a transaction table.
///
/// The engine holds only its configuration. Each method aggregates the table
/// it is given and returns a fresh value; nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    config: EngineConfig,
}

impl AnalyticsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// K-Means customer segmentation with revenue-ranked labels.
    ///
    /// Fails with `InsufficientData` when the table has no customers.
    pub fn segment_customers(&self, table: &TransactionTable) -> Result<Segmentation, AnalyticsError> {
        tracing::info!(transactions = table.len(), "segmenting customers");
        let customers = customer_aggregates(table);
        let segmentation = segment_customers(&customers, &self.config.segmentation)?;
        tracing::info!(
            customers = segmentation.segments.len(),
            clusters = segmentation.effective_clusters,
            "segmentation complete"
        );
        Ok(segmentation)
    }

    /// Turnover per product plus low-stock and overstock alerts.
    pub fn inventory(&self, table: &TransactionTable) -> InventoryReport {
        tracing::info!(transactions = table.len(), "computing inventory health");
        let report = inventory_report(&product_aggregates(table), &self.config.inventory);
        tracing::info!(
            products = report.turnover.len(),
            low_stock = report.low_stock.len(),
            overstocked = report.overstocked.len(),
            "inventory health complete"
        );
        report
    }

    /// The `n` highest-revenue customers; `None` uses the configured default.
    pub fn top_customers(&self, table: &TransactionTable, n: Option<usize>) -> Vec<RankedCustomer> {
        let n = n.unwrap_or(self.config.ranking.top_n);
        tracing::info!(transactions = table.len(), n, "ranking customers");
        let ranked = top_customers(&customer_aggregates(table), n);
        tracing::info!(returned = ranked.len(), "ranking complete");
        ranked
    }

    /// Headline KPIs over `filtered`.
    ///
    /// Retention is measured against the customers of `population`, normally
    /// the unfiltered table.
    pub fn kpis(&self, filtered: &TransactionTable, population: &TransactionTable) -> KpiSummary {
        tracing::info!(
            transactions = filtered.len(),
            population = population.len(),
            "computing KPIs"
        );
        let summary = kpis(filtered, population.distinct_customers());
        tracing::info!(
            revenue = summary.total_revenue,
            orders = summary.distinct_orders,
            "KPIs complete"
        );
        summary
    }

    pub fn sales(&self, table: &TransactionTable) -> SalesBreakdown {
        tracing::info!(transactions = table.len(), "computing sales breakdown");
        let breakdown = sales_breakdown(table);
        tracing::info!(months = breakdown.monthly.len(), "sales breakdown complete");
        breakdown
    }

    /// Daily revenue forecast over the history plus the configured horizon.
    ///
    /// Fails with `InsufficientHistory` when fewer than two distinct dates are present.
    pub fn forecast(&self, table: &TransactionTable) -> Result<Forecast, AnalyticsError> {
        let daily = daily_revenue(table);
        tracing::info!(
            distinct_dates = daily.len(),
            horizon_days = self.config.forecast.horizon_days,
            "forecasting revenue"
        );
        let forecast = forecast_revenue(&daily, &self.config.forecast)?;
        tracing::info!(
            points = forecast.points.len(),
            changepoints = forecast.changepoints.len(),
            "forecast complete"
        );
        Ok(forecast)
    }
}
