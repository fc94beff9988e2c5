//! Retailcast: prints analytics reports and revenue forecasts for a transaction CSV
//!
//! This is the main entrypoint that orchestrates configuration, data loading,
//! filtering and a single engine report.

use anyhow::{Context, Result};
use clap::Parser;
use retailcast::forecast::Forecast;
use retailcast::{
    load_config, load_transactions, AnalyticsEngine, Args, ReportKind, TransactionTable,
};
use std::time::Instant;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    let engine = AnalyticsEngine::new(config);

    let start_time = Instant::now();
    let table = load_transactions(&args.input)
        .with_context(|| format!("Failed to load transactions from {}", args.input.display()))?;
    args.check_selection(&table)?;
    let filtered = table.filter(&args.to_filter()?);
    tracing::info!(
        loaded = table.len(),
        kept = filtered.len(),
        "transactions loaded and filtered"
    );

    match args.report {
        ReportKind::Overview => print_overview(&engine, &filtered, &table),
        ReportKind::Sales => print_sales(&engine, &filtered),
        ReportKind::Segments => print_segments(&engine, &filtered)?,
        ReportKind::Inventory => print_inventory(&engine, &filtered),
        ReportKind::TopCustomers => print_top_customers(&engine, &filtered, args.top),
        ReportKind::Forecast => print_forecast(&engine.forecast(&filtered)?, args.verbose),
    }

    if args.verbose {
        println!("\nTotal processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    }
    Ok(())
}

fn print_overview(
    engine: &AnalyticsEngine,
    filtered: &TransactionTable,
    population: &TransactionTable,
) {
    let kpis = engine.kpis(filtered, population);
    println!("=== Overview ===");
    if let (Some(first), Some(last)) = (kpis.first_date, kpis.last_date) {
        println!("Period: {} to {}", first, last);
    }
    println!("Transactions:        {}", kpis.transactions);
    println!("Customers:           {}", kpis.distinct_customers);
    println!("Products:            {}", kpis.distinct_products);
    println!("Total revenue:       {:.2}", kpis.total_revenue);
    println!("Orders:              {}", kpis.distinct_orders);
    println!("Average order value: {:.2}", kpis.average_order_value);
    println!("Customer retention:  {:.1}%", kpis.customer_retention_pct);
    println!("Profit margin:       {:.1}%", kpis.profit_margin_pct);

    println!("\n=== Quick Stats ===");
    for c in &engine.sales(filtered).category_stats {
        println!(
            "{:<20} {:>5} customers  avg transaction {:.2}",
            c.category, c.unique_customers, c.avg_transaction
        );
    }
}

fn print_sales(engine: &AnalyticsEngine, filtered: &TransactionTable) {
    let sales = engine.sales(filtered);
    println!("=== Sales by Category ===");
    for c in &sales.by_category {
        println!("{:<20} {:>12.2} ({} units)", c.category, c.revenue, c.quantity);
    }
    println!("\n=== Sales by Region ===");
    for r in &sales.by_region {
        println!("{:<20} {:>12.2} ({:.1}%)", r.region, r.revenue, r.share_pct);
    }
    println!("\n=== Monthly Revenue ===");
    for m in &sales.monthly {
        let growth = m
            .growth_pct
            .map_or_else(|| "-".to_string(), |g| format!("{:+.1}%", g));
        println!("{}-{:02} {:>12.2} {:>9}", m.year, m.month, m.revenue, growth);
    }
    println!("\n=== Daily Sales Trend ===");
    for (date, revenue) in &sales.daily {
        println!("{} {:>12.2}", date, revenue);
    }
}

fn print_segments(engine: &AnalyticsEngine, filtered: &TransactionTable) -> Result<()> {
    let segmentation = engine.segment_customers(filtered)?;
    println!("=== Customer Segments ===");
    if let Some(warning) = &segmentation.warning {
        println!("Warning: {}", warning);
    }
    let total = segmentation.segments.len();
    for summary in segmentation.summaries() {
        println!(
            "{:<15} {:>5} customers ({:.1}%)  avg revenue {:.2}  avg orders {:.1}  avg age {:.1}",
            summary.label.to_string(),
            summary.customer_count,
            summary.customer_count as f64 / total as f64 * 100.0,
            summary.avg_revenue,
            summary.avg_orders,
            summary.avg_age
        );
    }
    println!("\nSilhouette score (sample): {:.3}", segmentation.silhouette);
    println!("Within-cluster sum of squares: {:.2}", segmentation.inertia);
    Ok(())
}

fn print_inventory(engine: &AnalyticsEngine, filtered: &TransactionTable) {
    let report = engine.inventory(filtered);
    println!("=== Inventory Turnover ===");
    for p in &report.turnover {
        let rate = p
            .turnover
            .value()
            .map_or_else(|| "undefined".to_string(), |v| format!("{:.2}", v));
        println!(
            "{:<12} {:<15} sold {:>6} stock {:>6} turnover {}",
            p.product_id, p.category, p.total_quantity, p.stock_level, rate
        );
    }
    println!("\n=== Low Stock Alerts ===");
    for p in &report.low_stock {
        println!("{:<12} stock {:>4} restock {}", p.product_id, p.stock_level, p.restock_date);
    }
    println!("\n=== Overstocked Products ===");
    for p in &report.overstocked {
        println!("{:<12} stock {:>6} sold {:>6}", p.product_id, p.stock_level, p.total_quantity);
    }
}

fn print_top_customers(engine: &AnalyticsEngine, filtered: &TransactionTable, top: Option<usize>) {
    println!("=== Top Customers ===");
    for c in engine.top_customers(filtered, top) {
        println!(
            "{:>3}. {:<12} {:>12.2}  {} orders  {} {} {}",
            c.rank, c.customer_id, c.total_revenue, c.order_count, c.age, c.gender, c.region
        );
    }
}

fn print_forecast(forecast: &Forecast, verbose: bool) {
    println!("=== Revenue Forecast ({} days) ===", forecast.horizon_days);
    println!("Last observed date: {}", forecast.last_observed);
    if verbose {
        println!("Residual sigma: {:.2}", forecast.sigma);
        println!("Changepoints: {}", forecast.changepoints.len());
    }
    println!("{:<12} {:>12} {:>12} {:>12}", "Date", "Predicted", "Lower", "Upper");
    for p in forecast.horizon_points() {
        println!(
            "{:<12} {:>12.2} {:>12.2} {:>12.2}",
            p.date.to_string(),
            p.predicted,
            p.lower,
            p.upper
        );
    }

    let summary = forecast.tail(10);
    if let (Some(first), Some(last)) = (summary.first(), summary.last()) {
        let mean = summary.iter().map(|p| p.predicted).sum::<f64>() / summary.len() as f64;
        println!("\n=== Forecast Summary ===");
        println!("Final {} days: {} to {}", summary.len(), first.date, last.date);
        println!("Mean predicted revenue: {:.2}", mean);
        println!("Range: {:.2} to {:.2}", last.lower, last.upper);
    }
}
