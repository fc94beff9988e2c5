//! Integration tests for Retailcast

use chrono::{Duration, NaiveDate};
use retailcast::{
    load_transactions, AnalyticsEngine, AnalyticsError, EngineConfig, SegmentLabel,
    TransactionFilter,
};
use std::collections::BTreeSet;
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "OrderID,CustomerID,ProductID,Date,Quantity,Price,Age,Gender,Region,Category,UnitCost,StockLevel,RestockDate";

/// Create a test CSV file with 40 days of sales from 12 customers
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let regions = ["North", "South", "East", "West"];
    let products = [
        ("PROD001", "Electronics", 250.0, 180.0, 8),
        ("PROD002", "Books", 15.0, 6.0, 400),
        ("PROD003", "Toys", 30.0, 12.0, 60),
    ];

    let mut order = 0;
    for day in 0..40 {
        let date = start + Duration::days(day);
        for customer in 0..12 {
            // customers buy every (customer % 4 + 1) days
            if day % (customer % 4 + 1) != 0 {
                continue;
            }
            order += 1;
            let (product, category, price, cost, stock) =
                products[(customer + day) as usize % 3];
            writeln!(
                file,
                "ORD{:05},CUST{:03},{},{},{},{},{},{},{},{},{},{},2024-03-01",
                order,
                customer,
                product,
                date,
                1 + customer % 3,
                price,
                20 + customer * 4,
                if customer % 2 == 0 { "Female" } else { "Male" },
                regions[customer as usize % 4],
                category,
                cost,
                stock
            )
            .unwrap();
        }
    }

    file
}

fn quick_engine() -> AnalyticsEngine {
    let mut config = EngineConfig::default();
    config.forecast.horizon_days = 14;
    config.forecast.uncertainty_samples = 200;
    AnalyticsEngine::new(config)
}

#[test]
fn test_end_to_end_reports() {
    let test_file = create_test_csv();
    let table = load_transactions(test_file.path()).unwrap();
    let engine = quick_engine();

    assert_eq!(table.distinct_customers(), 12);

    // KPIs over the full table
    let kpis = engine.kpis(&table, &table);
    assert_eq!(kpis.transactions, table.len());
    assert!((kpis.customer_retention_pct - 100.0).abs() < 1e-9);
    assert!(kpis.profit_margin_pct > 0.0 && kpis.profit_margin_pct < 100.0);
    let order_total = kpis.average_order_value * kpis.distinct_orders as f64;
    assert!((order_total - kpis.total_revenue).abs() < 1e-6);

    // top customers
    let top = engine.top_customers(&table, Some(5));
    assert_eq!(top.len(), 5);
    assert!(top.windows(2).all(|w| w[0].total_revenue >= w[1].total_revenue));

    // segmentation covers every customer once
    let segmentation = engine.segment_customers(&table).unwrap();
    assert_eq!(segmentation.segments.len(), 12);
    let ids: BTreeSet<&str> = segmentation
        .segments
        .iter()
        .map(|s| s.customer_id.as_str())
        .collect();
    assert_eq!(ids.len(), 12);
    assert_eq!(segmentation.effective_clusters, 4);
    let summaries = segmentation.summaries();
    assert_eq!(summaries[0].label, SegmentLabel::HighValue);
    assert!(summaries
        .iter()
        .all(|s| s.avg_revenue <= summaries[0].avg_revenue));

    // inventory: the electronics line has 8 units in stock
    let inventory = engine.inventory(&table);
    assert_eq!(inventory.turnover.len(), 3);
    assert!(inventory.low_stock.iter().any(|p| p.product_id == "PROD001"));
    let fastest = inventory
        .turnover
        .iter()
        .min_by(|a, b| a.turnover.cmp_desc(&b.turnover))
        .unwrap();
    assert_eq!(fastest.product_id, "PROD001");

    // sales breakdown
    let sales = engine.sales(&table);
    assert_eq!(sales.by_category.len(), 3);
    assert_eq!(sales.by_region.len(), 4);
    assert_eq!(sales.monthly.len(), 2);
    let category_total: f64 = sales.by_category.iter().map(|c| c.revenue).sum();
    assert!((category_total - kpis.total_revenue).abs() < 1e-6);
    assert_eq!(sales.category_stats.len(), 3);
    // customers 2, 6 and 10 buy every third day, so each sticks to one product
    assert!(sales.category_stats.iter().all(|c| c.unique_customers == 10));
    assert_eq!(sales.daily.len(), 40);
    let daily_total: f64 = sales.daily.iter().map(|(_, revenue)| revenue).sum();
    assert!((daily_total - kpis.total_revenue).abs() < 1e-6);

    // forecast covers the history plus the horizon without gaps
    let forecast = engine.forecast(&table).unwrap();
    assert_eq!(forecast.points.len(), 40 + 14);
    assert_eq!(forecast.last_observed, NaiveDate::from_ymd_opt(2024, 2, 9).unwrap());
    assert!(forecast
        .points
        .windows(2)
        .all(|w| w[1].date - w[0].date == Duration::days(1)));
    assert!(forecast
        .points
        .iter()
        .all(|p| p.lower <= p.predicted && p.predicted <= p.upper));
}

#[test]
fn test_filtered_reports() {
    let test_file = create_test_csv();
    let table = load_transactions(test_file.path()).unwrap();
    let engine = quick_engine();

    let filter = TransactionFilter {
        regions: ["North".to_string()].into_iter().collect(),
        ..Default::default()
    };
    let north = table.filter(&filter);
    assert!(north.records().iter().all(|r| r.region == "North"));

    // retention is measured against the unfiltered population
    let kpis = engine.kpis(&north, &table);
    assert_eq!(kpis.distinct_customers, 3);
    assert!((kpis.customer_retention_pct - 25.0).abs() < 1e-9);

    // a single day of history cannot be forecast
    let one_day = TransactionFilter {
        from: NaiveDate::from_ymd_opt(2024, 1, 5),
        to: NaiveDate::from_ymd_opt(2024, 1, 5),
        ..Default::default()
    };
    let result = engine.forecast(&table.filter(&one_day));
    assert!(matches!(
        result,
        Err(AnalyticsError::InsufficientHistory { distinct_dates: 1 })
    ));
}

#[test]
fn test_forecast_is_reproducible() {
    let test_file = create_test_csv();
    let table = load_transactions(test_file.path()).unwrap();
    let engine = quick_engine();

    let first = engine.forecast(&table).unwrap();
    let second = engine.forecast(&table).unwrap();
    assert_eq!(first, second);

    let first = engine.segment_customers(&table).unwrap();
    let second = engine.segment_customers(&table).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_error_handling_missing_file() {
    let result = load_transactions("does/not/exist.csv");
    assert!(result.is_err());
}
