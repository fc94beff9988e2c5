//! Top-customer ranking and headline KPIs

use crate::aggregate::CustomerAggregate;
use crate::data::TransactionTable;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

/// One row of the top-customers table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCustomer {
    /// 1-based position
    pub rank: usize,
    pub customer_id: String,
    pub total_revenue: f64,
    pub order_count: usize,
    pub age: u32,
    pub gender: String,
    pub region: String,
}

/// Headline metrics over the filtered transaction set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total_revenue: f64,
    pub distinct_orders: usize,
    pub average_order_value: f64,
    /// Distinct filtered customers as a percentage of the full population
    pub customer_retention_pct: f64,
    pub profit_margin_pct: f64,
    pub transactions: usize,
    pub distinct_customers: usize,
    pub distinct_products: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Rank every customer by revenue, highest first.
///
/// The sort is stable, and aggregates arrive in ascending customer id order,
/// so equal revenues keep ascending customer id order.
pub fn rank_customers(customers: &[CustomerAggregate]) -> Vec<RankedCustomer> {
    let mut ordered: Vec<&CustomerAggregate> = customers.iter().collect();
    ordered.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, c)| RankedCustomer {
            rank: i + 1,
            customer_id: c.customer_id.clone(),
            total_revenue: c.total_revenue,
            order_count: c.order_count,
            age: c.age,
            gender: c.gender.clone(),
            region: c.region.clone(),
        })
        .collect()
}

/// The first `n` entries of [`rank_customers`]
pub fn top_customers(customers: &[CustomerAggregate], n: usize) -> Vec<RankedCustomer> {
    let mut ranked = rank_customers(customers);
    ranked.truncate(n);
    ranked
}

/// Compute KPIs for `table`.
///
/// `population_customers` is the distinct customer count of the unfiltered
/// dataset; retention is 0 when it is 0. Every ratio falls back to 0 instead
/// of dividing by zero.
pub fn kpis(table: &TransactionTable, population_customers: usize) -> KpiSummary {
    let records = table.records();

    let total_revenue: f64 = records.iter().map(|r| r.revenue()).sum();
    let total_cost: f64 = records.iter().map(|r| r.cost()).sum();
    let distinct_orders = records
        .iter()
        .map(|r| r.order_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let distinct_customers = table.distinct_customers();
    let distinct_products = records
        .iter()
        .map(|r| r.product_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    let average_order_value = if distinct_orders > 0 {
        total_revenue / distinct_orders as f64
    } else {
        0.0
    };
    let customer_retention_pct = if population_customers > 0 {
        distinct_customers as f64 / population_customers as f64 * 100.0
    } else {
        0.0
    };
    let profit_margin_pct = if total_revenue > 0.0 {
        (total_revenue - total_cost) / total_revenue * 100.0
    } else {
        0.0
    };

    let span = table.date_span();
    KpiSummary {
        total_revenue,
        distinct_orders,
        average_order_value,
        customer_retention_pct,
        profit_margin_pct,
        transactions: records.len(),
        distinct_customers,
        distinct_products,
        first_date: span.map(|(first, _)| first),
        last_date: span.map(|(_, last)| last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::customer_aggregates;
    use crate::data::fixtures::record;

    fn customer(id: &str, revenue: f64) -> CustomerAggregate {
        CustomerAggregate {
            customer_id: id.to_string(),
            total_revenue: revenue,
            order_count: 1,
            age: 40,
            gender: "Male".to_string(),
            region: "East".to_string(),
        }
    }

    #[test]
    fn test_top_customers_sorted_descending() {
        let customers = vec![
            customer("C1", 10.0),
            customer("C2", 300.0),
            customer("C3", 50.0),
            customer("C4", 300.0),
        ];
        let top = top_customers(&customers, 3);

        let ids: Vec<&str> = top.iter().map(|c| c.customer_id.as_str()).collect();
        // ties keep ascending customer id order
        assert_eq!(ids, vec!["C2", "C4", "C3"]);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[2].rank, 3);
    }

    #[test]
    fn test_top_customers_short_list() {
        let top = top_customers(&[customer("C1", 1.0)], 10);
        assert_eq!(top.len(), 1);
        assert!(top_customers(&[], 10).is_empty());
    }

    #[test]
    fn test_kpis() {
        let mut r1 = record("O1", "C1", "P1", "2024-01-01");
        r1.quantity = 2;
        r1.price = 50.0;
        r1.unit_cost = 20.0;
        let mut r2 = record("O2", "C2", "P2", "2024-01-05");
        r2.price = 100.0;
        r2.unit_cost = 60.0;
        let table = TransactionTable::new(vec![r1, r2]).unwrap();

        let summary = kpis(&table, 4);
        assert!((summary.total_revenue - 200.0).abs() < 1e-9);
        assert_eq!(summary.distinct_orders, 2);
        assert!((summary.average_order_value - 100.0).abs() < 1e-9);
        assert!((summary.customer_retention_pct - 50.0).abs() < 1e-9);
        // cost = 40 + 60 = 100
        assert!((summary.profit_margin_pct - 50.0).abs() < 1e-9);
        assert_eq!(summary.distinct_products, 2);
        assert_eq!(summary.first_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(summary.last_date, NaiveDate::from_ymd_opt(2024, 1, 5));
    }

    #[test]
    fn test_kpis_on_empty_set_are_zero() {
        let summary = kpis(&TransactionTable::default(), 100);
        assert_eq!(summary.total_revenue, 0.0);
        assert_eq!(summary.average_order_value, 0.0);
        assert_eq!(summary.profit_margin_pct, 0.0);
        assert_eq!(summary.customer_retention_pct, 0.0);
        assert_eq!(summary.first_date, None);

        let summary = kpis(&TransactionTable::default(), 0);
        assert_eq!(summary.customer_retention_pct, 0.0);
    }

    #[test]
    fn test_revenue_is_conserved() {
        let mut records = Vec::new();
        for i in 0..12 {
            let mut r = record(&format!("O{}", i), &format!("C{}", i % 5), "P1", "2024-02-01");
            r.price = 3.25 * (i + 1) as f64;
            records.push(r);
        }
        let table = TransactionTable::new(records).unwrap();

        let customer_total: f64 = customer_aggregates(&table)
            .iter()
            .map(|c| c.total_revenue)
            .sum();
        let summary = kpis(&table, 5);
        assert!((customer_total - summary.total_revenue).abs() < 1e-9);
    }
}
