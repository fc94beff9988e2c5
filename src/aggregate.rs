//! Per-customer, per-product and per-date aggregation of transaction records
//!
//! Groups are emitted in ascending key order. Attributes that are constant
//! within a group (age, region, stock level, ...) take the value of the
//! group's first row in input order; debug builds assert that every later
//! row agrees.

use crate::data::{TransactionRecord, TransactionTable};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

/// Revenue, order and demographic summary for one customer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerAggregate {
    pub customer_id: String,
    pub total_revenue: f64,
    /// Number of distinct orders
    pub order_count: usize,
    pub age: u32,
    pub gender: String,
    pub region: String,
}

/// Sales volume and inventory snapshot for one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAggregate {
    pub product_id: String,
    pub total_quantity: u64,
    pub stock_level: u32,
    pub unit_cost: f64,
    pub category: String,
    pub restock_date: NaiveDate,
}

/// Keep the first-seen value, asserting in debug builds that the group agrees on it
fn check_first<T: PartialEq + Debug>(first: &T, next: &T, key: &str, attribute: &str) {
    debug_assert!(
        first == next,
        "attribute '{}' differs within group '{}': {:?} vs {:?}",
        attribute,
        key,
        first,
        next
    );
}

pub fn customer_aggregates(table: &TransactionTable) -> Vec<CustomerAggregate> {
    struct Acc<'a> {
        first: &'a TransactionRecord,
        revenue: f64,
        orders: BTreeSet<&'a str>,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for record in table.records() {
        let acc = groups.entry(record.customer_id.as_str()).or_insert_with(|| Acc {
            first: record,
            revenue: 0.0,
            orders: BTreeSet::new(),
        });
        check_first(&acc.first.age, &record.age, &record.customer_id, "Age");
        check_first(&acc.first.region, &record.region, &record.customer_id, "Region");
        check_first(&acc.first.gender, &record.gender, &record.customer_id, "Gender");
        acc.revenue += record.revenue();
        acc.orders.insert(record.order_id.as_str());
    }

    groups
        .into_iter()
        .map(|(customer_id, acc)| CustomerAggregate {
            customer_id: customer_id.to_string(),
            total_revenue: acc.revenue,
            order_count: acc.orders.len(),
            age: acc.first.age,
            gender: acc.first.gender.clone(),
            region: acc.first.region.clone(),
        })
        .collect()
}

pub fn product_aggregates(table: &TransactionTable) -> Vec<ProductAggregate> {
    let mut groups: BTreeMap<&str, (&TransactionRecord, u64)> = BTreeMap::new();
    for record in table.records() {
        let (first, quantity) = groups
            .entry(record.product_id.as_str())
            .or_insert((record, 0));
        check_first(&first.stock_level, &record.stock_level, &record.product_id, "StockLevel");
        check_first(&first.unit_cost, &record.unit_cost, &record.product_id, "UnitCost");
        check_first(&first.category, &record.category, &record.product_id, "Category");
        check_first(&first.restock_date, &record.restock_date, &record.product_id, "RestockDate");
        *quantity += record.quantity as u64;
    }

    groups
        .into_iter()
        .map(|(product_id, (first, quantity))| ProductAggregate {
            product_id: product_id.to_string(),
            total_quantity: quantity,
            stock_level: first.stock_level,
            unit_cost: first.unit_cost,
            category: first.category.clone(),
            restock_date: first.restock_date,
        })
        .collect()
}

/// Total revenue per calendar date; dates without sales are absent
pub fn daily_revenue(table: &TransactionTable) -> BTreeMap<NaiveDate, f64> {
    let mut daily = BTreeMap::new();
    for record in table.records() {
        *daily.entry(record.date).or_insert(0.0) += record.revenue();
    }
    daily
}
