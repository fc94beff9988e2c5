//! Revenue breakdowns by category, region and calendar month

use crate::aggregate::daily_revenue;
use crate::data::TransactionTable;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySales {
    pub category: String,
    pub revenue: f64,
    pub quantity: u64,
}

/// Customer reach and transaction size per category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub unique_customers: usize,
    /// Mean of quantity × price over the category's transactions
    pub avg_transaction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSales {
    pub region: String,
    pub revenue: f64,
    /// Share of the total revenue, in percent
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySales {
    pub year: i32,
    pub month: u32,
    pub revenue: f64,
    /// Percent change from the previous month; `None` for the first month
    /// or when the previous month had no revenue
    pub growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesBreakdown {
    /// Revenue per date with sales, ascending
    pub daily: Vec<(NaiveDate, f64)>,
    pub by_category: Vec<CategorySales>,
    pub category_stats: Vec<CategoryStats>,
    pub by_region: Vec<RegionSales>,
    pub monthly: Vec<MonthlySales>,
}

pub fn by_category(table: &TransactionTable) -> Vec<CategorySales> {
    let mut groups: BTreeMap<&str, (f64, u64)> = BTreeMap::new();
    for record in table.records() {
        let entry = groups.entry(record.category.as_str()).or_insert((0.0, 0));
        entry.0 += record.revenue();
        entry.1 += record.quantity as u64;
    }
    groups
        .into_iter()
        .map(|(category, (revenue, quantity))| CategorySales {
            category: category.to_string(),
            revenue,
            quantity,
        })
        .collect()
}

pub fn category_stats(table: &TransactionTable) -> Vec<CategoryStats> {
    let mut groups: BTreeMap<&str, (BTreeSet<&str>, f64, usize)> = BTreeMap::new();
    for record in table.records() {
        let (customers, revenue, count) = groups
            .entry(record.category.as_str())
            .or_insert_with(|| (BTreeSet::new(), 0.0, 0));
        customers.insert(record.customer_id.as_str());
        *revenue += record.revenue();
        *count += 1;
    }
    groups
        .into_iter()
        .map(|(category, (customers, revenue, count))| CategoryStats {
            category: category.to_string(),
            unique_customers: customers.len(),
            avg_transaction: revenue / count as f64,
        })
        .collect()
}

pub fn by_region(table: &TransactionTable) -> Vec<RegionSales> {
    let mut groups: BTreeMap<&str, f64> = BTreeMap::new();
    for record in table.records() {
        *groups.entry(record.region.as_str()).or_insert(0.0) += record.revenue();
    }
    let total: f64 = groups.values().sum();
    groups
        .into_iter()
        .map(|(region, revenue)| RegionSales {
            region: region.to_string(),
            revenue,
            share_pct: if total > 0.0 { revenue / total * 100.0 } else { 0.0 },
        })
        .collect()
}

/// Monthly revenue over every month from the first to the last sale, with
/// months lacking sales filled with zero
pub fn monthly_growth(table: &TransactionTable) -> Vec<MonthlySales> {
    let mut totals: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for record in table.records() {
        *totals
            .entry((record.date.year(), record.date.month()))
            .or_insert(0.0) += record.revenue();
    }

    let (Some(&first), Some(&last)) = (totals.keys().next(), totals.keys().next_back()) else {
        return Vec::new();
    };

    let mut monthly = Vec::new();
    let mut previous: Option<f64> = None;
    let (mut year, mut month) = first;
    while (year, month) <= last {
        let revenue = totals.get(&(year, month)).copied().unwrap_or(0.0);
        let growth_pct = previous
            .filter(|&p| p > 0.0)
            .map(|p| (revenue - p) / p * 100.0);
        monthly.push(MonthlySales {
            year,
            month,
            revenue,
            growth_pct,
        });
        previous = Some(revenue);

        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    monthly
}

pub fn sales_breakdown(table: &TransactionTable) -> SalesBreakdown {
    SalesBreakdown {
        daily: daily_revenue(table).into_iter().collect(),
        by_category: by_category(table),
        category_stats: category_stats(table),
        by_region: by_region(table),
        monthly: monthly_growth(table),
    }
}
