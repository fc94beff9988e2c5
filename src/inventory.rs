//! Inventory turnover and stock health flags

use crate::aggregate::ProductAggregate;
use crate::settings::InventoryConfig;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;

/// Units sold per unit held in stock.
///
/// Zero stock has no meaningful ratio and is reported as `Undefined` rather
/// than infinity or NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TurnoverRate {
    Defined(f64),
    Undefined,
}

impl TurnoverRate {
    pub fn compute(quantity_sold: u64, stock_level: u32) -> Self {
        if stock_level == 0 {
            TurnoverRate::Undefined
        } else {
            TurnoverRate::Defined(quantity_sold as f64 / stock_level as f64)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            TurnoverRate::Defined(rate) => Some(*rate),
            TurnoverRate::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, TurnoverRate::Defined(_))
    }

    /// Descending order with `Undefined` after every defined rate
    pub fn cmp_desc(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TurnoverRate::Defined(a), TurnoverRate::Defined(b)) => b.total_cmp(a),
            (TurnoverRate::Defined(_), TurnoverRate::Undefined) => Ordering::Less,
            (TurnoverRate::Undefined, TurnoverRate::Defined(_)) => Ordering::Greater,
            (TurnoverRate::Undefined, TurnoverRate::Undefined) => Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTurnover {
    pub product_id: String,
    pub total_quantity: u64,
    pub stock_level: u32,
    pub unit_cost: f64,
    pub category: String,
    pub restock_date: NaiveDate,
    pub turnover: TurnoverRate,
}

/// Turnover for every product plus the low-stock and overstocked subsets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryReport {
    pub turnover: Vec<ProductTurnover>,
    pub low_stock: Vec<ProductTurnover>,
    pub overstocked: Vec<ProductTurnover>,
}

pub fn product_turnover(products: &[ProductAggregate]) -> Vec<ProductTurnover> {
    products
        .iter()
        .map(|p| ProductTurnover {
            product_id: p.product_id.clone(),
            total_quantity: p.total_quantity,
            stock_level: p.stock_level,
            unit_cost: p.unit_cost,
            category: p.category.clone(),
            restock_date: p.restock_date,
            turnover: TurnoverRate::compute(p.total_quantity, p.stock_level),
        })
        .collect()
}

/// Stock strictly below `threshold` units
pub fn is_low_stock(product: &ProductTurnover, threshold: u32) -> bool {
    product.stock_level < threshold
}

/// Defined turnover strictly below `threshold`; undefined turnover is never overstocked
pub fn is_overstocked(product: &ProductTurnover, threshold: f64) -> bool {
    product.turnover.value().is_some_and(|rate| rate < threshold)
}

/// Sort products by turnover, fastest-moving first, undefined rates last
pub fn sort_by_turnover(products: &mut [ProductTurnover]) {
    products.sort_by(|a, b| a.turnover.cmp_desc(&b.turnover));
}

pub fn inventory_report(products: &[ProductAggregate], config: &InventoryConfig) -> InventoryReport {
    let turnover = product_turnover(products);

    let mut low_stock: Vec<ProductTurnover> = turnover
        .iter()
        .filter(|p| is_low_stock(p, config.low_stock_threshold))
        .cloned()
        .collect();
    low_stock.sort_by(|a, b| a.stock_level.cmp(&b.stock_level));

    let mut overstocked: Vec<ProductTurnover> = turnover
        .iter()
        .filter(|p| is_overstocked(p, config.overstock_turnover_threshold))
        .cloned()
        .collect();
    // slowest movers first
    overstocked.sort_by(|a, b| b.turnover.cmp_desc(&a.turnover));

    let undefined = turnover.iter().filter(|p| !p.turnover.is_defined()).count();
    if undefined > 0 {
        tracing::warn!(products = undefined, "products with zero stock have undefined turnover");
    }
    tracing::info!(
        products = turnover.len(),
        low_stock = low_stock.len(),
        overstocked = overstocked.len(),
        "computed inventory turnover"
    );

    InventoryReport {
        turnover,
        low_stock,
        overstocked,
    }
}
