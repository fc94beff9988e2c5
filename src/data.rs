//! Transaction records, validation, filtering and CSV loading using Polars

use crate::error::AnalyticsError;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Columns the flat transaction table must expose
pub const REQUIRED_COLUMNS: [&str; 13] = [
    "OrderID",
    "CustomerID",
    "ProductID",
    "Date",
    "Quantity",
    "Price",
    "Age",
    "Gender",
    "Region",
    "Category",
    "UnitCost",
    "StockLevel",
    "RestockDate",
];

/// One sale line joined with its customer, product and inventory attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub order_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub date: NaiveDate,
    pub quantity: u32,
    pub price: f64,
    pub age: u32,
    pub gender: String,
    pub region: String,
    pub category: String,
    pub unit_cost: f64,
    pub stock_level: u32,
    pub restock_date: NaiveDate,
}

impl TransactionRecord {
    pub fn revenue(&self) -> f64 {
        self.quantity as f64 * self.price
    }

    /// Cost of goods for this line
    pub fn cost(&self) -> f64 {
        self.quantity as f64 * self.unit_cost
    }

    fn validate(&self) -> Result<(), String> {
        if self.quantity < 1 {
            return Err(format!("quantity must be at least 1, got {}", self.quantity));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price must be a non-negative amount, got {}", self.price));
        }
        if !self.unit_cost.is_finite() || self.unit_cost < 0.0 {
            return Err(format!(
                "unit cost must be a non-negative amount, got {}",
                self.unit_cost
            ));
        }
        if self.order_id.is_empty() || self.customer_id.is_empty() || self.product_id.is_empty() {
            return Err("order, customer and product ids must be non-empty".to_string());
        }
        Ok(())
    }
}

/// Validated, immutable snapshot of transaction records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionTable {
    records: Vec<TransactionRecord>,
}

impl TransactionTable {
    /// Build a table, rejecting the first record that breaks an invariant.
    pub fn new(records: Vec<TransactionRecord>) -> Result<Self, AnalyticsError> {
        for (row, record) in records.iter().enumerate() {
            record
                .validate()
                .map_err(|reason| AnalyticsError::InvalidRecord { row, reason })?;
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct customers in the table
    pub fn distinct_customers(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.customer_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Distinct categories in ascending order
    pub fn categories(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct regions in ascending order
    pub fn regions(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.region.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Earliest and latest transaction dates
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.iter().map(|r| r.date).min()?;
        let last = self.records.iter().map(|r| r.date).max()?;
        Some((first, last))
    }

    /// Return the subset of records matching `filter`, keeping input order.
    pub fn filter(&self, filter: &TransactionFilter) -> TransactionTable {
        TransactionTable {
            records: self
                .records
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
        }
    }
}

/// Date range, category and region selection applied before analysis.
///
/// Empty category or region sets select everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub categories: BTreeSet<String>,
    pub regions: BTreeSet<String>,
}

impl TransactionFilter {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.from.map_or(true, |from| record.date >= from)
            && self.to.map_or(true, |to| record.date <= to)
            && (self.categories.is_empty() || self.categories.contains(&record.category))
            && (self.regions.is_empty() || self.regions.contains(&record.region))
    }
}

/// Load the flat, joined transaction table from a CSV file
///
/// # Arguments
/// * `file_path` - Path to a CSV file exposing every column in [`REQUIRED_COLUMNS`]
///
/// # Returns
/// * A validated `TransactionTable`; a missing column fails before any row is read
pub fn load_transactions(file_path: impl AsRef<Path>) -> Result<TransactionTable, AnalyticsError> {
    let df = LazyCsvReader::new(file_path.as_ref())
        .has_header(true)
        .finish()?
        .collect()?;

    let names = df.get_column_names();
    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !names.contains(*c)) {
        return Err(AnalyticsError::MissingColumn(missing.to_string()));
    }

    let records = records_from_frame(&df)?;
    tracing::info!(rows = records.len(), "loaded transaction table");
    TransactionTable::new(records)
}

/// Convert a DataFrame with the required columns into transaction records
fn records_from_frame(df: &DataFrame) -> Result<Vec<TransactionRecord>, AnalyticsError> {
    let order_ids = string_column(df, "OrderID")?;
    let customer_ids = string_column(df, "CustomerID")?;
    let product_ids = string_column(df, "ProductID")?;
    let dates = date_column(df, "Date")?;
    let quantities = int_column(df, "Quantity")?;
    let prices = float_column(df, "Price")?;
    let ages = int_column(df, "Age")?;
    let genders = string_column(df, "Gender")?;
    let regions = string_column(df, "Region")?;
    let categories = string_column(df, "Category")?;
    let unit_costs = float_column(df, "UnitCost")?;
    let stock_levels = int_column(df, "StockLevel")?;
    let restock_dates = date_column(df, "RestockDate")?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        records.push(TransactionRecord {
            order_id: order_ids[i].clone(),
            customer_id: customer_ids[i].clone(),
            product_id: product_ids[i].clone(),
            date: dates[i],
            quantity: to_u32(quantities[i], i, "Quantity")?,
            price: prices[i],
            age: to_u32(ages[i], i, "Age")?,
            gender: genders[i].clone(),
            region: regions[i].clone(),
            category: categories[i].clone(),
            unit_cost: unit_costs[i],
            stock_level: to_u32(stock_levels[i], i, "StockLevel")?,
            restock_date: restock_dates[i],
        });
    }
    Ok(records)
}

fn null_cell(row: usize, name: &str) -> AnalyticsError {
    AnalyticsError::InvalidRecord {
        row,
        reason: format!("column '{}' is null", name),
    }
}

fn to_u32(value: i64, row: usize, name: &str) -> Result<u32, AnalyticsError> {
    u32::try_from(value).map_err(|_| AnalyticsError::InvalidRecord {
        row,
        reason: format!("column '{}' must be a non-negative integer, got {}", name, value),
    })
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>, AnalyticsError> {
    let series = df.column(name)?.cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.map(str::to_string).ok_or_else(|| null_cell(row, name)))
        .collect()
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<i64>, AnalyticsError> {
    let series = df.column(name)?.cast(&DataType::Int64)?;
    series
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.ok_or_else(|| null_cell(row, name)))
        .collect()
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, AnalyticsError> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.ok_or_else(|| null_cell(row, name)))
        .collect()
}

fn date_column(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>, AnalyticsError> {
    string_column(df, name)?
        .iter()
        .enumerate()
        .map(|(row, raw)| {
            parse_date(raw).ok_or_else(|| AnalyticsError::InvalidRecord {
                row,
                reason: format!("column '{}' has unparseable date '{}'", name, raw),
            })
        })
        .collect()
}

/// Accepts `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS` (the time part is dropped)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A record with plausible defaults; tests override the fields they care about
    pub fn record(order: &str, customer: &str, product: &str, date: &str) -> TransactionRecord {
        TransactionRecord {
            order_id: order.to_string(),
            customer_id: customer.to_string(),
            product_id: product.to_string(),
            date: parse_date(date).unwrap(),
            quantity: 1,
            price: 10.0,
            age: 30,
            gender: "Female".to_string(),
            region: "North".to_string(),
            category: "Books".to_string(),
            unit_cost: 4.0,
            stock_level: 100,
            restock_date: parse_date("2024-01-15").unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "OrderID,CustomerID,ProductID,Date,Quantity,Price,Revenue,Age,Gender,Region,Category,UnitCost,StockLevel,RestockDate").unwrap();
        writeln!(file, "ORD000001,CUST00001,PROD0001,2024-01-01 00:00:00,2,25.5,51.0,34,Female,North,Books,10.0,120,2024-02-01 00:00:00").unwrap();
        writeln!(file, "ORD000002,CUST00002,PROD0002,2024-01-02 00:00:00,1,99.99,99.99,61,Male,South,Toys,40.0,15,2024-03-10 00:00:00").unwrap();
        writeln!(file, "ORD000003,CUST00001,PROD0002,2024-01-04,3,99.99,299.97,34,Female,North,Toys,40.0,15,2024-03-10").unwrap();
        file
    }

    #[test]
    fn test_load_transactions() {
        let test_file = create_test_csv();

        let table = load_transactions(test_file.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.distinct_customers(), 2);

        let first = &table.records()[0];
        assert_eq!(first.order_id, "ORD000001");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.quantity, 2);
        assert!((first.revenue() - 51.0).abs() < 1e-9);
        assert_eq!(first.stock_level, 120);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "OrderID,CustomerID,ProductID,Date,Quantity,Price").unwrap();
        writeln!(file, "ORD1,C1,P1,2024-01-01,1,10.0").unwrap();

        let err = load_transactions(file.path()).unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingColumn(ref c) if c == "Age"));
    }

    #[test]
    fn test_invalid_record_rejected() {
        let mut bad = record("O1", "C1", "P1", "2024-01-01");
        bad.quantity = 0;
        let err = TransactionTable::new(vec![record("O0", "C1", "P1", "2024-01-01"), bad]).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRecord { row: 1, .. }));

        let mut negative = record("O1", "C1", "P1", "2024-01-01");
        negative.price = -1.0;
        assert!(TransactionTable::new(vec![negative]).is_err());
    }

    #[test]
    fn test_filter() {
        let mut toy = record("O2", "C2", "P2", "2024-01-05");
        toy.category = "Toys".to_string();
        toy.region = "West".to_string();
        let table = TransactionTable::new(vec![
            record("O1", "C1", "P1", "2024-01-01"),
            toy,
            record("O3", "C3", "P1", "2024-02-01"),
        ])
        .unwrap();

        let filter = TransactionFilter {
            from: parse_date("2024-01-02"),
            to: parse_date("2024-01-31"),
            ..Default::default()
        };
        let filtered = table.filter(&filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.records()[0].order_id, "O2");

        let filter = TransactionFilter {
            categories: ["Books".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(table.filter(&filter).len(), 2);

        let filter = TransactionFilter {
            regions: ["East".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(table.filter(&filter).is_empty());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_date("2024-03-09"), Some(expected));
        assert_eq!(parse_date("2024-03-09 00:00:00"), Some(expected));
        assert_eq!(parse_date("2024-03-09T12:30:00"), Some(expected));
        assert_eq!(parse_date("09/03/2024"), None);
    }
}
