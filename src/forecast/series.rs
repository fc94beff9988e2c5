//! Gap-free daily revenue series used as the forecaster's working input

use crate::error::AnalyticsError;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Revenue for every calendar day between the first and last observed date.
///
/// Days without sales are present with zero revenue.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    start: NaiveDate,
    values: Vec<f64>,
    observed_dates: usize,
}

impl DailySeries {
    /// Zero-fill a sparse date → revenue map over its full span.
    ///
    /// Fails with `InsufficientHistory` when fewer than two distinct dates are observed.
    pub fn from_daily_revenue(daily: &BTreeMap<NaiveDate, f64>) -> Result<Self, AnalyticsError> {
        let (Some((&start, _)), Some((&end, _))) = (daily.first_key_value(), daily.last_key_value())
        else {
            return Err(AnalyticsError::InsufficientHistory { distinct_dates: 0 });
        };
        if daily.len() < 2 {
            return Err(AnalyticsError::InsufficientHistory {
                distinct_dates: daily.len(),
            });
        }
        if let Some((date, value)) = daily.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalyticsError::Numerical(format!(
                "revenue on {} is not finite: {}",
                date, value
            )));
        }

        let len = (end - start).num_days() as usize + 1;
        let mut values = vec![0.0; len];
        for (date, revenue) in daily {
            values[(*date - start).num_days() as usize] += revenue;
        }

        Ok(Self {
            start,
            values,
            observed_dates: daily.len(),
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.date_at(self.values.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Dates that carried at least one transaction
    pub fn observed_dates(&self) -> usize {
        self.observed_dates
    }

    /// Date at position `index`; may lie beyond the end of the series
    pub fn date_at(&self, index: usize) -> NaiveDate {
        self.start + Duration::days(index as i64)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.values.len()).map(move |i| self.date_at(i))
    }
}
