//! Daily revenue forecasting with an additive trend + seasonality model
//!
//! The pipeline runs in four steps:
//! 1. [`series`] turns the sparse date → revenue map into a gap-free daily series.
//! 2. [`design`] lays out the piecewise-linear trend and Fourier seasonal columns.
//! 3. [`solver`] finds the MAP coefficients under sparse changepoint and Gaussian seasonal priors.
//! 4. [`simulate`] derives uncertainty intervals from seeded Monte Carlo trend continuations.

pub mod design;
pub mod series;
pub mod simulate;
pub mod solver;

use crate::error::AnalyticsError;
use crate::settings::ForecastConfig;
use chrono::NaiveDate;
use design::{active_seasonalities, changepoint_indices, epoch_day, DesignLayout, SeasonalComponent};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use series::DailySeries;
use simulate::{uncertainty_intervals, SimulationInput, SimulationSettings};
use solver::Penalty;
use std::collections::BTreeMap;

/// Outer passes alternating between the coefficient fit and the noise estimate
const OUTER_PASSES: usize = 3;
/// Lower bound on the scaled noise variance used to weigh the priors
const SIGMA2_FLOOR: f64 = 1e-4;

/// Predicted revenue for one day with its uncertainty interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Additive contributions to the prediction for one day, in revenue units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastComponents {
    pub date: NaiveDate,
    pub trend: f64,
    pub yearly: f64,
    pub weekly: f64,
    pub daily: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    /// Every day from the first observed date through the end of the horizon
    pub points: Vec<ForecastPoint>,
    pub components: Vec<ForecastComponents>,
    /// Trend changepoint locations
    pub changepoints: Vec<NaiveDate>,
    /// Residual standard deviation of the fit, in revenue units
    pub sigma: f64,
    pub last_observed: NaiveDate,
    pub horizon_days: u32,
}

impl Forecast {
    /// Points after the last observed date
    pub fn horizon_points(&self) -> &[ForecastPoint] {
        let start = self.points.len().saturating_sub(self.horizon_days as usize);
        &self.points[start..]
    }

    pub fn history_points(&self) -> &[ForecastPoint] {
        let end = self.points.len().saturating_sub(self.horizon_days as usize);
        &self.points[..end]
    }

    /// The last `n` points
    pub fn tail(&self, n: usize) -> &[ForecastPoint] {
        &self.points[self.points.len().saturating_sub(n)..]
    }
}

/// Fit the model to a date → revenue map and forecast `horizon_days` beyond its last date.
///
/// Dates without an entry are treated as zero revenue. Fails with
/// `InsufficientHistory` when fewer than two distinct dates are present.
pub fn forecast_revenue(
    daily_revenue: &BTreeMap<NaiveDate, f64>,
    config: &ForecastConfig,
) -> Result<Forecast, AnalyticsError> {
    let series = DailySeries::from_daily_revenue(daily_revenue)?;
    let model = FittedModel::fit(&series, config)?;
    model.predict(config)
}

/// Coefficients and scaling of a fitted model
struct FittedModel {
    layout: DesignLayout,
    beta: DVector<f64>,
    start: NaiveDate,
    history_len: usize,
    changepoint_dates: Vec<NaiveDate>,
    y_scale: f64,
    /// Residual standard deviation on the scaled axis
    sigma: f64,
}

impl FittedModel {
    fn fit(series: &DailySeries, config: &ForecastConfig) -> Result<Self, AnalyticsError> {
        let n = series.len();
        let y_scale = series
            .values()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
        let y = DVector::from_iterator(n, series.values().iter().map(|v| v / y_scale));

        let span_days = (series.end() - series.start()).num_days();
        let cp_indices = changepoint_indices(n, config.n_changepoints, config.changepoint_range);
        let layout = DesignLayout {
            changepoints_t: cp_indices.iter().map(|&i| scaled_time(i, n)).collect(),
            seasonalities: active_seasonalities(config, span_days),
        };

        let rows: Vec<f64> = series
            .dates()
            .enumerate()
            .flat_map(|(i, date)| layout.row(scaled_time(i, n), epoch_day(date)))
            .collect();
        let x = DMatrix::from_row_slice(n, layout.n_columns(), &rows);

        tracing::debug!(
            days = n,
            observed = series.observed_dates(),
            changepoints = cp_indices.len(),
            columns = layout.n_columns(),
            "fitting forecast model"
        );

        let mean = y.mean();
        let initial_sigma2 = (y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64)
            .max(SIGMA2_FLOOR);
        let mut beta = solver::solve(&x, &y, &penalties(&layout, initial_sigma2, config))?;
        let mut rss = (&y - &x * &beta).norm_squared();
        for pass in 1..OUTER_PASSES {
            let sigma2 = (rss / n as f64).max(SIGMA2_FLOOR);
            beta = solver::solve(&x, &y, &penalties(&layout, sigma2, config))?;
            rss = (&y - &x * &beta).norm_squared();
            tracing::debug!(pass, rss, "forecast fit pass complete");
        }

        let sigma = (rss / n as f64).sqrt();
        if !sigma.is_finite() || beta.iter().any(|b| !b.is_finite()) {
            return Err(AnalyticsError::Numerical(
                "forecast fit produced non-finite coefficients".to_string(),
            ));
        }

        Ok(Self {
            layout,
            beta,
            start: series.start(),
            history_len: n,
            changepoint_dates: cp_indices.iter().map(|&i| series.date_at(i)).collect(),
            y_scale,
            sigma,
        })
    }

    fn predict(&self, config: &ForecastConfig) -> Result<Forecast, AnalyticsError> {
        let total = self.history_len + config.horizon_days as usize;
        let seasonal_columns = self.layout.seasonal_columns();
        let trend_columns = self.layout.trend_columns();

        let mut t = Vec::with_capacity(total);
        let mut trend = Vec::with_capacity(total);
        let mut seasonal = Vec::with_capacity(total);
        let mut components = Vec::with_capacity(total);
        for i in 0..total {
            let date = self.start + chrono::Duration::days(i as i64);
            let ti = scaled_time(i, self.history_len);
            let row = self.layout.row(ti, epoch_day(date));

            let dot = |range: std::ops::Range<usize>| -> f64 {
                range.map(|j| row[j] * self.beta[j]).sum()
            };
            let trend_i = dot(trend_columns.clone());
            let mut parts = [0.0; 3];
            for (component, range) in &seasonal_columns {
                let slot = match component {
                    SeasonalComponent::Yearly => 0,
                    SeasonalComponent::Weekly => 1,
                    SeasonalComponent::Daily => 2,
                };
                parts[slot] += dot(range.clone());
            }

            t.push(ti);
            trend.push(trend_i);
            seasonal.push(parts.iter().sum::<f64>());
            components.push(ForecastComponents {
                date,
                trend: trend_i * self.y_scale,
                yearly: parts[0] * self.y_scale,
                weekly: parts[1] * self.y_scale,
                daily: parts[2] * self.y_scale,
            });
        }

        let deltas: Vec<f64> = self
            .layout
            .changepoint_columns()
            .map(|j| self.beta[j])
            .collect();
        let (lower, upper) = uncertainty_intervals(
            &SimulationInput {
                t: &t,
                trend: &trend,
                seasonal: &seasonal,
                deltas: &deltas,
                sigma: self.sigma,
            },
            SimulationSettings {
                samples: config.uncertainty_samples,
                interval_width: config.interval_width,
                seed: config.seed,
            },
        )?;

        let points = components
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let predicted = (trend[i] + seasonal[i]) * self.y_scale;
                ForecastPoint {
                    date: c.date,
                    predicted,
                    lower: (lower[i] * self.y_scale).min(predicted),
                    upper: (upper[i] * self.y_scale).max(predicted),
                }
            })
            .collect();

        Ok(Forecast {
            points,
            components,
            changepoints: self.changepoint_dates.clone(),
            sigma: self.sigma * self.y_scale,
            last_observed: self.start + chrono::Duration::days(self.history_len as i64 - 1),
            horizon_days: config.horizon_days,
        })
    }
}

/// History maps onto [0, 1]; horizon points continue past 1
fn scaled_time(index: usize, history_len: usize) -> f64 {
    index as f64 / (history_len.max(2) - 1) as f64
}

/// Prior weights for each column given the current noise variance
fn penalties(layout: &DesignLayout, sigma2: f64, config: &ForecastConfig) -> Vec<Penalty> {
    let changepoint_weight = 2.0 * sigma2 / config.changepoint_prior_scale;
    let seasonal_weight = sigma2 / config.seasonality_prior_scale.powi(2);
    let changepoints = layout.changepoint_columns();
    (0..layout.n_columns())
        .map(|j| {
            if j < changepoints.start {
                Penalty::Free
            } else if j < changepoints.end {
                Penalty::L1(changepoint_weight)
            } else {
                Penalty::L2(seasonal_weight)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SeasonalityToggle;
    use chrono::{Datelike, Duration, Weekday};

    fn series_from(start: NaiveDate, values: &[f64]) -> BTreeMap<NaiveDate, f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (start + Duration::days(i as i64), v))
            .collect()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn quick_config(horizon_days: u32) -> ForecastConfig {
        ForecastConfig {
            horizon_days,
            uncertainty_samples: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_linear_history_trends_up() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let forecast = forecast_revenue(&series_from(start(), &values), &quick_config(5)).unwrap();

        assert_eq!(forecast.points.len(), 15);
        assert_eq!(forecast.horizon_points().len(), 5);
        assert_eq!(forecast.last_observed, start() + Duration::days(9));
        assert_eq!(forecast.horizon_points()[0].date, start() + Duration::days(10));

        for point in &forecast.points {
            assert!(point.lower <= point.predicted && point.predicted <= point.upper);
        }

        let horizon = forecast.horizon_points();
        for pair in horizon.windows(2) {
            assert!(pair[1].predicted > pair[0].predicted);
        }
        assert!(horizon[0].predicted > 10.0);
        // the history is reproduced closely
        assert!((forecast.points[4].predicted - 5.0).abs() < 0.1);
    }

    #[test]
    fn test_tail_returns_final_points() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let forecast = forecast_revenue(&series_from(start(), &values), &quick_config(5)).unwrap();

        let tail = forecast.tail(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[2].date, start() + Duration::days(14));
        assert_eq!(tail, &forecast.points[12..]);
        assert_eq!(forecast.tail(100).len(), 15);
        assert!(forecast.tail(0).is_empty());
    }

    #[test]
    fn test_forecast_is_idempotent() {
        let values = [5.0, 7.0, 6.0, 9.0, 4.0, 8.0, 10.0, 7.0, 9.0, 11.0, 12.0, 9.0];
        let daily = series_from(start(), &values);
        let first = forecast_revenue(&daily, &quick_config(7)).unwrap();
        let second = forecast_revenue(&daily, &quick_config(7)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_recovers_weekly_pattern() {
        let config = ForecastConfig {
            yearly: SeasonalityToggle::Disabled,
            daily: SeasonalityToggle::Disabled,
            ..quick_config(14)
        };
        let daily: BTreeMap<NaiveDate, f64> = (0..56)
            .map(|i| {
                let date = start() + Duration::days(i);
                let revenue = match date.weekday() {
                    Weekday::Sat | Weekday::Sun => 100.0,
                    _ => 50.0,
                };
                (date, revenue)
            })
            .collect();

        let forecast = forecast_revenue(&daily, &config).unwrap();
        let mean_of = |weekend: bool| {
            let values: Vec<f64> = forecast
                .horizon_points()
                .iter()
                .filter(|p| matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun) == weekend)
                .map(|p| p.predicted)
                .collect();
            values.iter().sum::<f64>() / values.len() as f64
        };
        assert!(mean_of(true) - mean_of(false) > 15.0);
        assert!(forecast.components.iter().all(|c| c.yearly == 0.0 && c.daily == 0.0));
    }

    #[test]
    fn test_gap_counts_as_zero_revenue() {
        let mut daily = series_from(start(), &[10.0, 10.0, 10.0, 10.0, 10.0, 10.0]);
        daily.remove(&(start() + Duration::days(2)));
        let forecast = forecast_revenue(&daily, &quick_config(3)).unwrap();

        assert_eq!(forecast.history_points().len(), 6);
        assert!(forecast
            .history_points()
            .windows(2)
            .all(|w| w[1].date - w[0].date == Duration::days(1)));
    }

    #[test]
    fn test_insufficient_history() {
        let single = series_from(start(), &[42.0]);
        assert!(matches!(
            forecast_revenue(&single, &quick_config(5)),
            Err(AnalyticsError::InsufficientHistory { distinct_dates: 1 })
        ));
    }

    #[test]
    fn test_all_zero_revenue() {
        let daily = series_from(start(), &[0.0; 8]);
        let forecast = forecast_revenue(&daily, &quick_config(4)).unwrap();
        assert!(forecast.points.iter().all(|p| p.predicted.abs() < 1e-6));
    }
}
