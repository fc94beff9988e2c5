//! Design-matrix layout: piecewise-linear trend columns followed by Fourier seasonality columns

use crate::settings::{ForecastConfig, SeasonalityToggle};
use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;
use std::ops::Range;

/// `num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Periodic components of the additive model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonalComponent {
    Yearly,
    Weekly,
    Daily,
}

impl SeasonalComponent {
    /// Period in days
    pub fn period(&self) -> f64 {
        match self {
            SeasonalComponent::Yearly => 365.25,
            SeasonalComponent::Weekly => 7.0,
            SeasonalComponent::Daily => 1.0,
        }
    }

    /// Shortest history (in days) for which `Auto` turns the component on
    fn auto_min_span(&self) -> Option<i64> {
        match self {
            SeasonalComponent::Yearly => Some(730),
            SeasonalComponent::Weekly => Some(14),
            // never identifiable from one observation per day
            SeasonalComponent::Daily => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seasonality {
    pub component: SeasonalComponent,
    /// Number of sine/cosine harmonic pairs
    pub order: usize,
}

/// Seasonalities that take part in a fit over a history spanning `span_days`
pub fn active_seasonalities(config: &ForecastConfig, span_days: i64) -> Vec<Seasonality> {
    [
        (SeasonalComponent::Yearly, config.yearly, config.yearly_order),
        (SeasonalComponent::Weekly, config.weekly, config.weekly_order),
        (SeasonalComponent::Daily, config.daily, config.daily_order),
    ]
    .into_iter()
    .filter(|&(component, toggle, order)| {
        order > 0
            && match toggle {
                SeasonalityToggle::Enabled => true,
                SeasonalityToggle::Disabled => false,
                SeasonalityToggle::Auto => component
                    .auto_min_span()
                    .is_some_and(|min_span| span_days >= min_span),
            }
    })
    .map(|(component, _, order)| Seasonality { component, order })
    .collect()
}

/// History indices of the trend changepoints.
///
/// Changepoints are spread evenly over the first `range` fraction of the
/// `n` history points, skipping the first point. Short histories get fewer
/// changepoints.
pub fn changepoint_indices(n: usize, n_changepoints: usize, range: f64) -> Vec<usize> {
    let hist_size = (n as f64 * range).floor() as usize;
    let count = n_changepoints.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=count)
        .map(|i| (i as f64 * last / count as f64).round() as usize)
        .collect()
}

/// Days since 1970-01-01, the phase origin of every Fourier term
pub fn epoch_day(date: NaiveDate) -> f64 {
    (date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE) as f64
}

fn fourier_terms(epoch_day: f64, seasonality: &Seasonality, out: &mut Vec<f64>) {
    let period = seasonality.component.period();
    for harmonic in 1..=seasonality.order {
        let angle = 2.0 * PI * harmonic as f64 * epoch_day / period;
        out.push(angle.sin());
        out.push(angle.cos());
    }
}

/// Column layout: `[1, t, (t - s_1)+, .., (t - s_S)+, fourier(seasonality_1), ..]`
#[derive(Debug, Clone, PartialEq)]
pub struct DesignLayout {
    /// Changepoint locations on the scaled time axis
    pub changepoints_t: Vec<f64>,
    pub seasonalities: Vec<Seasonality>,
}

impl DesignLayout {
    pub fn n_columns(&self) -> usize {
        self.trend_columns().end + self.seasonalities.iter().map(|s| 2 * s.order).sum::<usize>()
    }

    /// Intercept, slope and one column per changepoint
    pub fn trend_columns(&self) -> Range<usize> {
        0..2 + self.changepoints_t.len()
    }

    pub fn changepoint_columns(&self) -> Range<usize> {
        2..self.trend_columns().end
    }

    /// Column range of each active seasonality, in layout order
    pub fn seasonal_columns(&self) -> Vec<(SeasonalComponent, Range<usize>)> {
        let mut start = self.trend_columns().end;
        self.seasonalities
            .iter()
            .map(|s| {
                let range = start..start + 2 * s.order;
                start = range.end;
                (s.component, range)
            })
            .collect()
    }

    /// One design row for scaled time `t` on calendar day `epoch_day`
    pub fn row(&self, t: f64, epoch_day: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.n_columns());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints_t.iter().map(|&s| (t - s).max(0.0)));
        for seasonality in &self.seasonalities {
            fourier_terms(epoch_day, seasonality, &mut row);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changepoints_for_short_history() {
        // 10 points: the first 8 are eligible, so at most 7 changepoints
        assert_eq!(changepoint_indices(10, 25, 0.8), vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(changepoint_indices(2, 25, 0.8).is_empty());
    }

    #[test]
    fn test_changepoints_evenly_spaced() {
        let idx = changepoint_indices(365, 25, 0.8);
        assert_eq!(idx.len(), 25);
        assert_eq!(*idx.last().unwrap(), 291);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_auto_seasonalities() {
        let config = ForecastConfig {
            yearly: SeasonalityToggle::Auto,
            weekly: SeasonalityToggle::Auto,
            daily: SeasonalityToggle::Auto,
            ..Default::default()
        };
        let active = active_seasonalities(&config, 30);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].component, SeasonalComponent::Weekly);

        let active = active_seasonalities(&config, 800);
        assert_eq!(active.len(), 2);

        // default forces every component on
        assert_eq!(active_seasonalities(&ForecastConfig::default(), 10).len(), 3);
    }

    #[test]
    fn test_row_layout() {
        let layout = DesignLayout {
            changepoints_t: vec![0.25, 0.5],
            seasonalities: vec![Seasonality {
                component: SeasonalComponent::Weekly,
                order: 2,
            }],
        };
        assert_eq!(layout.n_columns(), 8);
        assert_eq!(layout.seasonal_columns(), vec![(SeasonalComponent::Weekly, 4..8)]);

        let row = layout.row(0.4, 0.0);
        assert_eq!(row.len(), 8);
        assert_eq!(row[0], 1.0);
        assert_eq!(row[1], 0.4);
        assert!((row[2] - 0.15).abs() < 1e-12);
        assert_eq!(row[3], 0.0);
        // sin(0) = 0, cos(0) = 1
        assert_eq!(row[4], 0.0);
        assert_eq!(row[5], 1.0);
    }

    #[test]
    fn test_epoch_day() {
        assert_eq!(epoch_day(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0.0);
        assert_eq!(epoch_day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), 19_723.0);
    }

    #[test]
    fn test_weekly_terms_repeat() {
        let layout = DesignLayout {
            changepoints_t: vec![],
            seasonalities: vec![Seasonality {
                component: SeasonalComponent::Weekly,
                order: 3,
            }],
        };
        let a = layout.row(0.0, 19_000.0);
        let b = layout.row(0.0, 19_007.0);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }
}
