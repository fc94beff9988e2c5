//! Monte Carlo uncertainty intervals for the forecast
//!
//! Each draw extends the fitted trend with freshly sampled changepoints over
//! the horizon, then adds Gaussian observation noise. Draws are independent
//! and seeded by their index, so results do not depend on rayon scheduling.

use crate::error::AnalyticsError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Poisson};
use rayon::prelude::*;

/// Fitted quantities the simulation perturbs, all on the scaled axes
#[derive(Debug, Clone)]
pub struct SimulationInput<'a> {
    /// Scaled time of every output point; history lies in [0, 1]
    pub t: &'a [f64],
    /// Fitted trend at every output point
    pub trend: &'a [f64],
    /// Sum of seasonal components at every output point
    pub seasonal: &'a [f64],
    /// Fitted changepoint slope adjustments
    pub deltas: &'a [f64],
    /// Observation noise standard deviation
    pub sigma: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationSettings {
    pub samples: usize,
    pub interval_width: f64,
    pub seed: u64,
}

/// Lower and upper interval bounds per output point
pub fn uncertainty_intervals(
    input: &SimulationInput<'_>,
    settings: SimulationSettings,
) -> Result<(Vec<f64>, Vec<f64>), AnalyticsError> {
    let n_points = input.t.len();
    if input.trend.len() != n_points || input.seasonal.len() != n_points {
        return Err(AnalyticsError::Numerical(
            "simulation inputs have mismatched lengths".to_string(),
        ));
    }

    let t_max = input.t.iter().copied().fold(0.0, f64::max);
    let n_changepoints = input.deltas.len();
    // expected number of new changepoints over the horizon, at the historical rate
    let change_rate = if t_max > 1.0 && n_changepoints > 0 {
        n_changepoints as f64 * (t_max - 1.0)
    } else {
        0.0
    };
    let delta_scale =
        input.deltas.iter().map(|d| d.abs()).sum::<f64>() / n_changepoints.max(1) as f64 + 1e-8;

    let poisson = if change_rate > 0.0 {
        Some(Poisson::new(change_rate).map_err(|e| AnalyticsError::Numerical(e.to_string()))?)
    } else {
        None
    };
    let laplace_magnitude =
        Exp::new(1.0 / delta_scale).map_err(|e| AnalyticsError::Numerical(e.to_string()))?;
    let noise = Normal::new(0.0, input.sigma.max(0.0))
        .map_err(|e| AnalyticsError::Numerical(e.to_string()))?;

    let draws: Vec<Vec<f64>> = (0..settings.samples)
        .into_par_iter()
        .map(|draw| {
            let mut rng = StdRng::seed_from_u64(settings.seed.wrapping_add(draw as u64));

            let n_new = poisson.as_ref().map_or(0, |p| {
                let count: f64 = p.sample(&mut rng);
                count as usize
            });
            let new_changepoints: Vec<(f64, f64)> = (0..n_new)
                .map(|_| {
                    let location = 1.0 + rng.gen::<f64>() * (t_max - 1.0);
                    let magnitude = laplace_magnitude.sample(&mut rng);
                    let delta = if rng.gen::<bool>() { magnitude } else { -magnitude };
                    (location, delta)
                })
                .collect();

            (0..n_points)
                .map(|i| {
                    let t = input.t[i];
                    let extra: f64 = new_changepoints
                        .iter()
                        .map(|&(s, delta)| delta * (t - s).max(0.0))
                        .sum();
                    input.trend[i] + extra + input.seasonal[i] + noise.sample(&mut rng)
                })
                .collect()
        })
        .collect();

    let lower_q = (1.0 - settings.interval_width) / 2.0;
    let upper_q = (1.0 + settings.interval_width) / 2.0;

    let bounds: Vec<(f64, f64)> = (0..n_points)
        .into_par_iter()
        .map(|i| {
            let mut column: Vec<f64> = draws.iter().map(|draw| draw[i]).collect();
            column.sort_by(f64::total_cmp);
            (percentile(&column, lower_q), percentile(&column, upper_q))
        })
        .collect();

    Ok(bounds.into_iter().unzip())
}

/// Linear-interpolated percentile of an ascending slice; `q` in [0, 1]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let position = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = position.floor() as usize;
            let hi = position.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (position - lo as f64)
        }
    }
}
