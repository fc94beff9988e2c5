//! Engine settings: defaults, optional TOML file, `RETAILCAST__*` environment overrides

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration for every report the engine produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub segmentation: SegmentationConfig,
    pub inventory: InventoryConfig,
    pub ranking: RankingConfig,
    pub forecast: ForecastConfig,
}

/// How cluster ids are turned into segment labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Rank clusters by mean revenue and label by rank.
    RevenueRank,
    /// Label by raw cluster id (order depends on the clusterer).
    Positional,
}

/// Parameters for K-Means customer segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Requested number of clusters (1-4); reduced when there are fewer distinct customers
    pub n_clusters: usize,
    /// Seed for k-means++ initialisation
    pub seed: u64,
    /// Maximum iterations for K-Means
    pub max_iterations: u64,
    /// Convergence tolerance for K-Means
    pub tolerance: f64,
    /// Number of independent initialisations; the lowest inertia wins
    pub n_runs: usize,
    pub label_policy: LabelPolicy,
    /// Points sampled when computing the silhouette score
    pub silhouette_sample: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            seed: 42,
            max_iterations: 300,
            tolerance: 1e-4,
            n_runs: 10,
            label_policy: LabelPolicy::RevenueRank,
            silhouette_sample: 100,
        }
    }
}

/// Thresholds for inventory health flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Products with stock strictly below this are flagged low-stock
    pub low_stock_threshold: u32,
    /// Products with a turnover rate strictly below this are flagged overstocked
    pub overstock_turnover_threshold: f64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 20,
            overstock_turnover_threshold: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// Whether a seasonal component takes part in the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityToggle {
    /// Enabled only when the history is long enough to identify the period
    Auto,
    Enabled,
    Disabled,
}

/// Parameters for the additive trend + seasonality forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Days forecast beyond the last observed date
    pub horizon_days: u32,
    pub n_changepoints: usize,
    /// Fraction of the history in which changepoints are placed
    pub changepoint_range: f64,
    /// Laplace scale of the changepoint prior; smaller means a stiffer trend
    pub changepoint_prior_scale: f64,
    /// Gaussian scale of the seasonal coefficient prior
    pub seasonality_prior_scale: f64,
    pub yearly: SeasonalityToggle,
    pub yearly_order: usize,
    pub weekly: SeasonalityToggle,
    pub weekly_order: usize,
    pub daily: SeasonalityToggle,
    pub daily_order: usize,
    /// Width of the central uncertainty interval, e.g. 0.8 for the 10th/90th percentiles
    pub interval_width: f64,
    pub uncertainty_samples: usize,
    /// Seed for the uncertainty simulation
    pub seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: 60,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly: SeasonalityToggle::Enabled,
            yearly_order: 10,
            weekly: SeasonalityToggle::Enabled,
            weekly_order: 3,
            daily: SeasonalityToggle::Enabled,
            daily_order: 4,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 42,
        }
    }
}

impl EngineConfig {
    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmentation;
        if !(1..=4).contains(&seg.n_clusters) {
            return Err(ConfigError::Validation(format!(
                "segmentation.n_clusters must be between 1 and 4 (one per segment label), got {}",
                seg.n_clusters
            )));
        }
        if seg.max_iterations == 0 || seg.n_runs == 0 {
            return Err(ConfigError::Validation(
                "segmentation.max_iterations and segmentation.n_runs must be positive".to_string(),
            ));
        }
        if !(seg.tolerance > 0.0) {
            return Err(ConfigError::Validation(
                "segmentation.tolerance must be positive".to_string(),
            ));
        }
        if !(self.inventory.overstock_turnover_threshold >= 0.0) {
            return Err(ConfigError::Validation(
                "inventory.overstock_turnover_threshold must be non-negative".to_string(),
            ));
        }

        let fc = &self.forecast;
        if !(fc.interval_width > 0.0 && fc.interval_width < 1.0) {
            return Err(ConfigError::Validation(format!(
                "forecast.interval_width must lie in (0, 1), got {}",
                fc.interval_width
            )));
        }
        if !(fc.changepoint_range > 0.0 && fc.changepoint_range <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "forecast.changepoint_range must lie in (0, 1], got {}",
                fc.changepoint_range
            )));
        }
        if !(fc.changepoint_prior_scale > 0.0 && fc.seasonality_prior_scale > 0.0) {
            return Err(ConfigError::Validation(
                "forecast prior scales must be positive".to_string(),
            ));
        }
        if fc.uncertainty_samples == 0 {
            return Err(ConfigError::Validation(
                "forecast.uncertainty_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load the engine configuration.
///
/// Sources are layered in order: built-in defaults, the optional TOML file at
/// `path`, then environment variables such as `RETAILCAST__FORECAST__HORIZON_DAYS`.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut builder =
        config::Config::builder().add_source(config::Config::try_from(&EngineConfig::default())?);

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config = builder
        .add_source(
            config::Environment::with_prefix("RETAILCAST")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize::<EngineConfig>()?;

    config.validate()?;
    Ok(config)
}
