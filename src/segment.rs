//! K-Means customer segmentation on revenue, order count and age

use crate::aggregate::CustomerAggregate;
use crate::error::AnalyticsError;
use crate::settings::{LabelPolicy, SegmentationConfig};
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Number of features per customer: total revenue, order count, age
const N_FEATURES: usize = 3;

/// Semantic name attached to a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SegmentLabel {
    #[serde(rename = "High-Value")]
    HighValue,
    #[serde(rename = "Frequent Buyers")]
    FrequentBuyers,
    #[serde(rename = "New Customers")]
    NewCustomers,
    #[serde(rename = "Low-Value")]
    LowValue,
}

impl SegmentLabel {
    /// Label order used by [`LabelPolicy::Positional`], indexed by cluster id
    pub const POSITIONAL: [SegmentLabel; 4] = [
        SegmentLabel::LowValue,
        SegmentLabel::HighValue,
        SegmentLabel::FrequentBuyers,
        SegmentLabel::NewCustomers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentLabel::HighValue => "High-Value",
            SegmentLabel::FrequentBuyers => "Frequent Buyers",
            SegmentLabel::NewCustomers => "New Customers",
            SegmentLabel::LowValue => "Low-Value",
        }
    }

    /// Label for the cluster ranked `rank` (0 = highest mean revenue) out of `populated`
    fn for_rank(rank: usize, populated: usize) -> Self {
        if rank == 0 {
            SegmentLabel::HighValue
        } else if rank + 1 == populated {
            SegmentLabel::LowValue
        } else if rank == 1 {
            SegmentLabel::FrequentBuyers
        } else {
            SegmentLabel::NewCustomers
        }
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal conditions encountered while segmenting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SegmentationWarning {
    /// Fewer distinct customers than requested clusters; the cluster count was reduced
    DegenerateClustering { requested: usize, effective: usize },
}

impl fmt::Display for SegmentationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentationWarning::DegenerateClustering { requested, effective } => write!(
                f,
                "only {} distinct customer profile(s); reduced clusters from {} to {}",
                effective, requested, effective
            ),
        }
    }
}

/// Segment assignment for one customer, with the features it was clustered on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSegment {
    pub customer_id: String,
    pub cluster_id: usize,
    pub label: SegmentLabel,
    pub total_revenue: f64,
    pub order_count: usize,
    pub age: u32,
    pub region: String,
}

/// Per-segment statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub label: SegmentLabel,
    pub avg_revenue: f64,
    pub total_revenue: f64,
    pub avg_orders: f64,
    pub avg_age: f64,
    pub customer_count: usize,
}

/// Result of one segmentation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segmentation {
    /// One entry per input customer, in input order
    pub segments: Vec<CustomerSegment>,
    pub requested_clusters: usize,
    pub effective_clusters: usize,
    /// Cluster centroids in standardized feature space
    pub centroids: Vec<[f64; N_FEATURES]>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
    /// Silhouette score over a sample of customers
    pub silhouette: f64,
    pub warning: Option<SegmentationWarning>,
}

impl Segmentation {
    /// Get cluster sizes, indexed by cluster id
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.effective_clusters];
        for segment in &self.segments {
            if segment.cluster_id < self.effective_clusters {
                sizes[segment.cluster_id] += 1;
            }
        }
        sizes
    }

    /// Summary statistics per label, ordered from High-Value to Low-Value
    pub fn summaries(&self) -> Vec<SegmentSummary> {
        let mut groups: BTreeMap<SegmentLabel, Vec<&CustomerSegment>> = BTreeMap::new();
        for segment in &self.segments {
            groups.entry(segment.label).or_default().push(segment);
        }

        groups
            .into_iter()
            .map(|(label, members)| {
                let count = members.len() as f64;
                let total_revenue: f64 = members.iter().map(|m| m.total_revenue).sum();
                SegmentSummary {
                    label,
                    avg_revenue: total_revenue / count,
                    total_revenue,
                    avg_orders: members.iter().map(|m| m.order_count as f64).sum::<f64>() / count,
                    avg_age: members.iter().map(|m| m.age as f64).sum::<f64>() / count,
                    customer_count: members.len(),
                }
            })
            .collect()
    }
}

/// Zero-mean, unit-variance scaling fitted on the current population only
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    ///
    /// Columns with zero variance get a scale of 1 so they transform to 0.
    pub fn fit(data: &Array2<f64>) -> Self {
        let n = data.nrows().max(1) as f64;
        let means = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(data.ncols()));
        let scales = data
            .axis_iter(Axis(1))
            .zip(means.iter())
            .map(|(column, mean)| {
                let variance = column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                if std < 1e-12 {
                    tracing::warn!("feature has zero variance; leaving it unscaled");
                    1.0
                } else {
                    std
                }
            })
            .collect::<Array1<f64>>();
        Self { means, scales }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.means) / &self.scales
    }
}

/// Partition customers into at most `config.n_clusters` segments
///
/// # Arguments
/// * `customers` - Customer aggregates for the current filtered population
/// * `config` - Cluster count, seed, convergence and labelling parameters
///
/// # Returns
/// * A `Segmentation` covering every input customer exactly once
pub fn segment_customers(
    customers: &[CustomerAggregate],
    config: &SegmentationConfig,
) -> Result<Segmentation, AnalyticsError> {
    if customers.is_empty() {
        return Err(AnalyticsError::InsufficientData(
            "segmentation requires at least one customer".to_string(),
        ));
    }

    let raw_features = feature_matrix(customers)?;
    let features = StandardScaler::fit(&raw_features).transform(&raw_features);

    let requested = config.n_clusters;
    let distinct = count_distinct_rows(&raw_features);
    let effective = requested.min(distinct);
    let warning = if effective < requested {
        tracing::warn!(
            requested,
            effective,
            "fewer distinct customers than clusters; reducing cluster count"
        );
        Some(SegmentationWarning::DegenerateClustering {
            requested,
            effective,
        })
    } else {
        None
    };

    tracing::info!(
        customers = customers.len(),
        clusters = effective,
        "fitting customer segmentation"
    );

    let (labels, centroids) = if effective == 1 {
        let centroid = features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(N_FEATURES))
            .insert_axis(Axis(0));
        (Array1::zeros(customers.len()), centroid)
    } else {
        fit_kmeans(&features, effective, config)?
    };

    let inertia = compute_inertia(&features, &labels, &centroids);
    let silhouette = compute_silhouette_sample(
        &features,
        &labels,
        effective,
        config.silhouette_sample.min(customers.len()),
    );

    let cluster_labels = assign_labels(customers, &labels, effective, config.label_policy);
    let segments = customers
        .iter()
        .zip(labels.iter())
        .map(|(customer, &cluster_id)| CustomerSegment {
            customer_id: customer.customer_id.clone(),
            cluster_id,
            label: cluster_labels[cluster_id],
            total_revenue: customer.total_revenue,
            order_count: customer.order_count,
            age: customer.age,
            region: customer.region.clone(),
        })
        .collect::<Vec<_>>();

    let segmentation = Segmentation {
        segments,
        requested_clusters: requested,
        effective_clusters: effective,
        centroids: centroids
            .outer_iter()
            .map(|row| [row[0], row[1], row[2]])
            .collect(),
        inertia,
        silhouette,
        warning,
    };
    tracing::debug!(
        inertia,
        silhouette,
        sizes = ?segmentation.cluster_sizes(),
        "segmentation fitted"
    );
    Ok(segmentation)
}

fn feature_matrix(customers: &[CustomerAggregate]) -> Result<Array2<f64>, AnalyticsError> {
    let mut raw = Vec::with_capacity(customers.len() * N_FEATURES);
    for customer in customers {
        raw.extend_from_slice(&[
            customer.total_revenue,
            customer.order_count as f64,
            customer.age as f64,
        ]);
    }
    Array2::from_shape_vec((customers.len(), N_FEATURES), raw)
        .map_err(|e| AnalyticsError::Numerical(e.to_string()))
}

fn count_distinct_rows(features: &Array2<f64>) -> usize {
    features
        .outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Fit K-Means with a seeded k-means++ initialisation; returns labels and centroids
fn fit_kmeans(
    features: &Array2<f64>,
    n_clusters: usize,
    config: &SegmentationConfig,
) -> Result<(Array1<usize>, Array2<f64>), AnalyticsError> {
    let n_samples = features.nrows();
    let targets: Array1<usize> = Array1::zeros(n_samples); // Dummy targets for unsupervised learning
    let dataset = Dataset::new(features.clone(), targets);

    let rng = StdRng::seed_from_u64(config.seed);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .n_runs(config.n_runs)
        .fit(&dataset)
        .map_err(|e| AnalyticsError::Clustering(e.to_string()))?;

    let labels: Array1<usize> = model.predict(&dataset);
    Ok((labels, model.centroids().clone()))
}

/// Map each cluster id to a segment label according to `policy`
fn assign_labels(
    customers: &[CustomerAggregate],
    labels: &Array1<usize>,
    n_clusters: usize,
    policy: LabelPolicy,
) -> Vec<SegmentLabel> {
    match policy {
        LabelPolicy::Positional => (0..n_clusters)
            .map(|id| SegmentLabel::POSITIONAL[id % SegmentLabel::POSITIONAL.len()])
            .collect(),
        LabelPolicy::RevenueRank => {
            let mut sums = vec![0.0; n_clusters];
            let mut counts = vec![0usize; n_clusters];
            for (customer, &cluster) in customers.iter().zip(labels.iter()) {
                sums[cluster] += customer.total_revenue;
                counts[cluster] += 1;
            }

            // Empty clusters never receive customers, so they are left out of the ranking
            let mut ranked: Vec<(usize, f64)> = (0..n_clusters)
                .filter(|&id| counts[id] > 0)
                .map(|id| (id, sums[id] / counts[id] as f64))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

            let mut cluster_labels = vec![SegmentLabel::LowValue; n_clusters];
            for (rank, &(id, _)) in ranked.iter().enumerate() {
                cluster_labels[id] = SegmentLabel::for_rank(rank, ranked.len());
            }
            cluster_labels
        }
    }
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &cluster)| cluster < centroids.nrows())
        .map(|(i, &cluster)| {
            let distance = euclidean_distance(&features.row(i), &centroids.row(cluster));
            distance * distance
        })
        .sum()
}

/// Compute the silhouette coefficient over the first `sample_size` points
fn compute_silhouette_sample(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    n_clusters: usize,
    sample_size: usize,
) -> f64 {
    let n_samples = features.nrows().min(sample_size);
    if n_samples < 2 || n_clusters < 2 {
        return 0.0;
    }

    let mut silhouette_sum = 0.0;
    for i in 0..n_samples {
        let point = features.row(i);
        let cluster_label = labels[i];

        let mut same_cluster_distances = Vec::new();
        let mut other_cluster_distances: Vec<Vec<f64>> = vec![Vec::new(); n_clusters];

        for j in 0..n_samples {
            if i == j {
                continue;
            }
            let distance = euclidean_distance(&point, &features.row(j));
            let other_label = labels[j];
            if other_label == cluster_label {
                same_cluster_distances.push(distance);
            } else if other_label < n_clusters {
                other_cluster_distances[other_label].push(distance);
            }
        }

        // Singleton clusters score 0 by convention
        if same_cluster_distances.is_empty() {
            continue;
        }
        let a_i = same_cluster_distances.iter().sum::<f64>() / same_cluster_distances.len() as f64;

        let b_i = other_cluster_distances
            .iter()
            .filter(|distances| !distances.is_empty())
            .map(|distances| distances.iter().sum::<f64>() / distances.len() as f64)
            .fold(f64::INFINITY, f64::min);

        if b_i.is_finite() && a_i.max(b_i) > 0.0 {
            silhouette_sum += (b_i - a_i) / a_i.max(b_i);
        }
    }

    silhouette_sum / n_samples as f64
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}
