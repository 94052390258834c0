//! K-means clustering for event data.
//!
//! Provides Lloyd's algorithm and mini-batch k-means, both seeded with
//! k-means++.
//!
//! References:
//! - Arthur, Vassilvitskii. "k-means++: The Advantages of Careful Seeding" (2007)
//! - Sculley. "Web-Scale K-Means Clustering" (2010)

use crate::error::{CytoflowError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// mini-batch early stopping, as in scikit-learn
const MAX_NO_IMPROVEMENT: usize = 10;

/// Which k-means variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KMeansAlgorithm {
    /// Full-batch Lloyd iterations.
    #[default]
    Lloyd,
    /// Mini-batch updates with per-center learning rates.
    MiniBatch { batch_size: usize },
}

/// K-means configuration.
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Number of clusters
    pub k: usize,
    /// Maximum iterations (full passes over the data for mini-batch)
    pub max_iter: usize,
    /// Convergence tolerance on the squared movement of the centers
    pub tolerance: f64,
    /// Random seed for initialization
    pub seed: Option<u64>,
    /// Algorithm variant
    pub algorithm: KMeansAlgorithm,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 3,
            max_iter: 300,
            tolerance: 1e-8,
            seed: None,
            algorithm: KMeansAlgorithm::Lloyd,
        }
    }
}

impl KMeansConfig {
    /// Set number of clusters.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    /// Set maximum iterations.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Set convergence tolerance.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the algorithm variant.
    pub fn algorithm(mut self, algorithm: KMeansAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// A fitted k-means model.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    centers: Vec<Vec<f64>>,
    inertia: f64,
    n_iter: usize,
}

impl KMeansModel {
    /// Build a model from known centers.
    pub fn from_centers(centers: Vec<Vec<f64>>) -> Result<Self> {
        let dims = validate_points(&centers)?;
        if dims == 0 {
            return Err(CytoflowError::InvalidParameter(
                "centers must have at least one dimension".to_string(),
            ));
        }
        Ok(Self {
            centers,
            inertia: 0.0,
            n_iter: 0,
        })
    }

    /// Cluster centers, one row per cluster.
    pub fn cluster_centers(&self) -> &[Vec<f64>] {
        &self.centers
    }

    pub fn n_clusters(&self) -> usize {
        self.centers.len()
    }

    pub fn n_features(&self) -> usize {
        self.centers.first().map_or(0, |c| c.len())
    }

    /// Sum of squared distances from each training point to its center.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Number of iterations performed.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Index of the nearest center.
    pub fn predict(&self, point: &[f64]) -> usize {
        nearest_center(point, &self.centers).0
    }

    pub fn predict_all(&self, points: &[Vec<f64>]) -> Vec<usize> {
        points.iter().map(|p| self.predict(p)).collect()
    }
}

/// Fit k-means to a set of points.
///
/// # Arguments
/// * `points` - One row per point; all rows must have the same length
/// * `config` - K-means configuration
///
/// # Errors
/// Fails if there are no points, fewer points than clusters, ragged rows,
/// or non-finite coordinates.
pub fn kmeans(points: &[Vec<f64>], config: &KMeansConfig) -> Result<KMeansModel> {
    let n = points.len();
    if n == 0 {
        return Err(CytoflowError::InvalidParameter(
            "k-means needs at least one point".to_string(),
        ));
    }
    validate_points(points)?;
    if points.iter().flatten().any(|x| !x.is_finite()) {
        return Err(CytoflowError::InvalidParameter(
            "k-means points must be finite".to_string(),
        ));
    }
    if config.k == 0 || config.k > n {
        return Err(CytoflowError::InvalidParameter(format!(
            "k = {} clusters requested for {} points",
            config.k, n
        )));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let centers = initialize_centers(points, config.k, &mut rng);

    let (centers, n_iter) = match config.algorithm {
        KMeansAlgorithm::Lloyd => lloyd(points, centers, config),
        KMeansAlgorithm::MiniBatch { batch_size } => {
            minibatch(points, centers, batch_size.max(1), config, &mut rng)
        }
    };

    let inertia = points
        .iter()
        .map(|p| nearest_center(p, &centers).1)
        .sum();

    Ok(KMeansModel {
        centers,
        inertia,
        n_iter,
    })
}

/// Check that every row has the same length; returns that length.
fn validate_points(points: &[Vec<f64>]) -> Result<usize> {
    let dims = points.first().map_or(0, |p| p.len());
    for p in points {
        if p.len() != dims {
            return Err(CytoflowError::DimensionMismatch {
                expected: dims,
                got: p.len(),
            });
        }
    }
    Ok(dims)
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Find the nearest center and the squared distance to it.
fn nearest_center(point: &[f64], centers: &[Vec<f64>]) -> (usize, f64) {
    let mut min_dist = f64::INFINITY;
    let mut nearest = 0;

    for (i, center) in centers.iter().enumerate() {
        let dist = squared_distance(point, center);
        if dist < min_dist {
            min_dist = dist;
            nearest = i;
        }
    }

    (nearest, min_dist)
}

/// Initialize centers using k-means++.
fn initialize_centers(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..n)].clone());

    let mut min_distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centers[0]))
        .collect();

    for _ in 1..k {
        let sum: f64 = min_distances.iter().sum();

        // Select next center proportional to squared distance
        let selected = if sum > 0.0 {
            let threshold = rng.gen::<f64>() * sum;
            let mut cumsum = 0.0;
            let mut selected = n - 1;
            for (i, &d) in min_distances.iter().enumerate() {
                cumsum += d;
                if cumsum > threshold {
                    selected = i;
                    break;
                }
            }
            selected
        } else {
            rng.gen_range(0..n)
        };

        let center = points[selected].clone();
        for (d, p) in min_distances.iter_mut().zip(points.iter()) {
            *d = d.min(squared_distance(p, &center));
        }
        centers.push(center);
    }

    centers
}

/// Lloyd iterations. Returns the centers and the number of iterations.
fn lloyd(points: &[Vec<f64>], mut centers: Vec<Vec<f64>>, config: &KMeansConfig) -> (Vec<Vec<f64>>, usize) {
    let k = centers.len();
    let dims = centers[0].len();
    let mut labels = vec![usize::MAX; points.len()];
    let mut n_iter = 0;

    for iter in 0..config.max_iter {
        n_iter = iter + 1;

        // Assignment step
        let mut distances = vec![0.0; points.len()];
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let (nearest, dist) = nearest_center(p, &centers);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
            distances[i] = dist;
        }
        if !changed {
            break;
        }

        // Update step
        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (p, &label) in points.iter().zip(labels.iter()) {
            counts[label] += 1;
            for (s, x) in sums[label].iter_mut().zip(p.iter()) {
                *s += x;
            }
        }

        let mut shift = 0.0;
        for cluster in 0..k {
            let new_center = if counts[cluster] == 0 {
                // Re-seed an empty cluster from the worst-fit point
                let (far, _) = distances
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, &d)| {
                        if d > best.1 {
                            (i, d)
                        } else {
                            best
                        }
                    });
                distances[far] = 0.0;
                points[far].clone()
            } else {
                sums[cluster]
                    .iter()
                    .map(|s| s / counts[cluster] as f64)
                    .collect()
            };
            shift += squared_distance(&new_center, &centers[cluster]);
            centers[cluster] = new_center;
        }

        if shift <= config.tolerance {
            break;
        }
    }

    (centers, n_iter)
}

/// Mini-batch k-means. Returns the centers and the number of batch steps.
fn minibatch(
    points: &[Vec<f64>],
    mut centers: Vec<Vec<f64>>,
    batch_size: usize,
    config: &KMeansConfig,
    rng: &mut StdRng,
) -> (Vec<Vec<f64>>, usize) {
    let n = points.len();
    let k = centers.len();
    let dims = centers[0].len();
    let batch_size = batch_size.min(n);

    let n_steps = (config.max_iter * n).div_ceil(batch_size).max(1);
    let ema_alpha = (batch_size as f64 * 2.0 / (n as f64 + 1.0)).min(1.0);

    let mut counts = vec![0usize; k];
    let mut ema_inertia = f64::INFINITY;
    let mut ema_inertia_min = f64::INFINITY;
    let mut no_improvement = 0;
    let mut steps = 0;

    for _ in 0..n_steps {
        steps += 1;

        // E-step against frozen centers
        let mut batch_sums = vec![vec![0.0; dims]; k];
        let mut batch_counts = vec![0usize; k];
        let mut batch_inertia = 0.0;
        for _ in 0..batch_size {
            let p = &points[rng.gen_range(0..n)];
            let (nearest, dist) = nearest_center(p, &centers);
            batch_inertia += dist;
            batch_counts[nearest] += 1;
            for (s, x) in batch_sums[nearest].iter_mut().zip(p.iter()) {
                *s += x;
            }
        }
        batch_inertia /= batch_size as f64;

        // M-step with per-center learning rate
        let mut shift = 0.0;
        for j in 0..k {
            if batch_counts[j] == 0 {
                continue;
            }
            let bc = batch_counts[j] as f64;
            let alpha = bc / (counts[j] as f64 + bc);
            for (c, s) in centers[j].iter_mut().zip(batch_sums[j].iter()) {
                let step = (s / bc - *c) * alpha;
                shift += step * step;
                *c += step;
            }
            counts[j] += batch_counts[j];
        }

        // Reassign centers that have attracted (almost) nothing
        let max_count = counts.iter().copied().max().unwrap_or(0);
        let empty_threshold = (0.00005 * max_count as f64) as usize;
        for j in 0..k {
            if counts[j] <= empty_threshold && max_count > 0 {
                centers[j] = points[rng.gen_range(0..n)].clone();
                counts[j] = counts
                    .iter()
                    .copied()
                    .filter(|&c| c > empty_threshold)
                    .min()
                    .unwrap_or(1)
                    .max(1);
            }
        }

        if shift <= config.tolerance {
            break;
        }

        ema_inertia = if ema_inertia.is_infinite() {
            batch_inertia
        } else {
            ema_inertia * (1.0 - ema_alpha) + batch_inertia * ema_alpha
        };
        if ema_inertia < ema_inertia_min {
            ema_inertia_min = ema_inertia;
            no_improvement = 0;
        } else {
            no_improvement += 1;
            if no_improvement >= MAX_NO_IMPROVEMENT {
                break;
            }
        }
    }

    (centers, steps)
}
