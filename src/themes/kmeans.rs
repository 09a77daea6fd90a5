// Seeded k-means over one group's TF-IDF rows.
//
// The group's sparse rows are densified into an ndarray matrix and handed to
// linfa-clustering (k-means++ initialization, Lloyd iterations) with a StdRng
// seeded from the params, so the same rows and seed always give the same
// labels. linfa stops at `max_iter` without failing; whether the final
// centroids are a fixed point is checked afterwards and exposed as
// `converged()`.
//
// A group with no more distinct rows than clusters is partitioned exactly,
// one cluster per distinct row, without running k-means at all.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use super::tfidf::SparseRow;

pub const DEFAULT_MAX_ITER: usize = 300;
pub const DEFAULT_TOL: f64 = 1e-4;
pub const DEFAULT_N_INIT: usize = 1;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansParams {
    pub n_clusters: usize,
    pub max_iter: usize,
    /// Centroid movement (L2) at or below which a run counts as converged.
    pub tol: f64,
    /// Number of seeded restarts; the lowest inertia wins.
    pub n_init: usize,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            n_clusters: 5,
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOL,
            n_init: DEFAULT_N_INIT,
            seed: DEFAULT_SEED,
        }
    }
}

impl KMeansParams {
    pub fn with_clusters(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Self::default()
        }
    }
}

/// A fitted clustering of one set of points.
#[derive(Debug, Clone)]
pub struct KMeansModel {
    centroids: Array2<f64>,
    labels: Vec<usize>,
    inertia: f64,
    converged: bool,
}

impl KMeansModel {
    /// Cluster `points` (each `dim` columns wide) into at most
    /// `params.n_clusters` groups.
    ///
    /// Fails when there are fewer points than clusters, when k or max_iter is
    /// zero, or when tol is negative. Running out of iterations is not an error: the last assignment is
    /// returned with `converged() == false`.
    pub fn fit(points: &[SparseRow<'_>], dim: usize, params: &KMeansParams) -> Result<Self> {
        let k = params.n_clusters;
        if k == 0 {
            bail!("k-means needs at least one cluster");
        }
        if params.max_iter == 0 {
            bail!("k-means needs max_iter >= 1");
        }
        if params.tol.is_nan() || params.tol < 0.0 {
            bail!("k-means tolerance must be non-negative, got {}", params.tol);
        }
        if points.len() < k {
            bail!("Cannot form {k} clusters from {} points", points.len());
        }

        let (distinct_labels, representatives) = distinct_rows(points);
        let model = if representatives.len() <= k {
            debug!(
                points = points.len(),
                distinct = representatives.len(),
                clusters = k,
                "Few distinct rows; one cluster per distinct row"
            );
            Self::exact(points, dim, distinct_labels, &representatives)
        } else {
            Self::fit_linfa(points, dim, params)?
        };

        if !model.converged {
            warn!(
                points = points.len(),
                clusters = k,
                max_iter = params.max_iter,
                "k-means did not converge; keeping last assignment"
            );
        }
        Ok(model)
    }

    fn exact(
        points: &[SparseRow<'_>],
        dim: usize,
        labels: Vec<usize>,
        representatives: &[usize],
    ) -> Self {
        let mut centroids = Array2::zeros((representatives.len(), dim));
        for (cluster, &row) in representatives.iter().enumerate() {
            for (col, w) in points[row].iter() {
                if col < dim {
                    centroids[[cluster, col]] = w;
                }
            }
        }
        Self {
            centroids,
            labels,
            inertia: 0.0,
            converged: true,
        }
    }

    fn fit_linfa(points: &[SparseRow<'_>], dim: usize, params: &KMeansParams) -> Result<Self> {
        let dataset = DatasetBase::from(to_dense_matrix(points, dim));
        let rng = StdRng::seed_from_u64(params.seed);

        // linfa wants a strictly positive tolerance; 0 means run every iteration.
        let fitted = KMeans::params_with_rng(params.n_clusters, rng)
            .n_runs(params.n_init.max(1))
            .max_n_iterations(params.max_iter as u64)
            .tolerance(params.tol.max(f64::MIN_POSITIVE))
            .fit(&dataset)
            .context("k-means fit failed")?;

        let data = dataset.records();
        let assigned: Array1<usize> = fitted.predict(data);
        let labels = assigned.to_vec();
        let centroids = fitted.centroids().clone();

        let shift = centroid_shift(data, &centroids, &labels);
        Ok(Self {
            inertia: inertia(data, &centroids, &labels),
            converged: shift <= params.tol,
            centroids,
            labels,
        })
    }

    /// Index of the nearest centroid, lowest index on ties.
    pub fn predict(&self, point: &SparseRow<'_>) -> usize {
        let mut dense = vec![0.0; self.centroids.ncols()];
        point.add_to(&mut dense);

        let mut best = (0, f64::INFINITY);
        for (j, center) in self.centroids.rows().into_iter().enumerate() {
            let d: f64 = center
                .iter()
                .zip(&dense)
                .map(|(c, x)| (c - x).powi(2))
                .sum();
            if d < best.1 {
                best = (j, d);
            }
        }
        best.0
    }

    /// Cluster index of every fitted point, in input order.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// One centroid per row, over the vocabulary columns.
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Sum of squared distances from each point to its centroid.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Number of points assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.nrows()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

fn to_dense_matrix(points: &[SparseRow<'_>], dim: usize) -> Array2<f64> {
    let mut dense = Array2::zeros((points.len(), dim));
    for (row, point) in points.iter().enumerate() {
        for (col, w) in point.iter() {
            if col < dim {
                dense[[row, col]] = w;
            }
        }
    }
    dense
}

/// Label of each point among the distinct rows (numbered by first
/// appearance), plus the index of each distinct row's first occurrence.
fn distinct_rows(points: &[SparseRow<'_>]) -> (Vec<usize>, Vec<usize>) {
    let mut seen: HashMap<Vec<(usize, u64)>, usize> = HashMap::new();
    let mut representatives = Vec::new();
    let mut labels = Vec::with_capacity(points.len());

    for (row, point) in points.iter().enumerate() {
        let key: Vec<(usize, u64)> = point.iter().map(|(c, w)| (c, w.to_bits())).collect();
        let next = representatives.len();
        let label = *seen.entry(key).or_insert(next);
        if label == next {
            representatives.push(row);
        }
        labels.push(label);
    }
    (labels, representatives)
}

fn inertia(data: &Array2<f64>, centroids: &Array2<f64>, labels: &[usize]) -> f64 {
    data.rows()
        .into_iter()
        .zip(labels)
        .map(|(point, &label)| {
            point
                .iter()
                .zip(centroids.row(label))
                .map(|(x, c)| (x - c).powi(2))
                .sum::<f64>()
        })
        .sum()
}

/// How far (L2 over all centroids) one more update step would move them.
fn centroid_shift(data: &Array2<f64>, centroids: &Array2<f64>, labels: &[usize]) -> f64 {
    let k = centroids.nrows();
    let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; k];
    for (point, &label) in data.rows().into_iter().zip(labels) {
        let mut slot = sums.row_mut(label);
        slot += &point;
        counts[label] += 1;
    }

    (0..k)
        .filter(|&j| counts[j] > 0)
        .map(|j| {
            let n = counts[j] as f64;
            sums.row(j)
                .iter()
                .zip(centroids.row(j))
                .map(|(s, c)| (s / n - c).powi(2))
                .sum::<f64>()
        })
        .sum::<f64>()
        .sqrt()
}
