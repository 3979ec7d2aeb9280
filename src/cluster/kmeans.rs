//! K-means clustering.
//!
//! Partitions data into k clusters by minimizing **within-cluster sum of squares**
//! (WCSS, reported as *inertia*). The foundational clustering algorithm, dating to
//! 1957 (Lloyd).
//!
//! # The Objective
//!
//! ```text
//! WCSS = Σₖ Σᵢ∈Cₖ ||xᵢ - μₖ||²
//! ```
//!
//! # Lloyd's Algorithm
//!
//! 1. Initialize k centroids via k-means++
//! 2. **Assign**: each point → nearest centroid (ties go to the lowest centroid index)
//! 3. **Update**: each centroid → mean of its points; an empty cluster is reseeded to a
//!    uniformly random sample
//! 4. Stop once no centroid moved more than `tol` (Euclidean), or after `max_iter` rounds
//!
//! Running out of iterations is not an error; [`KmeansFit::converged`] says which
//! happened.
//!
//! ## K-means++ Initialization
//!
//! 1. Choose the first centroid uniformly at random
//! 2. Choose each next centroid with probability proportional to D(x)², the squared
//!    distance to the nearest centroid chosen so far. If every D(x)² is zero (all
//!    remaining points coincide with a centroid), fall back to a uniform choice.
//!
//! Provides provable O(log k) approximation to optimal WCSS, but individual runs still
//! land in different local optima; see [`BestOfKmeans`](super::BestOfKmeans).
//!
//! # Determinism
//!
//! With a seed, a fit is a pure function of (data, parameters, seed): the same inputs
//! reproduce the same centroids, labels and inertia bit for bit.

use super::traits::Clustering;
use super::util::{self, squared_distance};
use crate::error::{Error, Result};
use crate::observe::{FitEvent, FitObserver, LogObserver, Reporter, Verbosity};
use rand::distr::weighted::WeightedIndex;
use rand::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// K-means clustering algorithm.
///
/// Holds the configuration and, after a successful [`Kmeans::fit`], the fitted model
/// used by [`Kmeans::predict`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum iterations.
    max_iter: usize,
    /// Convergence tolerance on the largest centroid shift.
    tol: f64,
    /// Random seed.
    seed: Option<u64>,
    /// Progress reporting level.
    #[cfg_attr(feature = "serde", serde(default))]
    verbosity: Verbosity,
    /// Last successful fit.
    #[cfg_attr(feature = "serde", serde(skip))]
    fitted: Option<KmeansFit>,
}

/// A fitted k-means model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KmeansFit {
    /// Final centroids, `k` rows of the input dimensionality.
    pub centroids: Vec<Vec<f32>>,
    /// Cluster index in `0..k` for every training point.
    pub labels: Vec<usize>,
    /// Sum of squared distances from each training point to its assigned centroid.
    pub inertia: f64,
    /// Assign/update rounds performed.
    pub n_iter: usize,
    /// Whether the shift tolerance was met before `max_iter` ran out.
    pub converged: bool,
}

impl KmeansFit {
    /// Number of clusters.
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Assign each row of `data` to its nearest centroid.
    pub fn predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        let d = util::validate_matrix(data)?;
        let expected = self.centroids.first().map_or(0, Vec::len);
        if d != expected {
            return Err(Error::DimensionMismatch {
                row: 0,
                expected,
                found: d,
            });
        }
        let mut labels = vec![0; data.len()];
        assign(data, &self.centroids, &mut labels);
        Ok(labels)
    }
}

impl Kmeans {
    /// Create a new K-means clusterer.
    ///
    /// Defaults: `max_iter = 300`, `tol = 1e-4`, no seed.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            tol: 1e-4,
            seed: None,
            verbosity: Verbosity::Silent,
            fitted: None,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set how much the fit reports through its observer.
    pub fn with_verbosity(mut self, verbosity: impl Into<Verbosity>) -> Self {
        self.verbosity = verbosity.into();
        self
    }

    /// Configured number of clusters.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Configured iteration cap.
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Configured shift tolerance.
    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Configured seed, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Reporting level.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// The model from the last successful [`Kmeans::fit`].
    pub fn fitted(&self) -> Option<&KmeansFit> {
        self.fitted.as_ref()
    }

    /// Fit to `data` and keep the result for [`Kmeans::predict`].
    ///
    /// On error the previously fitted model, if any, is left untouched.
    pub fn fit(&mut self, data: &[Vec<f32>]) -> Result<&KmeansFit> {
        self.fit_with_observer(data, &LogObserver)
    }

    /// [`Kmeans::fit`], reporting progress to `observer`.
    pub fn fit_with_observer(
        &mut self,
        data: &[Vec<f32>],
        observer: &dyn FitObserver,
    ) -> Result<&KmeansFit> {
        let fit = self.fit_model(data, observer)?;
        Ok(&*self.fitted.insert(fit))
    }

    /// Assign rows of `data` to the centroids of the last successful fit.
    pub fn predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        self.fitted.as_ref().ok_or(Error::NotFitted)?.predict(data)
    }

    /// Fit to `data` without touching this instance's stored model.
    pub fn fit_model(&self, data: &[Vec<f32>], observer: &dyn FitObserver) -> Result<KmeansFit> {
        self.validate_params()?;
        util::validate_matrix(data)?;
        let n = data.len();
        if self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }

        let reporter = Reporter::new(self.verbosity, observer);
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let mut centroids = init_centroids(data, self.k, &mut rng);
        let mut labels = vec![0usize; n];
        let mut n_iter = self.max_iter;
        let mut converged = false;

        for iteration in 1..=self.max_iter {
            assign(data, &centroids, &mut labels);
            let new_centroids = update(data, &labels, self.k, &mut rng);

            let max_shift = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| euclidean(a, b))
                .fold(0.0, f64::max);
            centroids = new_centroids;

            reporter.emit(Verbosity::Progress, || FitEvent::KmeansIteration {
                iteration,
                max_shift: max_shift as f32,
            });

            if max_shift <= self.tol {
                n_iter = iteration;
                converged = true;
                break;
            }
        }

        let inertia = inertia(data, &labels, &centroids);
        reporter.emit(Verbosity::Summary, || FitEvent::KmeansFinished {
            iterations: n_iter,
            converged,
            inertia,
        });

        Ok(KmeansFit {
            centroids,
            labels,
            inertia,
            n_iter,
            converged,
        })
    }

    fn validate_params(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be at least 1",
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iterations",
                message: "must be at least 1",
            });
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "tolerance",
                message: "must be finite and non-negative",
            });
        }
        Ok(())
    }

    /// Same configuration with a different seed, verbosity off and no fitted state.
    pub(crate) fn for_run(&self, seed: Option<u64>) -> Self {
        Self {
            k: self.k,
            max_iter: self.max_iter,
            tol: self.tol,
            seed,
            verbosity: Verbosity::Silent,
            fitted: None,
        }
    }
}

impl Default for Kmeans {
    fn default() -> Self {
        Self::new(8)
    }
}

impl Clustering for Kmeans {
    type Label = usize;

    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        self.fit_model(data, &LogObserver).map(|fit| fit.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

#[inline]
fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// k-means++ seeding.
fn init_centroids(data: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = data.len();
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(data[rng.random_range(0..n)].clone());

    let mut closest: Vec<f64> = data
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    for _ in 1..k {
        // `WeightedIndex` rejects an all-zero weight vector.
        let next = match WeightedIndex::new(&closest) {
            Ok(weighted) => weighted.sample(rng),
            Err(_) => rng.random_range(0..n),
        };
        let chosen = data[next].clone();
        for (d, p) in closest.iter_mut().zip(data) {
            *d = d.min(squared_distance(p, &chosen));
        }
        centroids.push(chosen);
    }

    centroids
}

/// Nearest-centroid assignment; ties go to the lowest centroid index.
fn assign(data: &[Vec<f32>], centroids: &[Vec<f32>], labels: &mut [usize]) {
    for (point, label) in data.iter().zip(labels.iter_mut()) {
        let mut best_cluster = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in centroids.iter().enumerate() {
            let dist = squared_distance(point, centroid);
            if dist < best_dist {
                best_dist = dist;
                best_cluster = c;
            }
        }
        *label = best_cluster;
    }
}

/// Componentwise means of each cluster; empty clusters are reseeded from a random sample.
fn update(data: &[Vec<f32>], labels: &[usize], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let d = data[0].len();
    let mut sums = vec![vec![0.0f64; d]; k];
    let mut counts = vec![0usize; k];

    for (point, &label) in data.iter().zip(labels) {
        for (s, &x) in sums[label].iter_mut().zip(point) {
            *s += f64::from(x);
        }
        counts[label] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(c, (sum, count))| {
            if count > 0 {
                sum.into_iter().map(|s| (s / count as f64) as f32).collect()
            } else {
                let idx = rng.random_range(0..data.len());
                log::trace!("k-means: cluster {c} empty, reseeded from sample {idx}");
                data[idx].clone()
            }
        })
        .collect()
}

fn inertia(data: &[Vec<f32>], labels: &[usize], centroids: &[Vec<f32>]) -> f64 {
    data.iter()
        .zip(labels)
        .map(|(p, &l)| squared_distance(p, &centroids[l]))
        .sum()
}
