//! DBSCAN: Density-Based Spatial Clustering of Applications with Noise.
//!
//! # The Algorithm (Ester et al., 1996)
//!
//! DBSCAN is a density-based clustering algorithm that groups points based on
//! neighborhood density. Unlike k-means, it:
//!
//! - Discovers clusters of arbitrary shape
//! - Automatically determines the number of clusters
//! - Identifies noise points (outliers)
//!
//! ## Core Concepts
//!
//! - **Epsilon (ε)**: Maximum distance between two points to be neighbors.
//! - **MinPts**: Minimum points within ε (the point itself included) to be "core".
//! - **Core point**: Has at least MinPts points within ε.
//! - **Border point**: Within ε of a core point but not core itself.
//! - **Noise point**: Neither core nor border. Labeled [`NOISE`].
//!
//! ## Algorithm Steps
//!
//! 1. Compute every point's ε-neighborhood and mark core points.
//! 2. Walk core points in ascending index order. Each one not yet visited seeds a
//!    new cluster, numbered from 0.
//! 3. Breadth-first expansion: pop a point, label it if unvisited, and if it is core
//!    enqueue its not-yet-seen neighbors. Border points join but never propagate.
//! 4. Whatever no expansion reached stays noise.
//!
//! A border point within reach of two clusters belongs to whichever was seeded first.
//!
//! ## Strategies
//!
//! How neighborhoods are produced depends only on the number of samples (see
//! [`Strategy::for_n_samples`]):
//!
//! | n | Strategy | Memory |
//! |---|----------|--------|
//! | < 2000 | [`Strategy::Pairwise`]: dense n×n squared-distance matrix | O(n²) |
//! | 2000..=10000 | [`Strategy::Precomputed`]: k-d tree, all neighborhoods up front | O(n·m) |
//! | > 10000 | [`Strategy::Batched`]: k-d tree, neighborhoods per batch of 1000 | O(batch·m) |
//!
//! (m = average neighborhood size.) The strategy is a performance detail: all three
//! produce identical labels and core sets, because every pair is classified by the
//! same squared-distance kernel (`‖x‖² + ‖y‖² − 2⟨x,y⟩`, clamped at zero, `≤ ε²`).
//!
//! ## When to Use
//!
//! - Clusters have non-convex shapes
//! - Number of clusters unknown
//! - Data has outliers
//! - Clusters have similar density
//!
//! ## Limitations
//!
//! - Struggles with varying densities (consider OPTICS)
//! - ε parameter is sensitive and dataset-dependent; see
//!   [`k_distances`](crate::cluster::k_distances)
//!
//! ## References
//!
//! Ester et al. (1996). "A Density-Based Algorithm for Discovering Clusters
//! in Large Spatial Databases with Noise." KDD-96.

use super::neighbors::{KdTree, NeighborIndex};
use super::traits::Clustering;
use super::util::{self, SquaredNorms};
use crate::error::{Error, Result};
use crate::observe::{FitEvent, FitObserver, LogObserver, Reporter, Verbosity};
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Label of points that belong to no cluster.
pub const NOISE: i32 = -1;

/// Points per batch for [`Strategy::Batched`].
pub(crate) const BATCH_SIZE: usize = 1000;

/// How DBSCAN computes neighborhoods. Chosen automatically from the sample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strategy {
    /// Dense pairwise squared-distance matrix.
    Pairwise,
    /// Spatial index; every neighborhood computed once, up front.
    Precomputed,
    /// Spatial index; neighborhoods computed per batch and evicted at batch boundaries.
    Batched,
}

impl Strategy {
    /// Inputs smaller than this use [`Strategy::Pairwise`].
    pub const PAIRWISE_BELOW: usize = 2000;
    /// Inputs up to and including this use [`Strategy::Precomputed`].
    pub const PRECOMPUTED_UP_TO: usize = 10_000;

    /// The strategy used for `n_samples` points.
    pub fn for_n_samples(n_samples: usize) -> Self {
        if n_samples < Self::PAIRWISE_BELOW {
            Strategy::Pairwise
        } else if n_samples <= Self::PRECOMPUTED_UP_TO {
            Strategy::Precomputed
        } else {
            Strategy::Batched
        }
    }
}

/// DBSCAN clustering algorithm.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dbscan {
    /// Epsilon: maximum distance for neighborhood.
    eps: f32,
    /// Minimum points (self included) for core point classification.
    min_samples: usize,
    /// Progress reporting level.
    #[cfg_attr(feature = "serde", serde(default))]
    verbosity: Verbosity,
}

/// Result of a DBSCAN fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DbscanFit {
    /// One label per input point: a cluster id in `0..n_clusters`, or [`NOISE`].
    pub labels: Vec<i32>,
    /// Indices of core points, ascending.
    pub core_sample_indices: Vec<usize>,
    /// Number of clusters found (noise excluded).
    pub n_clusters: usize,
    /// Number of points labeled [`NOISE`].
    pub n_noise: usize,
    /// Strategy that produced this fit.
    pub strategy: Strategy,
}

impl DbscanFit {
    /// Labels with noise as `None`.
    pub fn labels_with_noise(&self) -> Vec<Option<usize>> {
        self.labels
            .iter()
            .map(|&l| usize::try_from(l).ok())
            .collect()
    }
}

impl Dbscan {
    /// Create a new DBSCAN clusterer.
    ///
    /// # Arguments
    ///
    /// * `eps` - Maximum distance between two points to be neighbors.
    /// * `min_samples` - Minimum number of points (the point itself included) to form a
    ///   dense region.
    ///
    /// # Typical Values
    ///
    /// - `eps`: Often determined by k-distance plot (k = min_samples).
    /// - `min_samples`: 2 * dimension is a common heuristic.
    pub fn new(eps: f32, min_samples: usize) -> Self {
        Self {
            eps,
            min_samples,
            verbosity: Verbosity::Silent,
        }
    }

    /// Set epsilon (neighborhood radius).
    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Set minimum points for core classification.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Set how much the fit reports through its observer.
    pub fn with_verbosity(mut self, verbosity: impl Into<Verbosity>) -> Self {
        self.verbosity = verbosity.into();
        self
    }

    /// Neighborhood radius.
    pub fn eps(&self) -> f32 {
        self.eps
    }

    /// Core threshold (self included).
    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Reporting level.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Cluster `data`, reporting progress to the `log` facade.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<DbscanFit> {
        self.fit_with_observer(data, &LogObserver)
    }

    /// Cluster `data`, reporting progress to `observer`.
    pub fn fit_with_observer(
        &self,
        data: &[Vec<f32>],
        observer: &dyn FitObserver,
    ) -> Result<DbscanFit> {
        self.run(data, None, BATCH_SIZE, Reporter::new(self.verbosity, observer))
    }

    fn validate_params(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(Error::InvalidParameter {
                name: "eps",
                message: "must be positive and finite",
            });
        }
        if self.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Fit with an explicit strategy and batch size instead of the size-based policy.
    pub(crate) fn fit_with_strategy(
        &self,
        data: &[Vec<f32>],
        strategy: Strategy,
        batch_size: usize,
    ) -> Result<DbscanFit> {
        self.run(
            data,
            Some(strategy),
            batch_size,
            Reporter::new(Verbosity::Silent, &LogObserver),
        )
    }

    fn run(
        &self,
        data: &[Vec<f32>],
        strategy: Option<Strategy>,
        batch_size: usize,
        reporter: Reporter<'_>,
    ) -> Result<DbscanFit> {
        self.validate_params()?;
        let dim = util::validate_matrix(data)?;

        let n = data.len();
        let strategy = strategy.unwrap_or_else(|| Strategy::for_n_samples(n));
        reporter.emit(Verbosity::Summary, || FitEvent::DbscanStarted {
            n_samples: n,
            eps: self.eps,
            min_samples: self.min_samples,
        });
        reporter.emit(Verbosity::Summary, || FitEvent::StrategySelected { strategy });

        let norms = SquaredNorms::new(data);
        let eps_sq = f64::from(self.eps).powi(2);

        let (labels, core) = match strategy {
            Strategy::Pairwise => {
                let mut hoods = Lists(pairwise_neighborhoods(data, &norms, eps_sq));
                let core = self.core_mask(&hoods.0);
                reporter.emit(Verbosity::Progress, || FitEvent::CorePointsFound {
                    n_core: count(&core),
                });
                (expand_clusters(&core, &mut hoods, reporter), core)
            }
            Strategy::Precomputed => {
                let tree = KdTree::build(data)?;
                let query = RadiusQuery::new(data, &tree, &norms, eps_sq, dim);
                let mut hoods = Lists(query.all());
                let core = self.core_mask(&hoods.0);
                reporter.emit(Verbosity::Progress, || FitEvent::CorePointsFound {
                    n_core: count(&core),
                });
                (expand_clusters(&core, &mut hoods, reporter), core)
            }
            Strategy::Batched => {
                let tree = KdTree::build(data)?;
                let query = RadiusQuery::new(data, &tree, &norms, eps_sq, dim);
                let batch_size = batch_size.max(1);
                let core = self.core_mask_batched(&query, batch_size, reporter);
                reporter.emit(Verbosity::Progress, || FitEvent::CorePointsFound {
                    n_core: count(&core),
                });
                let mut hoods = Batched::new(&query, &core, batch_size);
                let labels = expand_clusters(&core, &mut hoods, reporter);
                log::trace!(
                    "batched dbscan: peak cache {} lists (batch size {})",
                    hoods.cache.peak(),
                    batch_size
                );
                (labels, core)
            }
        };

        let n_clusters = labels
            .iter()
            .copied()
            .max()
            .map_or(0, |max| usize::try_from(max + 1).unwrap_or(0));
        let n_noise = labels.iter().filter(|&&l| l == NOISE).count();
        reporter.emit(Verbosity::Summary, || FitEvent::DbscanFinished {
            n_clusters,
            n_noise,
        });

        Ok(DbscanFit {
            labels,
            core_sample_indices: (0..n).filter(|&i| core[i]).collect(),
            n_clusters,
            n_noise,
            strategy,
        })
    }

    fn core_mask(&self, hoods: &[Vec<usize>]) -> Vec<bool> {
        hoods.iter().map(|h| h.len() >= self.min_samples).collect()
    }

    /// Core flags computed batch by batch; each batch's neighborhoods are dropped as soon
    /// as they have been counted.
    fn core_mask_batched(
        &self,
        query: &RadiusQuery<'_>,
        batch_size: usize,
        reporter: Reporter<'_>,
    ) -> Vec<bool> {
        let n = query.data.len();
        let n_batches = n.div_ceil(batch_size);
        let mut core = Vec::with_capacity(n);
        for batch in 0..n_batches {
            let start = batch * batch_size;
            let end = (start + batch_size).min(n);
            core.extend(
                query
                    .batch(start, end)
                    .into_iter()
                    .map(|h| h.len() >= self.min_samples),
            );
            reporter.emit(Verbosity::Progress, || FitEvent::BatchProcessed {
                batch,
                n_batches,
            });
        }
        core
    }
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new(0.5, 4)
    }
}

impl Clustering for Dbscan {
    type Label = i32;

    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<i32>> {
        self.fit(data).map(|fit| fit.labels)
    }

    /// DBSCAN discovers clusters dynamically, so this returns 0.
    ///
    /// To get the actual number of clusters, see [`DbscanFit::n_clusters`].
    fn n_clusters(&self) -> usize {
        0
    }
}

fn count(flags: &[bool]) -> usize {
    flags.iter().filter(|&&f| f).count()
}

/// Neighborhoods from a dense pairwise matrix. Each row is ascending by index.
fn pairwise_neighborhoods(data: &[Vec<f32>], norms: &SquaredNorms, eps_sq: f64) -> Vec<Vec<usize>> {
    let n = data.len();
    let mut dist_sq = vec![0.0f64; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = norms.distance_sq(data, i, j);
            dist_sq[i * n + j] = d;
            dist_sq[j * n + i] = d;
        }
    }

    dist_sq
        .chunks_exact(n)
        .map(|row| {
            row.iter()
                .enumerate()
                .filter(|(_, &d)| d <= eps_sq)
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

/// ε-neighborhoods through a spatial index.
///
/// The index is asked for a slightly larger radius and every candidate is then confirmed
/// with the same kernel the pairwise strategy uses.
struct RadiusQuery<'a> {
    data: &'a [Vec<f32>],
    index: &'a KdTree<'a>,
    norms: &'a SquaredNorms,
    eps_sq: f64,
    search_radius: f32,
}

impl<'a> RadiusQuery<'a> {
    fn new(
        data: &'a [Vec<f32>],
        index: &'a KdTree<'a>,
        norms: &'a SquaredNorms,
        eps_sq: f64,
        dim: usize,
    ) -> Self {
        Self {
            data,
            index,
            norms,
            eps_sq,
            search_radius: norms.search_radius(eps_sq, dim),
        }
    }

    /// Neighbors of point `i` (itself included), ascending.
    fn neighbors_of(&self, i: usize) -> Vec<usize> {
        let mut hood = self.index.within_radius(&self.data[i], self.search_radius);
        hood.retain(|&j| self.norms.distance_sq(self.data, i, j) <= self.eps_sq);
        hood
    }

    fn all(&self) -> Vec<Vec<usize>> {
        self.batch(0, self.data.len())
    }

    /// The one bulk query; fanned out over rayon when `parallel` is enabled.
    fn batch(&self, start: usize, end: usize) -> Vec<Vec<usize>> {
        #[cfg(feature = "parallel")]
        {
            (start..end)
                .into_par_iter()
                .map(|i| self.neighbors_of(i))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            (start..end).map(|i| self.neighbors_of(i)).collect()
        }
    }
}

/// Neighborhood source for cluster expansion.
trait Neighborhoods {
    /// Called before core point `seed` starts a new cluster.
    fn begin_seed(&mut self, _seed: usize, _visited: &[bool]) {}

    /// Neighbors of core point `i`, ascending. Asked at most once per point.
    fn neighbors(&mut self, i: usize) -> Cow<'_, [usize]>;
}

/// Every neighborhood held in memory.
struct Lists(Vec<Vec<usize>>);

impl Neighborhoods for Lists {
    fn neighbors(&mut self, i: usize) -> Cow<'_, [usize]> {
        Cow::Borrowed(&self.0[i])
    }
}

/// Point-indexed neighborhood cache with a batch-scoped lifetime.
///
/// Holds at most one batch worth of lists; [`NeighborCache::evict`] clears it when the
/// seed walk crosses into the next batch.
#[derive(Debug, Default)]
pub(crate) struct NeighborCache {
    lists: HashMap<usize, Vec<usize>>,
    peak: usize,
}

impl NeighborCache {
    fn fill(&mut self, entries: impl IntoIterator<Item = (usize, Vec<usize>)>) {
        self.lists.extend(entries);
        self.peak = self.peak.max(self.lists.len());
    }

    fn take(&mut self, i: usize) -> Option<Vec<usize>> {
        self.lists.remove(&i)
    }

    fn evict(&mut self) {
        self.lists.clear();
    }

    /// Largest number of lists held at once.
    pub(crate) fn peak(&self) -> usize {
        self.peak
    }
}

/// Neighborhoods for the batched strategy.
///
/// When the seed walk enters batch `b`, the lists of every unvisited core point in that
/// batch are fetched in one bulk query and cached. Points reached by expansion outside the
/// current batch are queried on demand. Each list is consumed once and dropped.
struct Batched<'q, 'a> {
    query: &'q RadiusQuery<'a>,
    core: &'q [bool],
    batch_size: usize,
    current: Option<usize>,
    cache: NeighborCache,
}

impl<'q, 'a> Batched<'q, 'a> {
    fn new(query: &'q RadiusQuery<'a>, core: &'q [bool], batch_size: usize) -> Self {
        Self {
            query,
            core,
            batch_size,
            current: None,
            cache: NeighborCache::default(),
        }
    }
}

impl Neighborhoods for Batched<'_, '_> {
    fn begin_seed(&mut self, seed: usize, visited: &[bool]) {
        let batch = seed / self.batch_size;
        if self.current == Some(batch) {
            return;
        }
        self.cache.evict();
        self.current = Some(batch);

        let start = batch * self.batch_size;
        let end = (start + self.batch_size).min(self.core.len());
        let pending: Vec<usize> = (start..end)
            .filter(|&i| self.core[i] && !visited[i])
            .collect();
        let query = self.query;

        #[cfg(feature = "parallel")]
        let lists: Vec<(usize, Vec<usize>)> = pending
            .into_par_iter()
            .map(|i| (i, query.neighbors_of(i)))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let lists: Vec<(usize, Vec<usize>)> = pending
            .into_iter()
            .map(|i| (i, query.neighbors_of(i)))
            .collect();

        self.cache.fill(lists);
    }

    fn neighbors(&mut self, i: usize) -> Cow<'_, [usize]> {
        match self.cache.take(i) {
            Some(list) => Cow::Owned(list),
            None => Cow::Owned(self.query.neighbors_of(i)),
        }
    }
}

/// Breadth-first cluster growth shared by every strategy.
fn expand_clusters<N: Neighborhoods>(
    core: &[bool],
    hoods: &mut N,
    reporter: Reporter<'_>,
) -> Vec<i32> {
    let n = core.len();
    let progress = reporter.enabled(Verbosity::Progress);
    let n_core = if progress { count(core) } else { 0 };
    let mut labels = vec![NOISE; n];
    let mut visited = vec![false; n];
    // A point is enqueued at most once per fit: anything seen by an earlier cluster has
    // already been visited by the time that cluster's queue drains.
    let mut seen = vec![false; n];
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut cluster: i32 = 0;

    let core_points = (0..n).filter(|&i| core[i]);
    for (processed, seed) in core_points.enumerate() {
        if visited[seed] {
            continue;
        }
        if progress && processed % 100 == 0 {
            reporter.emit(Verbosity::Progress, || FitEvent::ExpansionProgress {
                processed,
                n_core,
                cluster: cluster as usize,
            });
        }

        hoods.begin_seed(seed, &visited);
        visited[seed] = true;
        seen[seed] = true;
        labels[seed] = cluster;
        enqueue_unseen(&hoods.neighbors(seed), &mut seen, &mut queue);

        while let Some(j) = queue.pop_front() {
            if visited[j] {
                continue;
            }
            visited[j] = true;
            labels[j] = cluster;
            if core[j] {
                enqueue_unseen(&hoods.neighbors(j), &mut seen, &mut queue);
            }
        }

        cluster += 1;
    }

    labels
}

#[inline]
fn enqueue_unseen(neighbors: &[usize], seen: &mut [bool], queue: &mut VecDeque<usize>) {
    for &m in neighbors {
        if !seen[m] {
            seen[m] = true;
            queue.push_back(m);
        }
    }
}

#[cfg(test)]
#[allow(clippy::needless_range_loop)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::{prop, prop_assert, prop_assert_eq, proptest, ProptestConfig};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::sync::Mutex;

    const ALL: [Strategy; 3] = [Strategy::Pairwise, Strategy::Precomputed, Strategy::Batched];

    fn blobs(n_per: usize, centers: &[(f32, f32)], spread: f32, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = Vec::new();
        for &(cx, cy) in centers {
            for _ in 0..n_per {
                data.push(vec![
                    cx + (rng.random::<f32>() - 0.5) * spread,
                    cy + (rng.random::<f32>() - 0.5) * spread,
                ]);
            }
        }
        data.shuffle(&mut rng);
        data
    }

    #[test]
    fn test_dbscan_square_and_outlier() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![10.0, 10.0],
        ];
        let fit = Dbscan::new(1.5, 2).fit(&data).unwrap();
        assert_eq!(fit.labels, vec![0, 0, 0, -1]);
        assert_eq!(fit.core_sample_indices, vec![0, 1, 2]);
        assert_eq!(fit.n_clusters, 1);
        assert_eq!(fit.n_noise, 1);
        assert_eq!(fit.strategy, Strategy::Pairwise);
        assert_eq!(
            fit.labels_with_noise(),
            vec![Some(0), Some(0), Some(0), None]
        );
    }

    #[test]
    fn test_dbscan_two_clusters() {
        let data = vec![
            // Cluster 1: around (0, 0)
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![0.1, 0.1],
            vec![0.05, 0.05],
            // Cluster 2: around (5, 5)
            vec![5.0, 5.0],
            vec![5.1, 5.0],
            vec![5.0, 5.1],
            vec![5.1, 5.1],
            vec![5.05, 5.05],
        ];

        let labels = Dbscan::new(0.3, 3).fit_predict(&data).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_dbscan_all_noise() {
        let data = vec![
            vec![0.0, 0.0],
            vec![10.0, 0.0],
            vec![0.0, 10.0],
            vec![10.0, 10.0],
        ];

        let fit = Dbscan::new(0.5, 3).fit(&data).unwrap();
        assert!(fit.labels.iter().all(|&l| l == NOISE));
        assert!(fit.core_sample_indices.is_empty());
        assert_eq!(fit.n_clusters, 0);
        assert_eq!(fit.n_noise, 4);
    }

    #[test]
    fn test_dbscan_min_samples_one_makes_every_point_core() {
        let data = vec![vec![0.0], vec![5.0], vec![10.0]];
        let fit = Dbscan::new(1.0, 1).fit(&data).unwrap();
        assert_eq!(fit.labels, vec![0, 1, 2]);
        assert_eq!(fit.core_sample_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_dbscan_border_point_does_not_propagate() {
        // Only point 2 is core; 3 is its border and 4 only touches 3.
        let data = vec![vec![0.0], vec![0.5], vec![1.0], vec![2.0], vec![3.0]];
        let fit = Dbscan::new(1.0, 4).fit(&data).unwrap();
        assert_eq!(fit.core_sample_indices, vec![2]);
        assert_eq!(fit.labels, vec![0, 0, 0, 0, NOISE]);
    }

    #[test]
    fn test_dbscan_shared_border_goes_to_first_cluster() {
        // Point 3 is within reach of both cores (2 and 4) but core of neither.
        let data = vec![
            vec![0.0],
            vec![0.5],
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![3.5],
            vec![4.0],
        ];
        let fit = Dbscan::new(1.0, 4).fit(&data).unwrap();
        assert_eq!(fit.core_sample_indices, vec![2, 4]);
        assert_eq!(fit.labels, vec![0, 0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_dbscan_chain() {
        let data: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32 * 0.3, 0.0]).collect();
        let labels = Dbscan::new(0.5, 2).fit_predict(&data).unwrap();
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_dbscan_boundary_is_inclusive() {
        let data = vec![vec![0.0, 0.0], vec![3.0, 4.0]];
        for strategy in ALL {
            let fit = Dbscan::new(5.0, 2)
                .fit_with_strategy(&data, strategy, 1)
                .unwrap();
            assert_eq!(fit.labels, vec![0, 0], "{strategy:?}");
        }
    }

    #[test]
    fn test_dbscan_invalid_params() {
        let data = vec![vec![0.0, 0.0]];
        for eps in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = Dbscan::new(eps, 3).fit(&data).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        let err = Dbscan::new(0.5, 0).fit(&data).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1"
            }
        );
    }

    #[test]
    fn test_dbscan_params_checked_before_matrix() {
        let empty: Vec<Vec<f32>> = vec![];
        let err = Dbscan::new(-1.0, 3).fit(&empty).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_dbscan_invalid_input() {
        let dbscan = Dbscan::new(0.5, 2);
        let empty: Vec<Vec<f32>> = vec![];
        assert_eq!(dbscan.fit(&empty).unwrap_err(), Error::EmptyInput);
        assert_eq!(
            dbscan.fit(&[vec![], vec![]]).unwrap_err(),
            Error::ZeroDimension
        );
        assert_eq!(
            dbscan.fit(&[vec![0.0, 1.0], vec![0.0]]).unwrap_err(),
            Error::DimensionMismatch {
                row: 1,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            dbscan
                .fit(&[vec![0.0, 1.0], vec![0.0, f32::INFINITY]])
                .unwrap_err(),
            Error::NonFinite { row: 1, col: 1 }
        );
    }

    #[test]
    fn test_strategy_policy() {
        assert_eq!(Strategy::for_n_samples(1), Strategy::Pairwise);
        assert_eq!(Strategy::for_n_samples(1999), Strategy::Pairwise);
        assert_eq!(Strategy::for_n_samples(2000), Strategy::Precomputed);
        assert_eq!(Strategy::for_n_samples(10_000), Strategy::Precomputed);
        assert_eq!(Strategy::for_n_samples(10_001), Strategy::Batched);
    }

    #[test]
    fn test_strategies_agree_on_blobs() {
        let mut data = blobs(60, &[(0.0, 0.0), (4.0, 4.0), (8.0, 0.0)], 1.5, 3);
        data.push(vec![20.0, 20.0]);
        let dbscan = Dbscan::new(0.4, 4);

        let reference = dbscan
            .fit_with_strategy(&data, Strategy::Pairwise, BATCH_SIZE)
            .unwrap();
        assert!(reference.n_clusters >= 3);
        for strategy in [Strategy::Precomputed, Strategy::Batched] {
            for batch_size in [1, 7, 50, BATCH_SIZE] {
                let fit = dbscan.fit_with_strategy(&data, strategy, batch_size).unwrap();
                assert_eq!(fit.labels, reference.labels, "{strategy:?}/{batch_size}");
                assert_eq!(fit.core_sample_indices, reference.core_sample_indices);
                assert_eq!(fit.n_clusters, reference.n_clusters);
            }
        }
    }

    #[test]
    fn test_strategies_agree_far_from_origin() {
        // Large coordinates stress the norm-expansion kernel.
        let data: Vec<Vec<f32>> = (0..200)
            .map(|i| vec![1000.0 + (i % 20) as f32 * 0.25, 1000.0 + (i / 20) as f32 * 0.25])
            .collect();
        let dbscan = Dbscan::new(0.25, 5);
        let reference = dbscan
            .fit_with_strategy(&data, Strategy::Pairwise, BATCH_SIZE)
            .unwrap();
        for strategy in [Strategy::Precomputed, Strategy::Batched] {
            let fit = dbscan.fit_with_strategy(&data, strategy, 16).unwrap();
            assert_eq!(fit, DbscanFit { strategy, ..reference.clone() });
        }
    }

    #[test]
    fn test_strategies_agree_on_tiny_coordinates() {
        // Squared distances here are subnormal in f32.
        let a = 2.898e-23f32;
        let data = vec![vec![0.0, 0.0], vec![a, a]];
        let dbscan = Dbscan::new(4.0988e-23, 2);
        for strategy in ALL {
            for batch_size in [1, BATCH_SIZE] {
                let fit = dbscan.fit_with_strategy(&data, strategy, batch_size).unwrap();
                assert_eq!(fit.labels, vec![0, 0], "{strategy:?}/{batch_size}");
                assert_eq!(fit.core_sample_indices, vec![0, 1]);
            }
        }
    }

    #[test]
    fn test_strategies_agree_on_subnormal_eps() {
        let tiny = f32::from_bits(3);
        let data = vec![vec![0.0], vec![tiny], vec![f32::from_bits(40)]];
        let dbscan = Dbscan::new(tiny, 2);
        let reference = dbscan
            .fit_with_strategy(&data, Strategy::Pairwise, BATCH_SIZE)
            .unwrap();
        assert_eq!(reference.labels, vec![0, 0, NOISE]);
        for strategy in [Strategy::Precomputed, Strategy::Batched] {
            let fit = dbscan.fit_with_strategy(&data, strategy, 2).unwrap();
            assert_eq!(fit.labels, reference.labels, "{strategy:?}");
        }
    }

    #[test]
    fn test_batched_cache_bounded_by_batch() {
        let data = blobs(100, &[(0.0, 0.0), (5.0, 5.0)], 1.0, 9);
        let norms = SquaredNorms::new(&data);
        let tree = KdTree::build(&data).unwrap();
        let query = RadiusQuery::new(&data, &tree, &norms, 0.09, 2);
        let core: Vec<bool> = query.all().iter().map(|h| h.len() >= 3).collect();

        let mut hoods = Batched::new(&query, &core, 25);
        let reporter = Reporter::new(Verbosity::Silent, &LogObserver);
        let labels = expand_clusters(&core, &mut hoods, reporter);

        assert!(hoods.cache.peak() <= 25);
        let mut lists = Lists(query.all());
        assert_eq!(labels, expand_clusters(&core, &mut lists, reporter));
    }

    #[test]
    fn test_every_cluster_has_a_core_point() {
        let data = blobs(40, &[(0.0, 0.0), (3.0, 0.0), (0.0, 3.0)], 2.0, 21);
        let fit = Dbscan::new(0.35, 5).fit(&data).unwrap();
        for c in 0..fit.n_clusters as i32 {
            assert!(
                fit.core_sample_indices.iter().any(|&i| fit.labels[i] == c),
                "cluster {c} has no core point"
            );
        }
        for &l in &fit.labels {
            assert!(l == NOISE || (0..fit.n_clusters as i32).contains(&l));
        }
    }

    #[test]
    fn test_observer_sees_summary() {
        let data = vec![vec![0.0], vec![0.1], vec![9.0]];
        let events = Mutex::new(Vec::new());
        let sink = |e: &FitEvent| events.lock().unwrap().push(e.clone());
        Dbscan::new(0.5, 2)
            .with_verbosity(1u8)
            .fit_with_observer(&data, &sink)
            .unwrap();

        let events = events.into_inner().unwrap();
        assert_eq!(
            events,
            vec![
                FitEvent::DbscanStarted {
                    n_samples: 3,
                    eps: 0.5,
                    min_samples: 2
                },
                FitEvent::StrategySelected {
                    strategy: Strategy::Pairwise
                },
                FitEvent::DbscanFinished {
                    n_clusters: 1,
                    n_noise: 1
                },
            ]
        );
    }

    #[test]
    fn test_progress_reports_expansion() {
        let data: Vec<Vec<f32>> = (0..250).map(|i| vec![i as f32 * 0.1]).collect();
        let events = Mutex::new(Vec::new());
        let sink = |e: &FitEvent| events.lock().unwrap().push(e.clone());
        Dbscan::new(0.15, 2)
            .with_verbosity(Verbosity::Progress)
            .fit_with_observer(&data, &sink)
            .unwrap();

        let events = events.into_inner().unwrap();
        let expansion: Vec<&FitEvent> = events
            .iter()
            .filter(|e| matches!(e, FitEvent::ExpansionProgress { .. }))
            .collect();
        assert_eq!(
            expansion,
            vec![&FitEvent::ExpansionProgress {
                processed: 0,
                n_core: 250,
                cluster: 0
            }]
        );
    }

    #[test]
    fn test_verbosity_does_not_change_result() {
        let data = blobs(30, &[(0.0, 0.0), (3.0, 3.0)], 1.0, 5);
        let quiet = Dbscan::new(0.3, 3).fit(&data).unwrap();
        let loud = Dbscan::new(0.3, 3)
            .with_verbosity(Verbosity::Progress)
            .fit_with_observer(&data, &|_: &FitEvent| {})
            .unwrap();
        assert_eq!(quiet, loud);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_strategies_identical(
            data in prop::collection::vec(prop::collection::vec(-5.0f32..5.0, 2), 1..80),
            eps in 0.1f32..2.0,
            min_samples in 1usize..6,
            batch_size in 1usize..20,
        ) {
            let dbscan = Dbscan::new(eps, min_samples);
            let a = dbscan.fit_with_strategy(&data, Strategy::Pairwise, batch_size).unwrap();
            let b = dbscan.fit_with_strategy(&data, Strategy::Precomputed, batch_size).unwrap();
            let c = dbscan.fit_with_strategy(&data, Strategy::Batched, batch_size).unwrap();
            prop_assert_eq!(&a.labels, &b.labels);
            prop_assert_eq!(&a.labels, &c.labels);
            prop_assert_eq!(&a.core_sample_indices, &b.core_sample_indices);
            prop_assert_eq!(&a.core_sample_indices, &c.core_sample_indices);
        }

        #[test]
        fn prop_labels_contiguous(
            data in prop::collection::vec(prop::collection::vec(-5.0f32..5.0, 3), 1..60),
            eps in 0.2f32..3.0,
            min_samples in 1usize..5,
        ) {
            let fit = Dbscan::new(eps, min_samples).fit(&data).unwrap();
            prop_assert_eq!(fit.labels.len(), data.len());
            for c in 0..fit.n_clusters as i32 {
                prop_assert!(fit.labels.contains(&c));
            }
            for &i in &fit.core_sample_indices {
                prop_assert!(fit.labels[i] != NOISE);
            }
        }
    }
}
