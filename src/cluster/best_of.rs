//! Best-of-R k-means restarts.
//!
//! k-means++ seeding is random, so two fits of the same data can settle in different
//! local optima. [`BestOfKmeans`] runs the fit `R` times with seeds
//! `base, base + 1, …, base + R − 1` and keeps the run with the lowest inertia, reporting
//! every run's inertia alongside so the spread can be inspected.
//!
//! Runs share the input read-only and own everything else, so with the `parallel` feature
//! they execute on the rayon pool. The outcome does not depend on scheduling: ties in
//! inertia go to the lowest run index.

use super::kmeans::{Kmeans, KmeansFit};
use crate::error::{Error, Result};
use crate::observe::{FitEvent, FitObserver, LogObserver, Reporter, Verbosity};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const RUN_COUNT_ERROR: Error = Error::InvalidParameter {
    name: "run_count",
    message: "must be at least 1",
};

/// Repeated k-means with best-inertia selection.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BestOfKmeans {
    kmeans: Kmeans,
    n_runs: usize,
    base_seed: Option<u64>,
    #[cfg_attr(feature = "serde", serde(default))]
    verbosity: Verbosity,
}

/// Outcome of [`BestOfKmeans::fit`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BestOfFit {
    /// The lowest-inertia run.
    pub best: KmeansFit,
    /// Index of that run in `0..n_runs`.
    pub best_run: usize,
    /// Inertia of every run, in run order.
    pub inertias: Vec<f64>,
}

impl BestOfFit {
    /// Inertia of the winning run.
    pub fn best_inertia(&self) -> f64 {
        self.best.inertia
    }
}

impl BestOfKmeans {
    /// Run `kmeans` `n_runs` times. Defaults to base seed 42.
    ///
    /// The seed configured on `kmeans` itself is ignored; each run gets its own.
    pub fn new(kmeans: Kmeans, n_runs: usize) -> Self {
        Self {
            kmeans,
            n_runs,
            base_seed: Some(42),
            verbosity: Verbosity::Silent,
        }
    }

    /// Seed of the first run; run `r` uses `base_seed + r`.
    pub fn with_base_seed(mut self, base_seed: u64) -> Self {
        self.base_seed = Some(base_seed);
        self
    }

    /// Seed every run from OS entropy. Results are then not reproducible.
    pub fn with_entropy(mut self) -> Self {
        self.base_seed = None;
        self
    }

    /// Set how much the restarts report. Individual runs are always silent.
    pub fn with_verbosity(mut self, verbosity: impl Into<Verbosity>) -> Self {
        self.verbosity = verbosity.into();
        self
    }

    /// Number of runs.
    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    /// Base seed, if any.
    pub fn base_seed(&self) -> Option<u64> {
        self.base_seed
    }

    /// Run all restarts and keep the best, reporting to the `log` facade.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<BestOfFit> {
        self.fit_with_observer(data, &LogObserver)
    }

    /// Run all restarts and keep the best, reporting to `observer`.
    pub fn fit_with_observer(
        &self,
        data: &[Vec<f32>],
        observer: &dyn FitObserver,
    ) -> Result<BestOfFit> {
        if self.n_runs == 0 {
            return Err(RUN_COUNT_ERROR);
        }
        let reporter = Reporter::new(self.verbosity, observer);
        let runs = self.run_all(data, reporter)?;

        let inertias: Vec<f64> = runs.iter().map(|fit| fit.inertia).collect();
        let (best_run, best) = runs
            .into_iter()
            .enumerate()
            .reduce(|best, run| if run.1.inertia < best.1.inertia { run } else { best })
            .ok_or(RUN_COUNT_ERROR)?;

        reporter.emit(Verbosity::Summary, || FitEvent::BestOfFinished {
            best_run,
            best_inertia: best.inertia,
        });

        Ok(BestOfFit {
            best,
            best_run,
            inertias,
        })
    }

    fn run_seed(&self, run: usize) -> Option<u64> {
        self.base_seed.map(|base| base.wrapping_add(run as u64))
    }

    fn run_one(&self, data: &[Vec<f32>], run: usize, reporter: Reporter<'_>) -> Result<KmeansFit> {
        let fit = self
            .kmeans
            .for_run(self.run_seed(run))
            .fit_model(data, &LogObserver)?;
        reporter.emit(Verbosity::Progress, || FitEvent::RunFinished {
            run,
            n_runs: self.n_runs,
            inertia: fit.inertia,
        });
        Ok(fit)
    }

    fn run_all(&self, data: &[Vec<f32>], reporter: Reporter<'_>) -> Result<Vec<KmeansFit>> {
        #[cfg(feature = "parallel")]
        {
            (0..self.n_runs)
                .into_par_iter()
                .map(|run| self.run_one(data, run, reporter))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            (0..self.n_runs)
                .map(|run| self.run_one(data, run, reporter))
                .collect()
        }
    }
}

impl Default for BestOfKmeans {
    fn default() -> Self {
        Self::new(Kmeans::default(), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Mutex;

    fn three_blobs() -> Vec<Vec<f32>> {
        let mut data = Vec::new();
        for (cx, cy) in [(0.0f32, 0.0f32), (6.0, 0.0), (3.0, 5.0)] {
            for i in 0..12 {
                let a = i as f32 * 0.5;
                data.push(vec![cx + a.cos() * 0.4, cy + a.sin() * 0.4]);
            }
        }
        data
    }

    #[test]
    fn best_is_minimum_of_runs() {
        let data = three_blobs();
        let fit = BestOfKmeans::new(Kmeans::new(3), 6)
            .with_base_seed(100)
            .fit(&data)
            .unwrap();

        assert_eq!(fit.inertias.len(), 6);
        let min = fit.inertias.iter().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(fit.best_inertia(), min);
        assert_eq!(fit.inertias[fit.best_run], min);
        for &inertia in &fit.inertias {
            assert!(fit.best_inertia() <= inertia);
        }
    }

    #[test]
    fn runs_use_consecutive_seeds() {
        let data = three_blobs();
        let fit = BestOfKmeans::new(Kmeans::new(3), 4)
            .with_base_seed(7)
            .fit(&data)
            .unwrap();

        for run in 0..4 {
            let single = Kmeans::new(3)
                .with_seed(7 + run as u64)
                .fit_model(&data, &LogObserver)
                .unwrap();
            assert_eq!(single.inertia, fit.inertias[run]);
        }
        let winner = Kmeans::new(3)
            .with_seed(7 + fit.best_run as u64)
            .fit_model(&data, &LogObserver)
            .unwrap();
        assert_eq!(winner, fit.best);
    }

    #[test]
    fn reproducible_with_base_seed() {
        let data = three_blobs();
        let model = BestOfKmeans::new(Kmeans::new(3), 5).with_base_seed(1);
        assert_eq!(model.fit(&data).unwrap(), model.fit(&data).unwrap());
    }

    #[test]
    fn ties_go_to_first_run() {
        // Every run converges to the same partition, so every inertia is equal.
        let data = vec![vec![0.0], vec![0.0], vec![10.0], vec![10.0]];
        let fit = BestOfKmeans::new(Kmeans::new(2), 3).fit(&data).unwrap();
        assert_eq!(fit.inertias, vec![0.0, 0.0, 0.0]);
        assert_eq!(fit.best_run, 0);
    }

    #[test]
    fn zero_runs_rejected() {
        let err = BestOfKmeans::new(Kmeans::new(1), 0)
            .fit(&[vec![1.0]])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn run_errors_propagate() {
        let err = BestOfKmeans::new(Kmeans::new(3), 2)
            .fit(&[vec![1.0]])
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidClusterCount {
                requested: 3,
                n_items: 1
            }
        );
    }

    #[test]
    fn reports_each_run() {
        let data = three_blobs();
        let events = Mutex::new(Vec::new());
        let sink = |e: &FitEvent| events.lock().unwrap().push(e.clone());
        let fit = BestOfKmeans::new(Kmeans::new(3), 3)
            .with_verbosity(Verbosity::Progress)
            .fit_with_observer(&data, &sink)
            .unwrap();

        let events = events.into_inner().unwrap();
        let mut runs: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                FitEvent::RunFinished { run, .. } => Some(*run),
                _ => None,
            })
            .collect();
        runs.sort_unstable();
        assert_eq!(runs, vec![0, 1, 2]);
        assert_eq!(
            events.last(),
            Some(&FitEvent::BestOfFinished {
                best_run: fit.best_run,
                best_inertia: fit.best_inertia()
            })
        );
    }
}
