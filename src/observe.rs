//! Progress reporting for long-running fits.
//!
//! Algorithms never print. They describe what they are doing as [`FitEvent`]s and hand
//! them to a [`FitObserver`], filtered by the configured [`Verbosity`]. The default
//! observer, [`LogObserver`], forwards events to the `log` facade, so a binary decides
//! where (and whether) they show up by installing a logger.
//!
//! ```rust
//! use kluster::{Dbscan, FitEvent, Verbosity};
//! use std::sync::Mutex;
//!
//! let data = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![5.0, 5.0]];
//! let seen = Mutex::new(Vec::new());
//! let fit = Dbscan::new(1.5, 2)
//!     .with_verbosity(Verbosity::Summary)
//!     .fit_with_observer(&data, &|e: &FitEvent| seen.lock().unwrap().push(e.clone()))
//!     .unwrap();
//! assert_eq!(fit.n_clusters, 1);
//! assert!(!seen.lock().unwrap().is_empty());
//! ```

use crate::cluster::Strategy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How much a fit reports about itself.
///
/// Diagnostic only: verbosity never changes a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Verbosity {
    /// No events.
    #[default]
    Silent,
    /// Start, strategy and final summary.
    Summary,
    /// Summary plus per-step progress.
    Progress,
}

impl From<u8> for Verbosity {
    fn from(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Summary,
            _ => Verbosity::Progress,
        }
    }
}

/// Something that happened during a fit.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FitEvent {
    /// A DBSCAN fit began.
    DbscanStarted {
        /// Number of samples.
        n_samples: usize,
        /// Neighborhood radius.
        eps: f32,
        /// Core threshold (self included).
        min_samples: usize,
    },
    /// The execution strategy chosen for this input size.
    StrategySelected {
        /// Chosen strategy.
        strategy: Strategy,
    },
    /// Neighborhoods computed and core points identified.
    CorePointsFound {
        /// Number of core points.
        n_core: usize,
    },
    /// One batch of neighborhoods computed (batched strategy).
    BatchProcessed {
        /// Zero-based batch index.
        batch: usize,
        /// Total number of batches.
        n_batches: usize,
    },
    /// Expansion progress over the core points (reported every 100 core points).
    ExpansionProgress {
        /// Core points examined so far.
        processed: usize,
        /// Total core points.
        n_core: usize,
        /// Cluster currently being grown.
        cluster: usize,
    },
    /// A DBSCAN fit completed.
    DbscanFinished {
        /// Number of clusters found.
        n_clusters: usize,
        /// Number of noise points.
        n_noise: usize,
    },
    /// One assign/update round of k-means completed.
    KmeansIteration {
        /// One-based iteration number.
        iteration: usize,
        /// Largest centroid displacement in this round.
        max_shift: f32,
    },
    /// A k-means fit completed.
    KmeansFinished {
        /// Iterations used.
        iterations: usize,
        /// Whether the shift tolerance was met.
        converged: bool,
        /// Final inertia.
        inertia: f64,
    },
    /// One run of a best-of k-means completed.
    RunFinished {
        /// Zero-based run index.
        run: usize,
        /// Total runs.
        n_runs: usize,
        /// Inertia of this run.
        inertia: f64,
    },
    /// All best-of runs completed.
    BestOfFinished {
        /// Index of the winning run.
        best_run: usize,
        /// Its inertia.
        best_inertia: f64,
    },
}

impl FitEvent {
    /// Lowest verbosity at which this event is delivered.
    pub fn level(&self) -> Verbosity {
        match self {
            FitEvent::DbscanStarted { .. }
            | FitEvent::StrategySelected { .. }
            | FitEvent::DbscanFinished { .. }
            | FitEvent::KmeansFinished { .. }
            | FitEvent::BestOfFinished { .. } => Verbosity::Summary,
            FitEvent::CorePointsFound { .. }
            | FitEvent::BatchProcessed { .. }
            | FitEvent::ExpansionProgress { .. }
            | FitEvent::KmeansIteration { .. }
            | FitEvent::RunFinished { .. } => Verbosity::Progress,
        }
    }
}

/// Receiver of [`FitEvent`]s.
///
/// `Sync` because best-of runs may report from several threads.
pub trait FitObserver: Sync {
    /// Handle one event.
    fn on_event(&self, event: &FitEvent);
}

impl<F> FitObserver for F
where
    F: Fn(&FitEvent) + Sync,
{
    fn on_event(&self, event: &FitEvent) {
        self(event)
    }
}

/// Forwards summary events to `log::info!` and progress events to `log::debug!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl FitObserver for LogObserver {
    fn on_event(&self, event: &FitEvent) {
        match event.level() {
            Verbosity::Summary => log::info!("{event:?}"),
            _ => log::debug!("{event:?}"),
        }
    }
}

/// Verbosity filter in front of an observer.
#[derive(Clone, Copy)]
pub(crate) struct Reporter<'a> {
    verbosity: Verbosity,
    observer: &'a dyn FitObserver,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(verbosity: Verbosity, observer: &'a dyn FitObserver) -> Self {
        Self {
            verbosity,
            observer,
        }
    }

    /// Events are built lazily so silent fits pay nothing.
    #[inline]
    pub(crate) fn emit(&self, level: Verbosity, event: impl FnOnce() -> FitEvent) {
        if self.verbosity != Verbosity::Silent && level <= self.verbosity {
            let event = event();
            debug_assert_eq!(event.level(), level);
            self.observer.on_event(&event);
        }
    }

    pub(crate) fn enabled(&self, level: Verbosity) -> bool {
        self.verbosity != Verbosity::Silent && level <= self.verbosity
    }
}
