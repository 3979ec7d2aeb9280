//! Batch clustering engine.
//!
//! `kluster` fits two unsupervised clustering algorithms to a dense sample matrix:
//!
//! - DBSCAN (density clustering with noise labeling), which picks a pairwise, indexed
//!   or batched execution strategy from the input size without changing its output
//! - k-means (k-means++ seeding, Lloyd iterations), plus best-of-R restarts
//!
//! Fits are synchronous and fit-once: nothing is persisted or updated incrementally.
//! Progress goes through [`observe`] to the `log` facade; enable the `parallel`
//! feature to spread bulk neighbor queries and k-means restarts over rayon.

#![forbid(unsafe_code)]

pub mod cluster;
pub mod error;
pub mod observe;

pub use cluster::{
    BestOfFit, BestOfKmeans, Clustering, Dbscan, DbscanFit, Kmeans, KmeansFit, Strategy, NOISE,
};
pub use error::{Error, ErrorKind, Result};
pub use observe::{FitEvent, FitObserver, LogObserver, Verbosity};
