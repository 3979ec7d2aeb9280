//! Clustering algorithms for grouping similar items.
//!
//! Both algorithms take a dense sample matrix as `&[Vec<f32>]` (one row per sample,
//! every row the same length, every value finite) and never modify it.
//!
//! ## Algorithms
//!
//! ### K-means
//!
//! The classic algorithm: assign each point to the nearest centroid, then
//! update centroids to the mean of their points. Repeat.
//!
//! **Objective**: Minimize within-cluster sum of squares:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! **Assumptions**:
//! - Clusters are roughly spherical
//! - Clusters have similar sizes
//! - You know k in advance
//!
//! [`BestOfKmeans`] repeats the fit with consecutive seeds and keeps the lowest-inertia
//! run.
//!
//! ### DBSCAN
//!
//! Density-based clustering that can discover non-convex clusters and identify
//! outliers (noise points). DBSCAN does not require specifying the number of
//! clusters in advance. How neighborhoods are computed is picked from the input size
//! ([`Strategy`]); the result does not depend on it.
//!
//! ## Usage
//!
//! ```rust
//! use kluster::cluster::{BestOfKmeans, Clustering, Dbscan, Kmeans, NOISE};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//!     vec![50.0, 50.0],
//! ];
//!
//! // Hard clustering with K-means
//! let labels = Kmeans::new(2).with_seed(0).fit_predict(&data[..4]).unwrap();
//! assert_eq!(labels[0], labels[1]);  // First two together
//! assert_ne!(labels[0], labels[2]);  // Separate from last two
//!
//! // Best of five restarts
//! let best = BestOfKmeans::new(Kmeans::new(2), 5).fit(&data[..4]).unwrap();
//! assert_eq!(best.inertias.len(), 5);
//!
//! // Density-based clustering with DBSCAN
//! let fit = Dbscan::new(0.5, 2).fit(&data).unwrap();
//! assert_eq!(fit.labels, vec![0, 0, 1, 1, NOISE]);
//! assert_eq!(fit.core_sample_indices, vec![0, 1, 2, 3]);
//! ```

mod best_of;
mod dbscan;
mod kmeans;
mod neighbors;
mod traits;
mod util;

pub use best_of::{BestOfFit, BestOfKmeans};
pub use dbscan::{Dbscan, DbscanFit, Strategy, NOISE};
pub use kmeans::{Kmeans, KmeansFit};
pub use neighbors::{k_distances, BruteForce, KdTree, NeighborIndex};
pub use traits::Clustering;
