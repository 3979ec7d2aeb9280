//! Spatial neighbor queries.
//!
//! [`NeighborIndex`] is the only capability DBSCAN needs from a spatial index: all points
//! within a radius, ascending by index. Two implementations are provided:
//!
//! - [`BruteForce`]: a linear scan. No build cost, O(n) per query.
//! - [`KdTree`]: median-split k-d tree. O(n log n) build, roughly O(log n + m) per radius
//!   query in low dimension (m = result size). Degrades toward a scan as dimension grows.
//!
//! Both also answer k-nearest-neighbor queries, which [`k_distances`] uses to produce the
//! classic "k-distance" curve for picking DBSCAN's `eps`.

use super::util::{self, squared_distance, squared_euclidean};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Radius and k-nearest queries over a fixed set of points.
pub trait NeighborIndex {
    /// Indices of all indexed points `p` with `‖p − query‖ ≤ radius`, ascending. Distances
    /// are measured in `f64`.
    fn within_radius(&self, query: &[f32], radius: f32) -> Vec<usize>;

    /// The `k` indexed points closest to `query` as `(index, squared_distance)`,
    /// ascending by distance with ties broken by index.
    fn k_nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;

    /// Number of indexed points.
    fn len(&self) -> usize;

    /// Whether the index holds no points.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Linear-scan neighbor index.
#[derive(Debug, Clone, Copy)]
pub struct BruteForce<'a> {
    data: &'a [Vec<f32>],
}

impl<'a> BruteForce<'a> {
    /// Index `data` (no preprocessing).
    pub fn new(data: &'a [Vec<f32>]) -> Self {
        Self { data }
    }
}

impl NeighborIndex for BruteForce<'_> {
    fn within_radius(&self, query: &[f32], radius: f32) -> Vec<usize> {
        let r_sq = f64::from(radius).powi(2);
        self.data
            .iter()
            .enumerate()
            .filter(|(_, p)| squared_distance(query, p) <= r_sq)
            .map(|(i, _)| i)
            .collect()
    }

    fn k_nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut all: Vec<(usize, f32)> = self
            .data
            .iter()
            .enumerate()
            .map(|(i, p)| (i, squared_euclidean(query, p)))
            .collect();
        all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        all.truncate(k);
        all
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

const LEAF_SIZE: usize = 16;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f32,
        left: usize,
        right: usize,
    },
}

/// Median-split k-d tree over borrowed points.
///
/// Nodes live in a flat arena and refer to each other by position; leaves own a
/// contiguous range of the permuted index array.
#[derive(Debug, Clone)]
pub struct KdTree<'a> {
    data: &'a [Vec<f32>],
    order: Vec<usize>,
    nodes: Vec<Node>,
    root: usize,
}

impl<'a> KdTree<'a> {
    /// Build a tree over `data`.
    ///
    /// Fails on the same malformed input DBSCAN rejects: empty, zero-width, ragged or
    /// non-finite matrices.
    pub fn build(data: &'a [Vec<f32>]) -> Result<Self> {
        let dim = util::validate_matrix(data)?;
        let mut tree = Self {
            data,
            order: (0..data.len()).collect(),
            nodes: Vec::with_capacity(2 * data.len() / LEAF_SIZE + 1),
            root: 0,
        };
        tree.root = tree.build_range(0, data.len(), dim);
        log::trace!(
            "kd-tree built: {} points, {} nodes",
            data.len(),
            tree.nodes.len()
        );
        Ok(tree)
    }

    fn build_range(&mut self, start: usize, end: usize, dim: usize) -> usize {
        if end - start <= LEAF_SIZE {
            self.nodes.push(Node::Leaf { start, end });
            return self.nodes.len() - 1;
        }

        let axis = self.widest_axis(start, end, dim);
        let mid = start + (end - start) / 2;
        let data = self.data;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            data[a][axis].total_cmp(&data[b][axis])
        });
        let value = data[self.order[mid]][axis];

        let left = self.build_range(start, mid, dim);
        let right = self.build_range(mid, end, dim);
        self.nodes.push(Node::Split {
            axis,
            value,
            left,
            right,
        });
        self.nodes.len() - 1
    }

    fn widest_axis(&self, start: usize, end: usize, dim: usize) -> usize {
        let mut best_axis = 0;
        let mut best_spread = f32::NEG_INFINITY;
        for axis in 0..dim {
            let (lo, hi) = self.order[start..end]
                .iter()
                .map(|&i| self.data[i][axis])
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            if hi - lo > best_spread {
                best_spread = hi - lo;
                best_axis = axis;
            }
        }
        best_axis
    }
}

impl NeighborIndex for KdTree<'_> {
    fn within_radius(&self, query: &[f32], radius: f32) -> Vec<usize> {
        let r_sq = f64::from(radius).powi(2);
        let mut out = Vec::new();
        let mut stack = vec![self.root];

        while let Some(node) = stack.pop() {
            match self.nodes[node] {
                Node::Leaf { start, end } => {
                    for &i in &self.order[start..end] {
                        if squared_distance(query, &self.data[i]) <= r_sq {
                            out.push(i);
                        }
                    }
                }
                Node::Split {
                    axis,
                    value,
                    left,
                    right,
                } => {
                    let diff = f64::from(query[axis]) - f64::from(value);
                    let (near, far) = if diff <= 0.0 {
                        (left, right)
                    } else {
                        (right, left)
                    };
                    if diff * diff <= r_sq {
                        stack.push(far);
                    }
                    stack.push(near);
                }
            }
        }

        out.sort_unstable();
        out
    }

    fn k_nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        // (node, squared lower bound on the distance from `query` to anything under it)
        let mut stack = vec![(self.root, 0.0f32)];

        while let Some((node, lower)) = stack.pop() {
            if heap.len() == k && heap.peek().is_some_and(|worst| lower > worst.dist_sq) {
                continue;
            }
            match self.nodes[node] {
                Node::Leaf { start, end } => {
                    for &index in &self.order[start..end] {
                        let candidate = Candidate {
                            dist_sq: squared_euclidean(query, &self.data[index]),
                            index,
                        };
                        if heap.len() < k {
                            heap.push(candidate);
                        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                            heap.pop();
                            heap.push(candidate);
                        }
                    }
                }
                Node::Split {
                    axis,
                    value,
                    left,
                    right,
                } => {
                    let diff = query[axis] - value;
                    let (near, far) = if diff <= 0.0 {
                        (left, right)
                    } else {
                        (right, left)
                    };
                    // Far side first so the near side is searched first and tightens the
                    // bound the far side is checked against when popped.
                    stack.push((far, lower.max(diff * diff)));
                    stack.push((near, lower));
                }
            }
        }

        let mut out: Vec<(usize, f32)> = heap.into_iter().map(|c| (c.index, c.dist_sq)).collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        out
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

/// Max-heap entry ordered by (distance, index).
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist_sq: f32,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.index.cmp(&other.index))
    }
}

/// Distance from every point to its `k`-th nearest neighbor (the point itself counts as
/// the first), sorted ascending.
///
/// Plotting this curve with `k = min_samples` and reading off the "knee" is the usual way
/// to choose DBSCAN's `eps`.
pub fn k_distances(data: &[Vec<f32>], k: usize) -> Result<Vec<f32>> {
    if k == 0 {
        return Err(Error::InvalidParameter {
            name: "k",
            message: "must be at least 1",
        });
    }
    let tree = KdTree::build(data)?;
    if k > data.len() {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: data.len(),
        });
    }

    let mut out: Vec<f32> = data
        .iter()
        .map(|p| {
            tree.k_nearest(p, k)
                .last()
                .map_or(0.0, |&(_, d_sq)| d_sq.sqrt())
        })
        .collect();
    out.sort_by(f32::total_cmp);
    Ok(out)
}
