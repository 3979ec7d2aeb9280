//! Shared numeric helpers.

use crate::error::{Error, Result};

#[inline]
pub(crate) fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Squared Euclidean distance accumulated in `f64`, so large coordinates cannot overflow
/// and tiny ones do not round up to a subnormal `f32`.
#[inline]
pub(crate) fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}

/// Check that `data` is a non-empty, rectangular, finite matrix and return its
/// dimensionality.
pub(crate) fn validate_matrix(data: &[Vec<f32>]) -> Result<usize> {
    let first = data.first().ok_or(Error::EmptyInput)?;
    let d = first.len();
    if d == 0 {
        return Err(Error::ZeroDimension);
    }
    for (row, point) in data.iter().enumerate() {
        if point.len() != d {
            return Err(Error::DimensionMismatch {
                row,
                expected: d,
                found: point.len(),
            });
        }
        if let Some(col) = point.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFinite { row, col });
        }
    }
    Ok(d)
}

/// Inner product accumulated in `f64`. Products of two `f32`s are exact in `f64`, and the
/// summation order depends only on the coordinate order, so `dot(a, b) == dot(b, a)`.
#[inline]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum()
}

/// Row squared norms, computed once per fit.
///
/// Every density strategy measures pairs through [`SquaredNorms::distance_sq`], so a pair
/// sitting exactly on the `eps` boundary is classified the same way by all of them.
#[derive(Debug, Clone)]
pub(crate) struct SquaredNorms {
    norms: Vec<f64>,
    max_norm: f64,
}

impl SquaredNorms {
    pub(crate) fn new(data: &[Vec<f32>]) -> Self {
        let norms: Vec<f64> = data.iter().map(|p| dot(p, p)).collect();
        let max_norm = norms.iter().copied().fold(0.0, f64::max);
        Self { norms, max_norm }
    }

    /// `‖x‖² + ‖y‖² − 2⟨x,y⟩`, clamped at zero. Symmetric in `i` and `j`, zero on the
    /// diagonal.
    #[inline]
    pub(crate) fn distance_sq(&self, data: &[Vec<f32>], i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        let d = (self.norms[i] + self.norms[j]) - 2.0 * dot(&data[i], &data[j]);
        d.max(0.0)
    }

    /// Radius to ask an `f32` spatial index for so that its answer is a superset of
    /// `{j : distance_sq(i, j) <= eps_sq}`.
    ///
    /// Covers the cancellation error of the expansion and the rounding of the index's own
    /// direct `f64` distance. The result is never below the exact radius.
    pub(crate) fn search_radius(&self, eps_sq: f64, dim: usize) -> f32 {
        let terms = dim as f64 + 2.0;
        let cancellation = 8.0 * terms * f64::EPSILON * self.max_norm;
        let widen = 1.0 + 8.0 * terms * f64::from(f32::EPSILON);
        let radius = ((eps_sq + cancellation) * widen).sqrt();
        // Round up: the nearest `f32` may lie below `radius`, most visibly for subnormals.
        let rounded = radius as f32;
        if rounded.is_finite() && f64::from(rounded) < radius {
            f32::from_bits(rounded.to_bits() + 1)
        } else {
            rounded
        }
    }
}
