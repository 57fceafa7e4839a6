//! Basis transform: distances → shape-constrained design matrix.
//!
//! Purpose
//! -------
//! Turn a [`DistanceVector`] into a fixed design matrix `g` (one row per
//! node pair, one column per knot) such that every non-negative combination
//! `g · w` is a curve of the requested [`ShapeConstraint`] in distance.
//!
//! Key behaviors
//! -------------
//! - Knots are reference points `s_i` taken from the sorted distances:
//!   every order statistic ([`KnotPolicy::OrderStatistics`], `K = N²`), or
//!   `k` linearly interpolated quantiles at levels `i / (k − 1)`
//!   ([`KnotPolicy::Quantiles`]).
//! - Column `i` is [`ShapeConstraint::eval`] at `s_i` for every distance.
//!
//! Invariants & assumptions
//! ------------------------
//! - Distances are finite and non-negative, so every entry of `g` is
//!   non-negative. Combined with squared weights this keeps mixing matrices
//!   non-negative for any parameter values.
//! - The matrix is never mutated after construction.
//!
//! Testing notes
//! -------------
//! - Unit tests pin column values on small inputs; the monotonicity
//!   property over random inputs lives in `tests/prop_basis.rs`.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::mixing::{
    core::{data::DistanceVector, shape::ShapeConstraint},
    errors::{MixingError, MixingResult},
};

/// How knot reference points are drawn from the sorted distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KnotPolicy {
    /// One knot per distance (`K = N²`).
    #[default]
    OrderStatistics,
    /// `k ≥ 2` quantile knots at levels `0, 1/(k−1), …, 1`.
    Quantiles(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisMatrix {
    g: Array2<f64>,
    knots: Array1<f64>,
    policy: KnotPolicy,
    shape: ShapeConstraint,
    n_nodes: usize,
}

impl BasisMatrix {
    /// # Errors
    /// [`MixingError::InvalidKnots`] for `Quantiles(k)` with `k < 2`.
    pub fn new(
        distances: &DistanceVector, shape: ShapeConstraint, policy: KnotPolicy,
    ) -> MixingResult<Self> {
        let d = distances.values();
        let knots = knot_points(d, policy)?;
        let g = Array2::from_shape_fn((d.len(), knots.len()), |(row, col)| {
            shape.eval(d[row], knots[col])
        });
        Ok(Self { g, knots, policy, shape, n_nodes: distances.n_nodes() })
    }

    /// `g · w` for a single weight column of length `K`.
    ///
    /// # Errors
    /// [`MixingError::DimensionMismatch`] if `w.len() != K`.
    pub fn apply(&self, w: ArrayView1<'_, f64>) -> MixingResult<Array1<f64>> {
        if w.len() != self.n_basis() {
            return Err(MixingError::DimensionMismatch {
                what: "basis weights",
                expected: vec![self.n_basis()],
                found: vec![w.len()],
            });
        }
        Ok(self.g.dot(&w))
    }

    pub fn g(&self) -> ArrayView2<'_, f64> {
        self.g.view()
    }

    pub fn knots(&self) -> ArrayView1<'_, f64> {
        self.knots.view()
    }

    pub fn knot_policy(&self) -> KnotPolicy {
        self.policy
    }

    pub fn shape(&self) -> ShapeConstraint {
        self.shape
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Number of basis columns `K`.
    pub fn n_basis(&self) -> usize {
        self.g.ncols()
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.g
    }
}

/// Standalone form of [`BasisMatrix::new`] for callers that only need `g`.
pub fn basis_function(
    distances: &DistanceVector, shape: ShapeConstraint, policy: KnotPolicy,
) -> MixingResult<Array2<f64>> {
    BasisMatrix::new(distances, shape, policy).map(BasisMatrix::into_inner)
}

// ---- Helper Methods ----

fn knot_points(d: ArrayView1<'_, f64>, policy: KnotPolicy) -> MixingResult<Array1<f64>> {
    let mut sorted = d.to_vec();
    sorted.sort_by(f64::total_cmp);
    match policy {
        KnotPolicy::OrderStatistics => Ok(Array1::from(sorted)),
        KnotPolicy::Quantiles(k) => {
            if k < 2 {
                return Err(MixingError::InvalidKnots { knots: k });
            }
            Ok(Array1::from_shape_fn(k, |i| {
                quantile_sorted(&sorted, i as f64 / (k - 1) as f64)
            }))
        }
    }
}

/// Linear-interpolation quantile of an ascending, non-empty slice.
fn quantile_sorted(sorted: &[f64], level: f64) -> f64 {
    let last = sorted.len() - 1;
    let pos = level * last as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(last);
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
