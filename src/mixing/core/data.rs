//! Data containers for spatial mixing models.
//!
//! Purpose
//! -------
//! Provide validated containers for the two inputs every model consumes: the
//! node × time observation matrix ([`Series`]) and the flattened pairwise
//! distances between nodes ([`DistanceVector`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - A [`Series`] is non-empty (`N ≥ 1`, `T ≥ 1`) and every entry is finite.
//! - A [`DistanceVector`] has length `N²` and holds finite, non-negative
//!   values; `d[i·N + j]` is the distance from node `i` to node `j`.
//! - Both are immutable after construction.
//!
//! Conventions
//! -----------
//! - Series are `N × T`: rows are nodes, columns are time.
//! - Distance vectors are row-major over node pairs, matching the row-major
//!   reshape of mixing-matrix columns.
//!
//! Testing notes
//! -------------
//! - Unit tests cover each validation failure and the rescaling rules of
//!   [`DistanceVector::scaled`].
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::mixing::errors::{MixingError, MixingResult};

/// Validated `N × T` observation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    data: Array2<f64>,
}

impl Series {
    /// Validate and wrap a node × time matrix.
    ///
    /// # Errors
    /// - [`MixingError::EmptySeries`] if either dimension is zero.
    /// - [`MixingError::NonFiniteData`] at the first NaN / ±∞ entry.
    pub fn new(data: Array2<f64>) -> MixingResult<Self> {
        if data.is_empty() {
            return Err(MixingError::EmptySeries);
        }
        for ((node, time), &value) in data.indexed_iter() {
            if !value.is_finite() {
                return Err(MixingError::NonFiniteData { node, time, value });
            }
        }
        Ok(Self { data })
    }

    /// Number of nodes `N`.
    pub fn n_nodes(&self) -> usize {
        self.data.nrows()
    }

    /// Number of time steps `T`.
    pub fn len(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn column(&self, time: usize) -> ArrayView1<'_, f64> {
        self.data.column(time)
    }

    /// The first `len` time steps (clamped to the series length).
    pub fn head(&self, len: usize) -> ArrayView2<'_, f64> {
        let len = len.min(self.len());
        self.data.slice(s![.., ..len])
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.data
    }
}

/// Validated, row-major pairwise distance vector of length `N²`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceVector {
    values: Array1<f64>,
    n_nodes: usize,
}

impl DistanceVector {
    /// # Errors
    /// - [`MixingError::DistanceLength`] if `values.len() != n_nodes²` or
    ///   `n_nodes == 0`.
    /// - [`MixingError::InvalidDistance`] at the first non-finite or
    ///   negative entry.
    pub fn new(values: Array1<f64>, n_nodes: usize) -> MixingResult<Self> {
        let expected = n_nodes * n_nodes;
        if n_nodes == 0 || values.len() != expected {
            return Err(MixingError::DistanceLength { expected, actual: values.len() });
        }
        for (index, &value) in values.iter().enumerate() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(MixingError::InvalidDistance { index, value });
            }
        }
        Ok(Self { values, n_nodes })
    }

    /// Build from an `N × N` distance matrix.
    pub fn from_matrix(matrix: &Array2<f64>) -> MixingResult<Self> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(MixingError::DimensionMismatch {
                what: "distance matrix",
                expected: vec![rows, rows],
                found: vec![rows, cols],
            });
        }
        let values: Array1<f64> = matrix.iter().copied().collect();
        Self::new(values, rows)
    }

    /// Min–max rescale into `[lo, hi]`.
    ///
    /// A constant vector maps to `lo` everywhere.
    ///
    /// # Errors
    /// [`MixingError::InvalidScaleRange`] unless `0 ≤ lo < hi` and both finite.
    pub fn scaled(&self, (lo, hi): (f64, f64)) -> MixingResult<Self> {
        if !(lo.is_finite() && hi.is_finite()) {
            return Err(MixingError::InvalidScaleRange {
                lo,
                hi,
                reason: "Bounds must be finite.",
            });
        }
        if lo < 0.0 {
            return Err(MixingError::InvalidScaleRange {
                lo,
                hi,
                reason: "Lower bound must be non-negative.",
            });
        }
        if lo >= hi {
            return Err(MixingError::InvalidScaleRange {
                lo,
                hi,
                reason: "Lower bound must be below the upper bound.",
            });
        }
        let min = self.values.fold(f64::INFINITY, |m, &x| m.min(x));
        let max = self.values.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
        let range = max - min;
        let values = if range > 0.0 {
            self.values.mapv(|x| lo + (x - min) / range * (hi - lo))
        } else {
            Array1::from_elem(self.values.len(), lo)
        };
        Ok(Self { values, n_nodes: self.n_nodes })
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // `Series::new` rejects empty and non-finite input, reporting the first
    // offending (node, time) pair.
    fn series_validation_reports_first_bad_entry() {
        assert_eq!(Series::new(Array2::zeros((0, 4))), Err(MixingError::EmptySeries));
        let err = Series::new(array![[1.0, 2.0], [3.0, f64::INFINITY]]).unwrap_err();
        assert_eq!(err, MixingError::NonFiniteData { node: 1, time: 1, value: f64::INFINITY });
    }

    #[test]
    fn series_exposes_dimensions_and_head() {
        let series = Series::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(series.n_nodes(), 2);
        assert_eq!(series.len(), 3);
        assert_eq!(series.head(2), array![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(series.head(10).ncols(), 3);
    }

    #[test]
    fn distance_vector_checks_length_and_sign() {
        assert_eq!(
            DistanceVector::new(array![0.0, 1.0, 1.0], 2),
            Err(MixingError::DistanceLength { expected: 4, actual: 3 })
        );
        assert_eq!(
            DistanceVector::new(array![0.0, -1.0, 1.0, 0.0], 2),
            Err(MixingError::InvalidDistance { index: 1, value: -1.0 })
        );
        let ok = DistanceVector::from_matrix(&array![[0.0, 2.0], [2.0, 0.0]]).unwrap();
        assert_eq!(ok.values(), array![0.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    // Purpose
    // -------
    // Rescaling maps min → lo and max → hi; constant vectors collapse to lo.
    fn scaled_maps_range_and_handles_constants() {
        // Arrange
        let d = DistanceVector::new(array![0.0, 5.0, 10.0, 0.0], 2).unwrap();
        let flat = DistanceVector::new(array![3.0, 3.0, 3.0, 3.0], 2).unwrap();

        // Act
        let scaled = d.scaled((1.0, 2.0)).unwrap();
        let flat_scaled = flat.scaled((0.5, 1.0)).unwrap();

        // Assert
        assert_relative_eq!(scaled.values()[0], 1.0);
        assert_relative_eq!(scaled.values()[1], 1.5);
        assert_relative_eq!(scaled.values()[2], 2.0);
        assert!(flat_scaled.values().iter().all(|&v| v == 0.5));
    }

    #[test]
    fn scaled_rejects_invalid_ranges() {
        let d = DistanceVector::new(array![0.0, 1.0, 1.0, 0.0], 2).unwrap();
        assert!(matches!(d.scaled((-1.0, 1.0)), Err(MixingError::InvalidScaleRange { .. })));
        assert!(matches!(d.scaled((1.0, 1.0)), Err(MixingError::InvalidScaleRange { .. })));
    }
}
