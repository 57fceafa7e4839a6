//! Sliding `(history, target)` windows over a series.
//!
//! For window length `p` and a series `X` of length `T`, sample
//! `s ∈ 0..T−p` carries
//! - `inputs[s, j, k] = X[j, s + k]` (history, oldest first),
//! - `targets[s, i] = X[i, s + p]`,
//! - `input_indices[s, k] = s + k` (absolute time of each history column).
use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::mixing::{
    core::data::Series,
    errors::{MixingError, MixingResult},
};

#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    pub inputs: Array3<f64>,
    pub targets: Array2<f64>,
    pub input_indices: Array2<usize>,
}

impl WindowSet {
    pub fn from_series(series: &Series, window: usize) -> MixingResult<Self> {
        Self::from_matrix(series.data(), window)
    }

    /// Build windows from a raw `N × T` matrix (e.g. a pseudo-series of
    /// predictions).
    ///
    /// # Errors
    /// [`MixingError::InvalidWindow`] if `window == 0` or `window ≥ T`.
    pub fn from_matrix(data: ArrayView2<'_, f64>, window: usize) -> MixingResult<Self> {
        let (n, len) = data.dim();
        if window == 0 {
            return Err(MixingError::InvalidWindow {
                window,
                len,
                reason: "Window length must be at least 1.",
            });
        }
        if window >= len {
            return Err(MixingError::InvalidWindow {
                window,
                len,
                reason: "Window length must be shorter than the series.",
            });
        }
        let n_samples = len - window;
        let mut inputs = Array3::zeros((n_samples, n, window));
        let mut targets = Array2::zeros((n_samples, n));
        let mut input_indices = Array2::zeros((n_samples, window));
        for s in 0..n_samples {
            for k in 0..window {
                input_indices[[s, k]] = s + k;
                for j in 0..n {
                    inputs[[s, j, k]] = data[[j, s + k]];
                }
            }
            targets.row_mut(s).assign(&data.column(s + window));
        }
        Ok(Self { inputs, targets, input_indices })
    }

    pub fn len(&self) -> usize {
        self.targets.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_nodes(&self) -> usize {
        self.targets.ncols()
    }

    pub fn window(&self) -> usize {
        self.input_indices.ncols()
    }

    /// Copy out the samples listed in `ids`, in order.
    ///
    /// # Errors
    /// [`MixingError::InvalidOption`] if an id is out of range.
    pub fn select(&self, ids: &[usize]) -> MixingResult<Self> {
        if let Some(&bad) = ids.iter().find(|&&id| id >= self.len()) {
            return Err(MixingError::InvalidOption {
                name: "sample id",
                value: bad,
                reason: "Sample id exceeds the number of windows.",
            });
        }
        Ok(Self {
            inputs: self.inputs.select(Axis(0), ids),
            targets: self.targets.select(Axis(0), ids),
            input_indices: self.input_indices.select(Axis(0), ids),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Windows line up history columns with the next column as target.
    //
    // Given
    // -----
    // - A 2 × 5 series, window 2.
    //
    // Expect
    // ------
    // - 3 samples; sample 1 has history columns 1, 2 and target column 3.
    fn windows_pair_history_with_next_column() {
        // Arrange
        let series =
            Series::new(array![[0.0, 1.0, 2.0, 3.0, 4.0], [10.0, 11.0, 12.0, 13.0, 14.0]]).unwrap();

        // Act
        let w = WindowSet::from_series(&series, 2).unwrap();

        // Assert
        assert_eq!(w.len(), 3);
        assert_eq!(w.window(), 2);
        assert_eq!(w.inputs[[1, 0, 0]], 1.0);
        assert_eq!(w.inputs[[1, 1, 1]], 12.0);
        assert_eq!(w.targets.row(1), array![3.0, 13.0]);
        assert_eq!(w.input_indices.row(2), array![2, 3]);
    }

    #[test]
    fn window_must_fit_inside_series() {
        let series = Series::new(array![[1.0, 2.0, 3.0]]).unwrap();
        assert!(matches!(
            WindowSet::from_series(&series, 0),
            Err(MixingError::InvalidWindow { .. })
        ));
        assert!(matches!(
            WindowSet::from_series(&series, 3),
            Err(MixingError::InvalidWindow { window: 3, len: 3, .. })
        ));
    }

    #[test]
    fn select_copies_requested_samples() {
        let series = Series::new(array![[0.0, 1.0, 2.0, 3.0]]).unwrap();
        let w = WindowSet::from_series(&series, 1).unwrap();
        let picked = w.select(&[2, 0]).unwrap();
        assert_eq!(picked.targets, array![[3.0], [1.0]]);
        assert!(w.select(&[3]).is_err());
    }
}
