//! Forecast artifacts — observed overlap, forecast path, and mixing history.
//!
//! Purpose
//! -------
//! Bundle the outputs of a forecast run into one serializable value that can
//! be persisted as a single artifact file.
//!
//! Key behaviors
//! -------------
//! - [`ForecastBundle::new`] checks the three matrices agree on their node
//!   dimension and computes the MSE over the observed/forecast overlap.
//! - [`ForecastBundle::save`] / [`ForecastBundle::load`] persist the bundle
//!   atomically with a format version.
//!
//! Conventions
//! -----------
//! - `observed` and `forecast` are `N × L` (node × time), with column `t` of
//!   both referring to the same absolute time step.
//! - `mixing_history` is `N² × L_mix`, column `t` holding the flattened
//!   `N × N` matrix used around time `t` (row `i·N + j`).
//! - `mse` is `None` when the overlap is empty.
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::mixing::{
    core::artifact::{self, FORMAT_VERSION},
    errors::{MixingError, MixingResult},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub format_version: u32,
    pub observed: Array2<f64>,
    pub forecast: Array2<f64>,
    pub mixing_history: Array2<f64>,
    pub mse: Option<f64>,
}

impl ForecastBundle {
    /// # Errors
    /// [`MixingError::DimensionMismatch`] if node counts disagree.
    pub fn new(
        observed: Array2<f64>, forecast: Array2<f64>, mixing_history: Array2<f64>,
    ) -> MixingResult<Self> {
        let n = forecast.nrows();
        if observed.nrows() != n {
            return Err(MixingError::DimensionMismatch {
                what: "observed series",
                expected: vec![n, observed.ncols()],
                found: vec![observed.nrows(), observed.ncols()],
            });
        }
        if mixing_history.nrows() != n * n {
            return Err(MixingError::DimensionMismatch {
                what: "mixing history",
                expected: vec![n * n, mixing_history.ncols()],
                found: vec![mixing_history.nrows(), mixing_history.ncols()],
            });
        }
        let mse = overlap_mse(observed.view(), forecast.view());
        Ok(Self { format_version: FORMAT_VERSION, observed, forecast, mixing_history, mse })
    }

    pub fn n_nodes(&self) -> usize {
        self.forecast.nrows()
    }

    /// Number of forecast columns.
    pub fn len(&self) -> usize {
        self.forecast.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.forecast.ncols() == 0
    }

    /// Mixing matrix `A_t` as `N × N`.
    pub fn mixing_at(&self, t: usize) -> MixingResult<Array2<f64>> {
        let n = self.n_nodes();
        if t >= self.mixing_history.ncols() {
            return Err(MixingError::TimeIndexOutOfRange {
                index: t,
                slices: self.mixing_history.ncols(),
            });
        }
        let col = self.mixing_history.column(t).to_owned();
        col.into_shape((n, n)).map_err(|_| MixingError::DimensionMismatch {
            what: "mixing history column",
            expected: vec![n * n],
            found: vec![self.mixing_history.nrows()],
        })
    }

    pub fn save(&self, path: &Path) -> MixingResult<()> {
        artifact::write_atomic(path, self)
    }

    pub fn load(path: &Path) -> MixingResult<Self> {
        let bundle: ForecastBundle = artifact::read(path)?;
        artifact::check_version(path, bundle.format_version)?;
        Ok(bundle)
    }
}

/// Mean squared error over the columns both matrices share.
pub fn overlap_mse(observed: ArrayView2<'_, f64>, forecast: ArrayView2<'_, f64>) -> Option<f64> {
    let cols = observed.ncols().min(forecast.ncols());
    if cols == 0 || observed.nrows() == 0 {
        return None;
    }
    let diff = &observed.slice(s![.., ..cols]) - &forecast.slice(s![.., ..cols]);
    diff.mapv(|x| x * x).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // The MSE only covers the shared columns.
    //
    // Given
    // -----
    // - 3 observed columns and 4 forecast columns.
    //
    // Expect
    // ------
    // - MSE over the first 3 columns only.
    fn mse_uses_the_overlap_only() {
        // Arrange
        let observed = array![[1.0, 2.0, 3.0]];
        let forecast = array![[1.0, 2.0, 5.0, 100.0]];

        // Act
        let bundle = ForecastBundle::new(observed, forecast, Array2::zeros((1, 4))).unwrap();

        // Assert
        assert_relative_eq!(bundle.mse.unwrap(), 4.0 / 3.0);
        assert_eq!(overlap_mse(array![[1.0]].view(), Array2::zeros((1, 0)).view()), None);
    }

    #[test]
    fn node_dimensions_must_agree() {
        let err =
            ForecastBundle::new(Array2::zeros((2, 3)), Array2::zeros((3, 3)), Array2::zeros((9, 3)))
                .unwrap_err();
        assert!(matches!(err, MixingError::DimensionMismatch { what: "observed series", .. }));
        let err =
            ForecastBundle::new(Array2::zeros((2, 3)), Array2::zeros((2, 3)), Array2::zeros((2, 3)))
                .unwrap_err();
        assert!(matches!(err, MixingError::DimensionMismatch { what: "mixing history", .. }));
    }

    #[test]
    fn bundle_round_trips_through_disk_and_reshapes_mixing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.bin");
        let history = array![[1.0, 5.0], [2.0, 6.0], [3.0, 7.0], [4.0, 8.0]];
        let bundle =
            ForecastBundle::new(array![[1.0, 2.0], [3.0, 4.0]], array![[1.0, 2.5], [3.0, 4.0]], history)
                .unwrap();

        bundle.save(&path).unwrap();
        let back = ForecastBundle::load(&path).unwrap();

        assert_eq!(back, bundle);
        assert_eq!(back.mixing_at(1).unwrap(), array![[5.0, 6.0], [7.0, 8.0]]);
        assert!(back.mixing_at(2).is_err());
    }
}
