//! Stationary mixing model — a single time-invariant `N × N` operator fitted
//! full-batch with L-BFGS.
//!
//! Purpose
//! -------
//! Provide the time-invariant counterpart of
//! [`MixingModel`](super::mixing::MixingModel): one weight column `w ∈ ℝ^K`,
//! raw mixing `M = reshape(g · (w ∘ w))`, an optional [`Normalization`] of
//! `M`, and one-step predictions
//! `pred[s, i] = Σ_k Σ_j A[i, j] · x[s, j, k]`.
//!
//! Key behaviors
//! -------------
//! - Implements [`LossFunction`] over a [`WindowSet`] so the generic
//!   [`minimize`] entry point can fit it.
//! - The gradient is analytic for [`Normalization::Identity`] and
//!   [`Normalization::RowSoftmax`]. [`Normalization::MinMax`] is not smooth
//!   and reports `GradientNotImplemented`, which routes the optimizer to
//!   finite differences.
//! - [`StationaryMixingModel::forecast`] returns in-sample one-step
//!   predictions with the first `p` observed columns prepended.
//!
//! Invariants & assumptions
//! ------------------------
//! - `g ≥ 0` and `w` enters squared, so `M ≥ 0` before normalization.
//! - Forecasting requires a completed [`StationaryMixingModel::fit`].
//!
//! Testing notes
//! -------------
//! - Unit tests check the analytic gradients against central differences,
//!   the FD routing for min–max, the fit-before-forecast guard and the
//!   layout of the forecast bundle.
use ndarray::{concatenate, s, Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    mixing::{
        core::{
            basis::BasisMatrix, data::Series, forecasts::ForecastBundle, init::WeightInit,
            windows::WindowSet,
        },
        errors::{MixingError, MixingResult},
    },
    optimization::{
        errors::{OptError, OptResult},
        loss_optimizer::{
            minimize, validation::validate_theta, Grad, Loss, LossFunction, LossOptions,
            OptimOutcome, Theta,
        },
        numerical_stability::transformations::{min_max_scale, row_softmax, row_softmax_backward},
    },
};

/// Post-processing applied to the raw mixing matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Normalization {
    Identity,
    /// Rescale all entries to `[0, 1]`; a constant matrix maps to zeros.
    MinMax,
    /// Softmax across each row.
    #[default]
    RowSoftmax,
}

#[derive(Debug, Clone)]
pub struct StationaryMixingModel {
    basis: BasisMatrix,
    normalization: Normalization,
    outcome: Option<OptimOutcome>,
}

impl StationaryMixingModel {
    pub fn new(basis: BasisMatrix, normalization: Normalization) -> Self {
        Self { basis, normalization, outcome: None }
    }

    pub fn n_nodes(&self) -> usize {
        self.basis.n_nodes()
    }

    pub fn n_basis(&self) -> usize {
        self.basis.n_basis()
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Result of the last [`StationaryMixingModel::fit`], if any.
    pub fn outcome(&self) -> Option<&OptimOutcome> {
        self.outcome.as_ref()
    }

    /// Initial weight column drawn by `init`.
    pub fn initial_theta<R: Rng + ?Sized>(
        &self, init: WeightInit, rng: &mut R,
    ) -> MixingResult<Theta> {
        Ok(init.sample(self.n_basis(), 1, rng)?.column(0).to_owned())
    }

    /// Normalized `N × N` mixing matrix for weights `theta`.
    pub fn mixing_matrix(&self, theta: &Theta) -> OptResult<Array2<f64>> {
        validate_theta(theta, self.n_basis())?;
        Ok(self.normalize(&self.raw_mixing(theta)))
    }

    /// Fit the weights by L-BFGS, starting from `theta0`.
    ///
    /// # Errors
    /// Configuration and optimizer errors from [`minimize`], surfaced as
    /// [`MixingError`].
    pub fn fit(
        &mut self, theta0: Theta, windows: &WindowSet, opts: &LossOptions,
    ) -> MixingResult<&OptimOutcome> {
        let outcome = minimize(&*self, theta0, windows, opts)?;
        debug!(
            loss = outcome.value,
            iterations = outcome.iterations,
            status = %outcome.status,
            "stationary mixing fit finished"
        );
        Ok(self.outcome.insert(outcome))
    }

    /// One-step predictions (`S × N`) under the fitted weights.
    ///
    /// # Errors
    /// [`MixingError::ModelNotFitted`] before a successful fit.
    pub fn predict(&self, windows: &WindowSet) -> MixingResult<Array2<f64>> {
        let theta = &self.fitted()?.theta_hat;
        self.check(theta, windows)?;
        let mixing = self.normalize(&self.raw_mixing(theta));
        Ok(summed_inputs(windows).dot(&mixing.t()))
    }

    /// In-sample forecast over `series` with window `p`.
    ///
    /// The forecast holds the first `p` observed columns followed by one
    /// prediction per later column; the mixing history is the single fitted
    /// operator as one `N² × 1` column.
    ///
    /// # Errors
    /// - [`MixingError::ModelNotFitted`] before a successful fit.
    /// - [`MixingError::InvalidWindow`] if `p` does not fit the series.
    pub fn forecast(&self, series: &Series, p: usize) -> MixingResult<ForecastBundle> {
        let theta = &self.fitted()?.theta_hat;
        let windows = WindowSet::from_series(series, p)?;
        let preds = self.predict(&windows)?;
        let observed = series.data().to_owned();
        let forecast = concatenate(Axis(1), &[observed.slice(s![.., ..p]), preds.t()]).map_err(
            |_| MixingError::DimensionMismatch {
                what: "forecast",
                expected: vec![self.n_nodes(), series.len()],
                found: vec![preds.ncols(), preds.nrows() + p],
            },
        )?;
        let mixing = self.mixing_matrix(theta)?;
        let history = Array2::from_shape_fn((mixing.len(), 1), |(r, _)| {
            mixing[[r / self.n_nodes(), r % self.n_nodes()]]
        });
        ForecastBundle::new(observed, forecast, history)
    }

    // ---- Helper Methods ----

    fn fitted(&self) -> MixingResult<&OptimOutcome> {
        self.outcome.as_ref().ok_or(MixingError::ModelNotFitted)
    }

    fn raw_mixing(&self, theta: &Theta) -> Array2<f64> {
        let n = self.n_nodes();
        let flat = self.basis.g().dot(&theta.mapv(|w| w * w));
        Array2::from_shape_fn((n, n), |(i, j)| flat[i * n + j])
    }

    fn normalize(&self, raw: &Array2<f64>) -> Array2<f64> {
        match self.normalization {
            Normalization::Identity => raw.clone(),
            Normalization::MinMax => min_max_scale(raw),
            Normalization::RowSoftmax => row_softmax(raw),
        }
    }
}

impl LossFunction for StationaryMixingModel {
    type Data = WindowSet;

    fn value(&self, theta: &Theta, data: &WindowSet) -> OptResult<Loss> {
        let mixing = self.normalize(&self.raw_mixing(theta));
        let preds = summed_inputs(data).dot(&mixing.t());
        let diff = &preds - &data.targets;
        Ok(diff.mapv(|x| x * x).mean().unwrap_or(0.0))
    }

    fn check(&self, theta: &Theta, data: &WindowSet) -> OptResult<()> {
        validate_theta(theta, self.n_basis())?;
        if data.n_nodes() != self.n_nodes() {
            return Err(OptError::Model(Box::new(MixingError::DimensionMismatch {
                what: "window nodes",
                expected: vec![self.n_nodes()],
                found: vec![data.n_nodes()],
            })));
        }
        Ok(())
    }

    fn grad(&self, theta: &Theta, data: &WindowSet) -> OptResult<Grad> {
        if self.normalization == Normalization::MinMax {
            return Err(OptError::GradientNotImplemented);
        }
        let raw = self.raw_mixing(theta);
        let mixing = self.normalize(&raw);
        let xsum = summed_inputs(data);
        let preds = xsum.dot(&mixing.t());
        let denom = (data.len() * self.n_nodes()) as f64;
        let residual = (&preds - &data.targets).mapv(|r| 2.0 * r / denom);

        let grad_mixing = residual.t().dot(&xsum);
        let grad_raw = match self.normalization {
            Normalization::RowSoftmax => row_softmax_backward(&mixing, &grad_mixing),
            _ => grad_mixing,
        };
        let grad_flat: Array1<f64> = grad_raw.iter().copied().collect();
        let grad_sq = self.basis.g().t().dot(&grad_flat);
        Ok(theta.mapv(|w| 2.0 * w) * grad_sq)
    }
}

/// History columns summed per node: `S × N`.
fn summed_inputs(windows: &WindowSet) -> Array2<f64> {
    windows.inputs.sum_axis(Axis(2))
}
