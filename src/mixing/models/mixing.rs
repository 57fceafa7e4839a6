//! Non-stationary mixing model — one shape-constrained `N × N` operator per
//! time slice.
//!
//! Purpose
//! -------
//! Hold the fixed basis `g` (`N² × K`) and the learned weight tensor `W`
//! (`K × T`), and provide the forward pass and the analytic MSE gradient that
//! the training and rolling-forecast loops drive.
//!
//! Key behaviors
//! -------------
//! - `F = g · (W ∘ W)` (`N² × T`); slice `t` reshaped row-major gives
//!   `A_t[i, j] = F[i·N + j, t]`.
//! - Prediction for sample `s` with history times `τ(s, k)`:
//!   `pred[s, i] = Σ_k Σ_j A_{τ(s,k)}[i, j] · x[s, j, k]`.
//! - [`MixingModel::loss_and_grad`] returns the MSE over `|ids| · N` entries
//!   and `∂L/∂W = 2W ∘ gᵀ · ∂L/∂F`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `g ≥ 0` and weights enter squared, so every mixing entry is
//!   non-negative for any `W`.
//! - The basis never changes after construction; only `W` is updated, and
//!   only by an external optimizer step through [`MixingModel::weights_mut`].
//! - Evaluation has no side effects.
//!
//! Conventions
//! -----------
//! - Inputs are `S × N × p` (sample, node, history position oldest first);
//!   time indices are `S × p`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the forward pass on hand-computed values, rejection of
//!   out-of-range slices, non-negativity for negative weights, and the
//!   analytic gradient against central differences.
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3};
use rand::Rng;

use crate::mixing::{
    core::{
        basis::BasisMatrix, checkpoint::Checkpoint, init::WeightInit, windows::WindowSet,
    },
    errors::{MixingError, MixingResult},
};

#[derive(Debug, Clone, PartialEq)]
pub struct MixingModel {
    basis: BasisMatrix,
    weights: Array2<f64>,
}

impl MixingModel {
    /// Fresh model with `n_slices` time slices and weights drawn by `init`.
    pub fn new<R: Rng + ?Sized>(
        basis: BasisMatrix, n_slices: usize, init: WeightInit, rng: &mut R,
    ) -> MixingResult<Self> {
        let weights = init.sample(basis.n_basis(), n_slices, rng)?;
        Ok(Self { basis, weights })
    }

    /// # Errors
    /// [`MixingError::DimensionMismatch`] if `weights` does not have `K` rows,
    /// or has no columns.
    pub fn from_weights(basis: BasisMatrix, weights: Array2<f64>) -> MixingResult<Self> {
        if weights.nrows() != basis.n_basis() || weights.ncols() == 0 {
            return Err(MixingError::DimensionMismatch {
                what: "weight tensor",
                expected: vec![basis.n_basis(), weights.ncols().max(1)],
                found: weights.shape().to_vec(),
            });
        }
        Ok(Self { basis, weights })
    }

    /// Rebuild a model from a training checkpoint.
    ///
    /// # Errors
    /// [`MixingError::CheckpointMismatch`] if the checkpoint was written for a
    /// different node count, basis size, shape or knot layout.
    pub fn from_checkpoint(basis: BasisMatrix, ckpt: &Checkpoint) -> MixingResult<Self> {
        ckpt.verify_dims(&basis, ckpt.n_slices())?;
        Self::from_weights(basis, ckpt.weights.clone())
    }

    pub fn n_nodes(&self) -> usize {
        self.basis.n_nodes()
    }

    /// Number of time slices `T`.
    pub fn n_slices(&self) -> usize {
        self.weights.ncols()
    }

    pub fn n_basis(&self) -> usize {
        self.weights.nrows()
    }

    pub fn basis(&self) -> &BasisMatrix {
        &self.basis
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.weights.view()
    }

    pub(crate) fn weights_mut(&mut self) -> &mut Array2<f64> {
        &mut self.weights
    }

    /// `F = g · (W ∘ W)`, shape `N² × T`.
    pub fn flat_mixing(&self) -> Array2<f64> {
        self.basis.g().dot(&self.weights.mapv(|w| w * w))
    }

    /// Mixing matrices as a `T × N × N` tensor.
    pub fn mixing_tensor(&self) -> Array3<f64> {
        let n = self.n_nodes();
        let flat = self.flat_mixing();
        Array3::from_shape_fn((self.n_slices(), n, n), |(t, i, j)| flat[[i * n + j, t]])
    }

    /// Forward pass over a batch of windows.
    ///
    /// Returns `(predictions[S, N], F[N², T])`.
    ///
    /// # Errors
    /// - [`MixingError::DimensionMismatch`] if `inputs` is not `S × N × p` or
    ///   `time_indices` is not `S × p`.
    /// - [`MixingError::TimeIndexOutOfRange`] for any index `≥ T`.
    pub fn evaluate(
        &self, inputs: ArrayView3<'_, f64>, time_indices: ArrayView2<'_, usize>,
    ) -> MixingResult<(Array2<f64>, Array2<f64>)> {
        self.check_batch(inputs, time_indices)?;
        let flat = self.flat_mixing();
        let n_samples = inputs.shape()[0];
        let mut preds = Array2::zeros((n_samples, self.n_nodes()));
        for s in 0..n_samples {
            let x = inputs.index_axis(ndarray::Axis(0), s);
            let taus = time_indices.row(s);
            preds.row_mut(s).assign(&mix_history(flat.view(), self.n_nodes(), x, taus));
        }
        Ok((preds, flat))
    }

    /// One-step prediction from an `N × p` history using precomputed `F`.
    ///
    /// # Errors
    /// Same as [`MixingModel::evaluate`].
    pub fn predict_with(
        &self, flat: ArrayView2<'_, f64>, history: ArrayView2<'_, f64>, slices: &[usize],
    ) -> MixingResult<Array1<f64>> {
        let n = self.n_nodes();
        if flat.dim() != (n * n, self.n_slices()) {
            return Err(MixingError::DimensionMismatch {
                what: "mixing matrix",
                expected: vec![n * n, self.n_slices()],
                found: flat.shape().to_vec(),
            });
        }
        if history.nrows() != n || history.ncols() != slices.len() {
            return Err(MixingError::DimensionMismatch {
                what: "history window",
                expected: vec![n, slices.len()],
                found: history.shape().to_vec(),
            });
        }
        if let Some(&index) = slices.iter().find(|&&t| t >= self.n_slices()) {
            return Err(MixingError::TimeIndexOutOfRange { index, slices: self.n_slices() });
        }
        Ok(mix_history(flat, n, history, ArrayView1::from(slices)))
    }

    /// Prediction MSE over the selected samples.
    pub fn loss(&self, windows: &WindowSet, ids: &[usize]) -> MixingResult<f64> {
        let batch = self.batch(windows, ids)?;
        let (preds, _) = self.evaluate(batch.inputs.view(), batch.input_indices.view())?;
        Ok(mse(&preds, &batch.targets))
    }

    /// Prediction MSE over the selected samples and its gradient w.r.t. `W`.
    ///
    /// # Errors
    /// - [`MixingError::InvalidOption`] for an empty or out-of-range `ids`.
    /// - Errors from [`MixingModel::evaluate`].
    pub fn loss_and_grad(
        &self, windows: &WindowSet, ids: &[usize],
    ) -> MixingResult<(f64, Array2<f64>)> {
        let batch = self.batch(windows, ids)?;
        let (preds, _) = self.evaluate(batch.inputs.view(), batch.input_indices.view())?;
        let n = self.n_nodes();
        let denom = (batch.len() * n) as f64;
        let residual = (&preds - &batch.targets).mapv(|r| 2.0 * r / denom);
        let loss = mse(&preds, &batch.targets);

        let mut grad_flat = Array2::<f64>::zeros((n * n, self.n_slices()));
        for s in 0..batch.len() {
            for (k, &tau) in batch.input_indices.row(s).iter().enumerate() {
                for i in 0..n {
                    let r = residual[[s, i]];
                    if r == 0.0 {
                        continue;
                    }
                    for j in 0..n {
                        grad_flat[[i * n + j, tau]] += r * batch.inputs[[s, j, k]];
                    }
                }
            }
        }
        let grad_sq = self.basis.g().t().dot(&grad_flat);
        let grad = &self.weights.mapv(|w| 2.0 * w) * &grad_sq;
        Ok((loss, grad))
    }

    /// MSE between `F` and a reference `N² × T` mixing tensor. Diagnostic only.
    ///
    /// # Errors
    /// [`MixingError::DimensionMismatch`] on shape disagreement.
    pub fn mixing_loss(&self, reference: ArrayView2<'_, f64>) -> MixingResult<f64> {
        let flat = self.flat_mixing();
        if reference.dim() != flat.dim() {
            return Err(MixingError::DimensionMismatch {
                what: "reference mixing tensor",
                expected: flat.shape().to_vec(),
                found: reference.shape().to_vec(),
            });
        }
        Ok(mse(&flat, &reference.to_owned()))
    }

    // ---- Helper Methods ----

    fn batch(&self, windows: &WindowSet, ids: &[usize]) -> MixingResult<WindowSet> {
        if ids.is_empty() {
            return Err(MixingError::InvalidOption {
                name: "batch",
                value: 0,
                reason: "A batch needs at least one sample.",
            });
        }
        windows.select(ids)
    }

    fn check_batch(
        &self, inputs: ArrayView3<'_, f64>, time_indices: ArrayView2<'_, usize>,
    ) -> MixingResult<()> {
        let (s, n, p) = inputs.dim();
        if n != self.n_nodes() || time_indices.dim() != (s, p) {
            return Err(MixingError::DimensionMismatch {
                what: "window batch",
                expected: vec![s, self.n_nodes(), p],
                found: vec![s, n, time_indices.ncols()],
            });
        }
        if let Some(&index) = time_indices.iter().find(|&&t| t >= self.n_slices()) {
            return Err(MixingError::TimeIndexOutOfRange { index, slices: self.n_slices() });
        }
        Ok(())
    }
}

/// `Σ_k A_{τ_k} · x[:, k]` with `A_t[i, j] = F[i·N + j, t]`.
fn mix_history(
    flat: ArrayView2<'_, f64>, n: usize, x: ArrayView2<'_, f64>, taus: ArrayView1<'_, usize>,
) -> Array1<f64> {
    let mut out = Array1::zeros(n);
    for (k, &tau) in taus.iter().enumerate() {
        for i in 0..n {
            let mut acc = 0.0;
            for j in 0..n {
                acc += flat[[i * n + j, tau]] * x[[j, k]];
            }
            out[i] += acc;
        }
    }
    out
}

fn mse(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    let diff = a - b;
    diff.mapv(|x| x * x).mean().unwrap_or(0.0)
}
