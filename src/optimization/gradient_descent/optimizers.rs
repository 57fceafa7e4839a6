//! First-order stochastic optimizers (SGD with momentum, RMSprop, Adam).
//!
//! Purpose
//! -------
//! Update a dense parameter matrix in place from a minibatch gradient while
//! carrying per-parameter state across steps. The state is `serde`-friendly
//! so training checkpoints can persist and resume it exactly.
//!
//! Key behaviors
//! -------------
//! - [`OptimizerKind`] holds validated hyper-parameters; constructors reject
//!   non-finite or non-positive learning rates and coefficients outside
//!   `[0, 1)`.
//! - [`GradientOptimizer::step`] applies one update and lazily allocates its
//!   buffers on the first call.
//!
//! Conventions
//! -----------
//! - Updates follow PyTorch's formulations so learning rates transfer from
//!   the original experiments:
//!   - SGD: `v = μ·v + g`, `θ -= lr·v` (plain `θ -= lr·g` when `μ = 0`).
//!   - RMSprop: `s = α·s + (1 − α)·g²`, `θ -= lr·g / (√s + ε)`.
//!   - Adam: bias-corrected first/second moments, `θ -= lr·m̂ / (√v̂ + ε)`.
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::optimization::errors::{OptError, OptResult};

/// Hyper-parameters of a first-order optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OptimizerKind {
    Sgd { learning_rate: f64, momentum: f64 },
    RmsProp { learning_rate: f64, alpha: f64, epsilon: f64 },
    Adam { learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64 },
}

impl OptimizerKind {
    /// Plain SGD (no momentum).
    pub fn sgd(learning_rate: f64) -> OptResult<Self> {
        Self::sgd_with_momentum(learning_rate, 0.0)
    }

    pub fn sgd_with_momentum(learning_rate: f64, momentum: f64) -> OptResult<Self> {
        verify_learning_rate(learning_rate)?;
        verify_coefficient("momentum", momentum)?;
        Ok(OptimizerKind::Sgd { learning_rate, momentum })
    }

    /// RMSprop with `alpha = 0.99`, `epsilon = 1e-8`.
    pub fn rms_prop(learning_rate: f64) -> OptResult<Self> {
        verify_learning_rate(learning_rate)?;
        Ok(OptimizerKind::RmsProp { learning_rate, alpha: 0.99, epsilon: 1e-8 })
    }

    /// Adam with `beta1 = 0.9`, `beta2 = 0.999`, `epsilon = 1e-8`.
    pub fn adam(learning_rate: f64) -> OptResult<Self> {
        Self::adam_with(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn adam_with(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> OptResult<Self> {
        verify_learning_rate(learning_rate)?;
        verify_coefficient("beta1", beta1)?;
        verify_coefficient("beta2", beta2)?;
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(OptError::InvalidCoefficient {
                name: "epsilon",
                value: epsilon,
                reason: "Epsilon must be finite and positive.",
            });
        }
        Ok(OptimizerKind::Adam { learning_rate, beta1, beta2, epsilon })
    }

    pub fn learning_rate(&self) -> f64 {
        match *self {
            OptimizerKind::Sgd { learning_rate, .. }
            | OptimizerKind::RmsProp { learning_rate, .. }
            | OptimizerKind::Adam { learning_rate, .. } => learning_rate,
        }
    }

    /// Re-check the hyper-parameters; used when options were built with
    /// struct-literal syntax instead of the constructors.
    pub fn validate(&self) -> OptResult<()> {
        match *self {
            OptimizerKind::Sgd { learning_rate, momentum } => {
                Self::sgd_with_momentum(learning_rate, momentum).map(|_| ())
            }
            OptimizerKind::RmsProp { learning_rate, alpha, epsilon } => {
                verify_learning_rate(learning_rate)?;
                verify_coefficient("alpha", alpha)?;
                if !(epsilon.is_finite() && epsilon > 0.0) {
                    return Err(OptError::InvalidCoefficient {
                        name: "epsilon",
                        value: epsilon,
                        reason: "Epsilon must be finite and positive.",
                    });
                }
                Ok(())
            }
            OptimizerKind::Adam { learning_rate, beta1, beta2, epsilon } => {
                Self::adam_with(learning_rate, beta1, beta2, epsilon).map(|_| ())
            }
        }
    }

    fn fresh_state(&self) -> OptimizerState {
        match self {
            OptimizerKind::Sgd { .. } => OptimizerState::Sgd { velocity: None },
            OptimizerKind::RmsProp { .. } => OptimizerState::RmsProp { square_avg: None },
            OptimizerKind::Adam { .. } => OptimizerState::Adam { m: None, v: None, t: 0 },
        }
    }
}

/// Per-parameter optimizer buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptimizerState {
    Sgd { velocity: Option<Array2<f64>> },
    RmsProp { square_avg: Option<Array2<f64>> },
    Adam { m: Option<Array2<f64>>, v: Option<Array2<f64>>, t: u64 },
}

/// Optimizer for in-place parameter updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientOptimizer {
    kind: OptimizerKind,
    state: OptimizerState,
}

impl GradientOptimizer {
    pub fn new(kind: OptimizerKind) -> Self {
        let state = kind.fresh_state();
        Self { kind, state }
    }

    pub fn kind(&self) -> &OptimizerKind {
        &self.kind
    }

    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    /// Drop all accumulated buffers, keeping the hyper-parameters.
    pub fn reset(&mut self) {
        self.state = self.kind.fresh_state();
    }

    /// Apply one update to `params` from `grads`.
    ///
    /// # Errors
    /// - [`OptError::ParamShapeMismatch`] if the shapes differ, or if a
    ///   buffer restored from a checkpoint has a different shape.
    /// - [`OptError::StateMismatch`] if the state variant does not belong to
    ///   the optimizer kind.
    pub fn step(&mut self, params: &mut Array2<f64>, grads: &Array2<f64>) -> OptResult<()> {
        if params.shape() != grads.shape() {
            return Err(OptError::ParamShapeMismatch {
                params: params.shape().to_vec(),
                grads: grads.shape().to_vec(),
            });
        }
        match (&self.kind, &mut self.state) {
            (OptimizerKind::Sgd { learning_rate, momentum }, OptimizerState::Sgd { velocity }) => {
                if *momentum == 0.0 {
                    params.scaled_add(-*learning_rate, grads);
                    return Ok(());
                }
                let v = buffer(velocity, grads)?;
                Zip::from(&mut *v).and(grads).for_each(|v, &g| *v = *momentum * *v + g);
                params.scaled_add(-*learning_rate, v);
                Ok(())
            }
            (
                OptimizerKind::RmsProp { learning_rate, alpha, epsilon },
                OptimizerState::RmsProp { square_avg },
            ) => {
                let s = buffer(square_avg, grads)?;
                Zip::from(&mut *params).and(&mut *s).and(grads).for_each(|p, s, &g| {
                    *s = *alpha * *s + (1.0 - *alpha) * g * g;
                    *p -= *learning_rate * g / (s.sqrt() + *epsilon);
                });
                Ok(())
            }
            (
                OptimizerKind::Adam { learning_rate, beta1, beta2, epsilon },
                OptimizerState::Adam { m, v, t },
            ) => {
                let m = buffer(m, grads)?;
                let v = buffer(v, grads)?;
                *t += 1;
                let bias1 = 1.0 - beta1.powi(*t as i32);
                let bias2 = 1.0 - beta2.powi(*t as i32);
                Zip::from(&mut *params).and(&mut *m).and(&mut *v).and(grads).for_each(
                    |p, m, v, &g| {
                        *m = *beta1 * *m + (1.0 - *beta1) * g;
                        *v = *beta2 * *v + (1.0 - *beta2) * g * g;
                        let m_hat = *m / bias1;
                        let v_hat = *v / bias2;
                        *p -= *learning_rate * m_hat / (v_hat.sqrt() + *epsilon);
                    },
                );
                Ok(())
            }
            _ => Err(OptError::StateMismatch),
        }
    }
}

// ---- Helper Methods ----

fn buffer<'a>(
    slot: &'a mut Option<Array2<f64>>, grads: &Array2<f64>,
) -> OptResult<&'a mut Array2<f64>> {
    let buf = slot.get_or_insert_with(|| Array2::zeros(grads.raw_dim()));
    if buf.shape() != grads.shape() {
        return Err(OptError::ParamShapeMismatch {
            params: buf.shape().to_vec(),
            grads: grads.shape().to_vec(),
        });
    }
    Ok(buf)
}

fn verify_learning_rate(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::InvalidLearningRate { value, reason: "Learning rate must be finite." });
    }
    if value <= 0.0 {
        return Err(OptError::InvalidLearningRate {
            value,
            reason: "Learning rate must be positive.",
        });
    }
    Ok(())
}

fn verify_coefficient(name: &'static str, value: f64) -> OptResult<()> {
    if !(value.is_finite() && (0.0..1.0).contains(&value)) {
        return Err(OptError::InvalidCoefficient {
            name,
            value,
            reason: "Coefficient must lie in [0, 1).",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn constructors_reject_bad_hyper_parameters() {
        assert!(matches!(OptimizerKind::sgd(0.0), Err(OptError::InvalidLearningRate { .. })));
        assert!(matches!(OptimizerKind::adam(f64::NAN), Err(OptError::InvalidLearningRate { .. })));
        assert!(matches!(
            OptimizerKind::sgd_with_momentum(0.1, 1.0),
            Err(OptError::InvalidCoefficient { name: "momentum", .. })
        ));
    }

    #[test]
    fn plain_sgd_moves_against_the_gradient() {
        let mut opt = GradientOptimizer::new(OptimizerKind::sgd(0.5).unwrap());
        let mut params = array![[1.0, -1.0]];
        opt.step(&mut params, &array![[2.0, -4.0]]).unwrap();
        assert_relative_eq!(params[[0, 0]], 0.0);
        assert_relative_eq!(params[[0, 1]], 1.0);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut opt = GradientOptimizer::new(OptimizerKind::sgd_with_momentum(1.0, 0.5).unwrap());
        let mut params = array![[0.0]];
        let g = array![[1.0]];
        opt.step(&mut params, &g).unwrap();
        opt.step(&mut params, &g).unwrap();
        // v1 = 1, v2 = 0.5 + 1 = 1.5
        assert_relative_eq!(params[[0, 0]], -2.5);
    }

    #[test]
    fn adam_first_step_has_magnitude_close_to_learning_rate() {
        let mut opt = GradientOptimizer::new(OptimizerKind::adam(0.01).unwrap());
        let mut params = array![[1.0, 1.0]];
        opt.step(&mut params, &array![[3.0, -0.2]]).unwrap();
        assert_relative_eq!(params[[0, 0]], 0.99, epsilon = 1e-6);
        assert_relative_eq!(params[[0, 1]], 1.01, epsilon = 1e-6);
    }

    #[test]
    fn rms_prop_first_step_scales_by_root_mean_square() {
        let mut opt = GradientOptimizer::new(OptimizerKind::rms_prop(0.01).unwrap());
        let mut params = array![[0.0]];
        opt.step(&mut params, &array![[2.0]]).unwrap();
        // s = 0.01 * 4 = 0.04, step = 0.01 * 2 / 0.2 = 0.1
        assert_relative_eq!(params[[0, 0]], -0.1, epsilon = 1e-6);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut opt = GradientOptimizer::new(OptimizerKind::adam(0.01).unwrap());
        let mut params = Array2::zeros((2, 2));
        let err = opt.step(&mut params, &Array2::zeros((2, 3))).unwrap_err();
        assert!(matches!(err, OptError::ParamShapeMismatch { .. }));
    }

    #[test]
    fn reset_clears_buffers() {
        let mut opt = GradientOptimizer::new(OptimizerKind::adam(0.01).unwrap());
        let mut params = array![[1.0]];
        opt.step(&mut params, &array![[1.0]]).unwrap();
        opt.reset();
        assert_eq!(opt.state(), &OptimizerState::Adam { m: None, v: None, t: 0 });
    }
}
