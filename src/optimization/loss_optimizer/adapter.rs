//! Adapter that exposes a [`LossFunction`] as an `argmin` problem.
//!
//! The objective is handed to argmin unchanged. Analytic gradients are
//! validated and passed through; without one the adapter differences the
//! cost closure, central first and forward as fallback.
use std::cell::RefCell;

use crate::optimization::{
    errors::OptError,
    loss_optimizer::{
        finite_diff::run_fd_diff,
        traits::LossFunction,
        types::{Grad, Loss, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// Bridges a [`LossFunction`] and its data to argmin's `CostFunction` and
/// `Gradient`.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LossFunction> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LossFunction> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }
}

impl<'a, F: LossFunction> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Loss;

    /// Evaluate `L(θ)`.
    ///
    /// # Errors
    /// - Propagates errors from `value`.
    /// - [`OptError::NonFiniteCost`] if the value is not finite.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let output = self.f.value(theta, self.data)?;
        if !output.is_finite() {
            return Err((OptError::NonFiniteCost { value: output }).into());
        }
        Ok(output)
    }
}

impl<'a, F: LossFunction> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Evaluate `∇L(θ)`.
    ///
    /// - Analytic gradient: validated and returned.
    /// - `GradientNotImplemented`: central differences of the cost; if a cost
    ///   evaluation failed during differencing or the result is not finite,
    ///   retry once with forward differences.
    ///
    /// The FD closure must return `f64`, so the first cost error is parked
    /// in `closure_err` and `NaN` is returned in its place.
    ///
    /// # Errors
    /// - Propagates errors from `grad` other than `GradientNotImplemented`.
    /// - Propagates cost errors raised during the forward-difference retry.
    /// - Validation errors for wrong dimension or non-finite entries.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        let dim = theta.len();
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, dim)?;
                Ok(g)
            }
            Err(OptError::GradientNotImplemented) => {
                let closure_err: RefCell<Option<Error>> = RefCell::new(None);
                let cost_func = |theta: &Theta| -> f64 {
                    match self.cost(theta) {
                        Ok(val) => val,
                        Err(e) => {
                            let mut slot = closure_err.borrow_mut();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            f64::NAN
                        }
                    }
                };
                let fd_grad = theta.central_diff(&cost_func);
                if closure_err.borrow().is_none() && validate_grad(&fd_grad, dim).is_ok() {
                    return Ok(fd_grad);
                }
                Ok(run_fd_diff(theta, &cost_func, &closure_err)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}
