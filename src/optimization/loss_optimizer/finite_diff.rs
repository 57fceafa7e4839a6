//! loss_optimizer::finite_diff — finite-difference gradients with error capture.
//!
//! Purpose
//! -------
//! Approximate gradients of a fallible scalar objective when no analytic
//! gradient exists, and cross-check analytic gradients against central
//! differences.
//!
//! Key behaviors
//! -------------
//! - [`run_fd_diff`] / [`run_central_diff`]: forward / central differences
//!   over a closure that cannot return `Result`. Errors raised inside the
//!   closure are parked in a shared `RefCell` (the closure returns `NaN`)
//!   and surfaced after differencing.
//! - [`check_gradient`]: evaluate a [`LossFunction`]'s analytic gradient and
//!   report its largest absolute deviation from central differences.
//!
//! Invariants & assumptions
//! ------------------------
//! - Returned gradients always satisfy [`validate_grad`].
//! - Any captured closure error wins over validation errors.
use crate::optimization::{
    errors::{OptError, OptResult},
    loss_optimizer::{
        traits::LossFunction,
        types::{Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Forward-difference gradient of `func` at `theta`.
///
/// Clears `closure_err` on entry; if `func` parked an error there while
/// differencing, that error is returned instead of the gradient.
///
/// # Errors
/// - Any error captured in `closure_err` (mapped via `From<Error>`).
/// - [`OptError::InvalidGradient`] if an entry is non-finite.
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}

/// Central-difference counterpart of [`run_fd_diff`].
///
/// # Errors
/// Same as [`run_fd_diff`].
pub fn run_central_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.central_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}

/// Largest absolute difference between `f.grad` and a central-difference
/// gradient of `f.value` at `theta`.
///
/// # Errors
/// - [`OptError::GradientNotImplemented`] if `f` has no analytic gradient.
/// - Any error from `f.value`/`f.grad` or gradient validation.
pub fn check_gradient<F: LossFunction>(f: &F, theta: &Theta, data: &F::Data) -> OptResult<f64> {
    let analytic = f.grad(theta, data)?;
    validate_grad(&analytic, theta.len())?;

    let closure_err: RefCell<Option<Error>> = RefCell::new(None);
    let func = |t: &Theta| -> f64 {
        match f.value(t, data) {
            Ok(v) => v,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e.into());
                }
                f64::NAN
            }
        }
    };
    let numeric = run_central_diff(theta, &func, &closure_err)?;
    let max_diff = analytic
        .iter()
        .zip(numeric.iter())
        .map(|(a, n)| (a - n).abs())
        .fold(0.0_f64, f64::max);
    if !max_diff.is_finite() {
        return Err(OptError::NonFiniteCost { value: max_diff });
    }
    Ok(max_diff)
}
