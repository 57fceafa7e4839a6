//! loss_optimizer::types — shared numeric aliases and solver wiring.
//!
//! Purpose
//! -------
//! Centralize the numeric types and L-BFGS aliases used by the full-batch
//! loss optimizer so the rest of the layer stays agnostic to `ndarray` and
//! Argmin generics.
//!
//! Conventions
//! -----------
//! - `Theta` and `Grad` are flat parameter/gradient vectors of equal length.
//! - `Loss` is the scalar objective being **minimized** (no sign flips).
//! - The line-search aliases assume Argmin's `(Param, Gradient, Float)`
//!   three-parameter forms as of the pinned Argmin version.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::Array1;
use std::collections::HashMap;

/// Flat parameter vector `θ`.
pub type Theta = Array1<f64>;

/// Gradient `∇L(θ)`, same shape as [`Theta`].
pub type Grad = Array1<f64>;

/// Scalar objective value.
pub type Loss = f64;

/// Function-evaluation counters as reported by the solver
/// (e.g. `"cost_count"`, `"gradient_count"`).
pub type FnEvalMap = HashMap<String, u64>;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Loss>;

pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Loss>;

/// L-BFGS solver wired to the Hager–Zhang line search.
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Loss>;

/// L-BFGS solver wired to the More–Thuente line search.
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Loss>;
