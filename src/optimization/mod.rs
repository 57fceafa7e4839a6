//! optimization — solvers, numerical helpers, and the optimizer error surface.
//!
//! Purpose
//! -------
//! Provide the two optimization regimes used by the mixing models and a
//! single error/result surface for both:
//!
//! - [`gradient_descent`]: stateful minibatch optimizers (SGD, RMSprop,
//!   Adam) stepping a parameter matrix in place.
//! - [`loss_optimizer`]: argmin-backed L-BFGS for full-batch fits.
//! - [`numerical_stability`]: guarded normalizations with backward passes.
//! - [`errors`]: [`errors::OptError`] / [`errors::OptResult`].
//!
//! Conventions
//! -----------
//! - Objectives are minimized.
//! - Parameters are `ndarray` containers over `f64`; validation happens at
//!   construction boundaries so inner loops can assume finite inputs.
//! - Invalid states are reported as `OptError`, never panics.

pub mod errors;
pub mod gradient_descent;
pub mod loss_optimizer;
pub mod numerical_stability;
