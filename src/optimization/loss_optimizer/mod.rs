//! loss_optimizer — argmin-powered full-batch loss minimizer.
//!
//! Purpose
//! -------
//! Provide an L-BFGS layer for models whose parameters are fitted in one
//! full-batch solve (the stationary mixing model). Callers implement
//! [`LossFunction`] and invoke [`minimize`].
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] exposes a [`LossFunction`] to argmin as
//!   `CostFunction` + `Gradient`, falling back to finite differences when no
//!   analytic gradient exists.
//! - [`minimize`] validates the initial guess with [`LossFunction::check`],
//!   selects a solver via [`builders`], executes it via [`run::run_lbfgs`]
//!   and normalizes the result into an [`OptimOutcome`].
//! - [`finite_diff::check_gradient`] cross-checks analytic gradients.
//!
//! Invariants & assumptions
//! ------------------------
//! - The objective is minimized directly; there are no sign conventions to
//!   keep track of.
//! - [`LossFunction::value`] and [`LossFunction::grad`] report invalid
//!   inputs as [`OptError`](crate::optimization::errors::OptError) values,
//!   never panics.
//! - [`Tolerances`] and [`LossOptions`] are validated on construction.
//!
//! Testing notes
//! -------------
//! - Submodule tests cover gradient pass-through and FD fallback
//!   ([`adapter`]), builder wiring ([`builders`]), FD helpers
//!   ([`finite_diff`]), and configuration / outcome invariants
//!   ([`traits`], [`validation`]).
//! - The stationary model's tests exercise [`minimize`] end to end.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::minimize;
pub use self::finite_diff::check_gradient;
pub use self::traits::{LineSearcher, LossFunction, LossOptions, OptimOutcome, Tolerances};
pub use self::types::{FnEvalMap, Grad, Loss, Theta, DEFAULT_LBFGS_MEM};

pub mod prelude {
    pub use super::api::minimize;
    pub use super::traits::{LineSearcher, LossFunction, LossOptions, OptimOutcome, Tolerances};
    pub use super::types::{Grad, Loss, Theta};
}
