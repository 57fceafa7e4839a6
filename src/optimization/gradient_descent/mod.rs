//! gradient_descent — stateful first-order optimizers for minibatch training.
//!
//! [`GradientOptimizer`] owns its hyper-parameters ([`OptimizerKind`]) and
//! the accumulated per-parameter buffers ([`OptimizerState`]); both are
//! serializable so a training checkpoint can resume an interrupted run
//! bit-for-bit.
pub mod optimizers;

pub use self::optimizers::{GradientOptimizer, OptimizerKind, OptimizerState};
