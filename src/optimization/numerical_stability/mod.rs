//! numerical_stability — guarded normalizations for mixing matrices.
//!
//! The stationary mixing model optionally normalizes its operator before
//! prediction. The transforms here keep that step well-conditioned in
//! `f64` (max-shifted softmax, guarded min–max range) and provide the
//! backward pass needed for analytic gradients.
pub mod transformations;

pub use self::transformations::{min_max_scale, row_softmax, row_softmax_backward, RANGE_EPS};
