//! models — stationary and non-stationary spatial mixing models.
//!
//! - [`MixingModel`]: one shape-constrained operator per time slice, trained
//!   by minibatch gradient descent in [`crate::mixing::training`].
//! - [`StationaryMixingModel`]: one time-invariant operator with optional
//!   normalization, fitted full-batch through the
//!   [`LossFunction`](crate::optimization::loss_optimizer::LossFunction) seam.

pub mod mixing;
pub mod stationary;

pub use self::mixing::MixingModel;
pub use self::stationary::{Normalization, StationaryMixingModel};
