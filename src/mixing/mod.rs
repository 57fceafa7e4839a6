//! mixing — shape-constrained spatial mixing models for multivariate series.
//!
//! Purpose
//! -------
//! Model each node's next value as a non-negative mixture of recent values at
//! every node, with mixing weights that follow a monotone curve in pairwise
//! distance. Two variants share one basis transform:
//!
//! - [`MixingModel`]: one operator per time slice, trained by minibatch
//!   gradient descent and extended by a rolling self-distillation loop.
//! - [`StationaryMixingModel`]: one time-invariant operator fitted by L-BFGS.
//!
//! Key behaviors
//! -------------
//! - [`core`] validates inputs, builds the basis and persists artifacts.
//! - [`models`] evaluates predictions, losses and analytic gradients.
//! - [`training`] runs epochs, checkpoint gating and rolling forecasts.
//!
//! Invariants & assumptions
//! ------------------------
//! - Mixing entries are non-negative for all weights: the basis is
//!   non-negative and weights enter squared.
//! - All failures are [`MixingError`] values classified by
//!   [`MixingError::kind`]; none are retried.

pub mod core;
pub mod errors;
pub mod models;
pub mod training;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{ErrorKind, MixingError, MixingResult};
pub use self::models::{MixingModel, Normalization, StationaryMixingModel};
pub use self::training::{
    rolling_forecast, self_distillation_retrain, train, CheckpointGate, RollingForecaster,
    RollingReport, TrainReport, Trainer,
};

pub mod prelude {
    pub use super::core::prelude::*;
    pub use super::errors::{MixingError, MixingResult};
    pub use super::models::{MixingModel, Normalization, StationaryMixingModel};
    pub use super::training::{
        rolling_forecast, train, EpochRecord, RollingForecaster, RollingReport, TrainReport,
        Trainer,
    };
}
