//! training — minibatch training, checkpoint gating and rolling forecasts
//! for [`MixingModel`](crate::mixing::models::MixingModel).
//!
//! Purpose
//! -------
//! Drive the non-stationary model through its lifecycle: fit on an observed
//! window ([`Trainer`]), persist the best state ([`CheckpointGate`]), then
//! extend past the window while re-fitting on its own predictions
//! ([`RollingForecaster`]).
//!
//! Conventions
//! -----------
//! - Progress is reported through `tracing` events only; no subscriber is
//!   installed here.
//! - Epoch indices are 1-based in records and checkpoints.

pub mod gate;
pub mod rolling;
pub mod trainer;

pub use self::gate::{CheckpointGate, GateDecision};
pub use self::rolling::{
    rolling_forecast, self_distillation_retrain, RollingForecaster, RollingReport,
};
pub use self::trainer::{train, EpochRecord, TrainReport, Trainer};
