//! core — shared data, basis, options, and persistence for mixing models.
//!
//! Purpose
//! -------
//! Collect the building blocks shared by the stationary and non-stationary
//! mixing models and their training loops: validated inputs, the
//! shape-constrained basis transform, sliding windows, weight
//! initialization, run configuration, and on-disk artifacts.
//!
//! Key behaviors
//! -------------
//! - Validate raw inputs once ([`Series`], [`DistanceVector`]) so downstream
//!   code can assume finite, well-shaped data.
//! - Build the fixed design matrix of a shape family ([`BasisMatrix`],
//!   [`ShapeConstraint`], [`KnotPolicy`]).
//! - Slice series into `(history, target)` samples ([`WindowSet`]).
//! - Describe runs ([`TrainOptions`], [`ForecastOptions`], [`ModelConfig`])
//!   and persist their results ([`Checkpoint`], [`ForecastBundle`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Distances are non-negative, so the basis is non-negative.
//! - Series are `N × T` with nodes on rows; distance vectors are row-major
//!   over node pairs.
//! - Artifacts are written atomically and carry a format version.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based throughout; window samples are ordered by the time
//!   of their first history column.
//! - This module does not log; logging lives in the training loops.

pub mod artifact;
pub mod basis;
pub mod checkpoint;
pub mod data;
pub mod forecasts;
pub mod init;
pub mod options;
pub mod shape;
pub mod windows;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::basis::{basis_function, BasisMatrix, KnotPolicy};
pub use self::checkpoint::Checkpoint;
pub use self::data::{DistanceVector, Series};
pub use self::forecasts::{overlap_mse, ForecastBundle};
pub use self::init::WeightInit;
pub use self::options::{
    EarlyStopping, ForecastOptions, HistorySource, ModelConfig, TrainOptions, ValidationPolicy,
};
pub use self::shape::ShapeConstraint;
pub use self::windows::WindowSet;

pub mod prelude {
    pub use super::basis::{BasisMatrix, KnotPolicy};
    pub use super::data::{DistanceVector, Series};
    pub use super::forecasts::ForecastBundle;
    pub use super::options::{
        EarlyStopping, ForecastOptions, HistorySource, ModelConfig, TrainOptions,
        ValidationPolicy,
    };
    pub use super::shape::ShapeConstraint;
    pub use super::windows::WindowSet;
}
