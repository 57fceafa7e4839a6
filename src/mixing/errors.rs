//! Errors for the spatial mixing stack (data validation, configuration,
//! checkpoint I/O, and numerical divergence during training).
//!
//! This module defines the model error type, [`MixingError`], used across the
//! Python-facing API and the internal Rust core. Every variant belongs to one
//! of three classes reported by [`MixingError::kind`]:
//!
//! - **InvalidConfiguration** — unknown shape identifiers, mismatched tensor
//!   dimensions, out-of-range options.
//! - **DataUnavailable** — missing or malformed checkpoints and artifacts.
//! - **NumericDivergence** — non-finite losses, gradients, or predictions.
//!
//! None of these are retried; all are terminal for the current run.
//!
//! ## Conventions
//! - **Indices are 0-based** (match Rust/NumPy).
//! - Series are `N × T` (rows = nodes, columns = time).
//! - Optimizer/backend errors are carried as [`MixingError::Optimization`].
#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, PyErr};
use std::path::PathBuf;
use thiserror::Error;

use crate::optimization::errors::OptError;

/// Crate-wide result alias for mixing-model operations.
pub type MixingResult<T> = Result<T, MixingError>;

/// Failure class of a [`MixingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    DataUnavailable,
    NumericDivergence,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MixingError {
    // ---- Input/data validation ----
    #[error("Input series is empty.")]
    EmptySeries,

    #[error("Series value at node {node}, time {time} is non-finite: {value}")]
    NonFiniteData { node: usize, time: usize, value: f64 },

    #[error("Distance vector must have length N^2 = {expected}; got {actual}")]
    DistanceLength { expected: usize, actual: usize },

    #[error("Distance at index {index} must be finite and non-negative; got {value}")]
    InvalidDistance { index: usize, value: f64 },

    #[error("Invalid scaling range ({lo}, {hi}): {reason}")]
    InvalidScaleRange { lo: f64, hi: f64, reason: &'static str },

    // ---- Configuration ----
    #[error("Unknown shape constraint '{name}'. Valid options are 'monotone_inc', 'concave_inc', 'convex_dec'.")]
    UnknownShape { name: String },

    #[error("Quantile knots must number at least 2; got {knots}")]
    InvalidKnots { knots: usize },

    #[error("Dimension mismatch for {what}: expected {expected:?}, found {found:?}")]
    DimensionMismatch { what: &'static str, expected: Vec<usize>, found: Vec<usize> },

    #[error("Window length {window} is invalid for a series of length {len}: {reason}")]
    InvalidWindow { window: usize, len: usize, reason: &'static str },

    #[error("Time index {index} is out of range for a model with {slices} time slices")]
    TimeIndexOutOfRange { index: usize, slices: usize },

    #[error("Invalid option '{name}' = {value}: {reason}")]
    InvalidOption { name: &'static str, value: usize, reason: &'static str },

    #[error("Invalid value for '{name}': {value}: {reason}")]
    InvalidValue { name: &'static str, value: f64, reason: &'static str },

    #[error("Validation policy requires a reference mixing tensor, but none was supplied")]
    MissingReference,

    #[error("Model hasn't been fitted yet.")]
    ModelNotFitted,

    // ---- Checkpoints / artifacts ----
    #[error("Checkpoint not found at {path:?}")]
    CheckpointNotFound { path: PathBuf },

    #[error("Malformed file at {path:?}: {reason}")]
    MalformedFile { path: PathBuf, reason: String },

    #[error("Checkpoint does not match the model: {reason}")]
    CheckpointMismatch { reason: String },

    #[error("I/O failure at {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    // ---- Numerical divergence ----
    #[error("Non-finite {what} loss at epoch {epoch}: {value}")]
    NonFiniteLoss { what: &'static str, epoch: usize, value: f64 },

    #[error("Non-finite gradient entry at ({row}, {col}) during epoch {epoch}: {value}")]
    NonFiniteGradient { epoch: usize, row: usize, col: usize, value: f64 },

    #[error("Non-finite prediction at step {step}, node {node}: {value}")]
    NonFinitePrediction { step: usize, node: usize, value: f64 },

    // ---- Estimation / optimizer ----
    #[error("Optimization failed: {0}")]
    Optimization(OptError),
}

impl MixingError {
    /// Classify this error into one of the three terminal failure classes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MixingError::CheckpointNotFound { .. }
            | MixingError::MalformedFile { .. }
            | MixingError::CheckpointMismatch { .. }
            | MixingError::Io { .. } => ErrorKind::DataUnavailable,
            MixingError::NonFiniteLoss { .. }
            | MixingError::NonFiniteGradient { .. }
            | MixingError::NonFinitePrediction { .. } => ErrorKind::NumericDivergence,
            MixingError::Optimization(err) => match err {
                OptError::NonFiniteCost { .. }
                | OptError::InvalidGradient { .. }
                | OptError::InvalidThetaHat { .. } => ErrorKind::NumericDivergence,
                OptError::Model(inner) => inner.kind(),
                _ => ErrorKind::InvalidConfiguration,
            },
            _ => ErrorKind::InvalidConfiguration,
        }
    }
}

impl From<OptError> for MixingError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::Model(inner) => *inner,
            other => MixingError::Optimization(other),
        }
    }
}

#[cfg(feature = "python-bindings")]
impl From<MixingError> for PyErr {
    fn from(err: MixingError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}
