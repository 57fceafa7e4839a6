//! Mixing options — configuration for training and rolling forecasts.
//!
//! Purpose
//! -------
//! Collect every knob of the two workflows in plain, validated structs so
//! runs are explicit and reproducible:
//!
//! - [`ModelConfig`]: shape constraint, knot policy, weight initialization.
//! - [`TrainOptions`]: window length, batching, epochs, optimizer,
//!   validation policy, early stopping, and the RNG seed.
//! - [`ForecastOptions`]: training-window size, forecast horizon, retrain
//!   burst length, retrain optimizer, and history source.
//!
//! Invariants & assumptions
//! ------------------------
//! - `validate()` checks every field that can be checked without data;
//!   data-dependent checks (held-out size vs. sample count, window vs.
//!   series length) happen where the data is first seen.
//! - Defaults mirror the original experiment drivers.
//!
//! Testing notes
//! -------------
//! - Unit tests pin the documented defaults and every rejection path.
use serde::{Deserialize, Serialize};

use crate::{
    mixing::{
        core::{basis::KnotPolicy, init::WeightInit, shape::ShapeConstraint},
        errors::{MixingError, MixingResult},
    },
    optimization::gradient_descent::OptimizerKind,
};

/// Structural choices for a mixing model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub shape: ShapeConstraint,
    pub knots: KnotPolicy,
    pub init: WeightInit,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            shape: ShapeConstraint::ConcaveInc,
            knots: KnotPolicy::OrderStatistics,
            init: WeightInit::XavierNormal,
        }
    }
}

/// Where the validation loss that drives checkpointing comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationPolicy {
    /// The last `size` samples are held out; validation loss is their
    /// prediction MSE after each epoch.
    HeldOut { size: usize },
    /// Validation loss is the epoch mean of the mixing-tensor MSE against a
    /// caller-supplied reference. All samples train.
    ReferenceMixing,
}

/// What happens when the validation loss fails to improve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarlyStopping {
    /// Stop at the first epoch whose loss is worse than the best so far.
    BreakOnRegression,
    /// Stop after `n` consecutive epochs without strict improvement.
    Patience(usize),
    /// Keep the best checkpoint and run every epoch.
    Never,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// History length `p`.
    pub window: usize,
    pub batch_size: usize,
    pub epochs: usize,
    pub optimizer: OptimizerKind,
    /// Shuffle training sample ids each epoch (seeded).
    pub shuffle: bool,
    pub validation: ValidationPolicy,
    pub early_stopping: EarlyStopping,
    pub model: ModelConfig,
    pub seed: u64,
}

impl TrainOptions {
    /// Defaults with an explicit window and seed.
    pub fn new(window: usize, seed: u64) -> MixingResult<Self> {
        let opts = Self { window, seed, ..Self::default() };
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// - [`MixingError::InvalidOption`] for a zero window, batch size, epoch
    ///   count, held-out size, or patience.
    /// - [`MixingError::Optimization`] for invalid optimizer hyper-parameters.
    pub fn validate(&self) -> MixingResult<()> {
        verify_positive("window", self.window)?;
        verify_positive("batch_size", self.batch_size)?;
        verify_positive("epochs", self.epochs)?;
        if let ValidationPolicy::HeldOut { size } = self.validation {
            verify_positive("held_out", size)?;
        }
        if let EarlyStopping::Patience(n) = self.early_stopping {
            verify_positive("patience", n)?;
        }
        self.optimizer.validate()?;
        Ok(())
    }
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            window: 1,
            batch_size: 300,
            epochs: 1000,
            optimizer: OptimizerKind::Sgd { learning_rate: 0.01, momentum: 0.0 },
            shuffle: false,
            validation: ValidationPolicy::HeldOut { size: 50 },
            early_stopping: EarlyStopping::BreakOnRegression,
            model: ModelConfig::default(),
            seed: 0,
        }
    }
}

/// Source of history values beyond the training window during rolling
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistorySource {
    /// Use the loop's own predictions.
    #[default]
    Autoregressive,
    /// Use observations while they exist, predictions after.
    Observed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOptions {
    /// Training-window length; also the number of weight time slices.
    pub train_size: usize,
    /// Steps to forecast beyond the training window.
    pub until: usize,
    pub window: usize,
    /// Full-batch epochs per self-distillation retrain.
    pub retrain_epochs: usize,
    /// Optimizer used for retraining when the checkpoint's optimizer is of a
    /// different kind.
    pub optimizer: OptimizerKind,
    pub history: HistorySource,
}

impl ForecastOptions {
    /// # Errors
    /// - [`MixingError::InvalidOption`] for a zero window.
    /// - [`MixingError::InvalidWindow`] if `train_size ≤ window`.
    /// - [`MixingError::Optimization`] for invalid optimizer hyper-parameters.
    pub fn validate(&self) -> MixingResult<()> {
        verify_positive("window", self.window)?;
        if self.train_size <= self.window {
            return Err(MixingError::InvalidWindow {
                window: self.window,
                len: self.train_size,
                reason: "Training window must be longer than the history window.",
            });
        }
        self.optimizer.validate()?;
        Ok(())
    }

    /// Number of predictions the loop must produce before it is done.
    pub fn target_predictions(&self) -> usize {
        self.until + self.train_size - self.window
    }
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            train_size: 300,
            until: 200,
            window: 1,
            retrain_epochs: 100,
            optimizer: OptimizerKind::RmsProp { learning_rate: 0.01, alpha: 0.99, epsilon: 1e-8 },
            history: HistorySource::Autoregressive,
        }
    }
}

// ---- Helper Methods ----

fn verify_positive(name: &'static str, value: usize) -> MixingResult<()> {
    if value == 0 {
        return Err(MixingError::InvalidOption { name, value, reason: "Must be at least 1." });
    }
    Ok(())
}
