//! Minibatch training loop for [`MixingModel`] with a checkpoint gate.
//!
//! Purpose
//! -------
//! Fit the non-stationary weight tensor to a series by repeated optimizer
//! steps over `(history, target)` windows, writing a resumable checkpoint
//! whenever the validation loss strictly improves.
//!
//! Key behaviors
//! -------------
//! - Training ids are split per [`ValidationPolicy`]; each epoch walks them in
//!   non-overlapping minibatches (optionally shuffled by the seeded
//!   generator) with one optimizer step per batch.
//! - When a reference mixing tensor is supplied, its MSE against `F` is
//!   computed before every step and reported as the epoch mean.
//! - After each epoch the [`CheckpointGate`] decides between save, hold and
//!   stop.
//! - A checkpoint already present at the path is loaded first and training
//!   continues from the epoch after it.
//!
//! Invariants & assumptions
//! ------------------------
//! - Non-finite train losses, validation losses or gradients abort the run
//!   with a `NumericDivergence` error before anything is written.
//! - All randomness (initialization and shuffling) comes from one
//!   `ChaCha8Rng` that is saved in every checkpoint, so an interrupted and
//!   resumed run follows the same trajectory as an uninterrupted one.
use ndarray::{Array2, ArrayView2};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::{
    mixing::{
        core::{
            artifact::FORMAT_VERSION,
            basis::BasisMatrix,
            checkpoint::Checkpoint,
            data::{DistanceVector, Series},
            options::{TrainOptions, ValidationPolicy},
            windows::WindowSet,
        },
        errors::{MixingError, MixingResult},
        models::MixingModel,
        training::gate::{CheckpointGate, GateDecision},
    },
    optimization::gradient_descent::GradientOptimizer,
};

/// Losses observed in one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    /// 1-based epoch index.
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    /// Epoch mean of the mixing MSE against the reference, when one is given.
    pub mixing_loss: Option<f64>,
    pub checkpointed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub history: Vec<EpochRecord>,
    pub best_val_loss: f64,
    pub stopped_early: bool,
    pub checkpoints_written: usize,
}

#[derive(Debug, Clone)]
pub struct Trainer {
    model: MixingModel,
    optimizer: GradientOptimizer,
    options: TrainOptions,
    rng: ChaCha8Rng,
    epochs_done: usize,
    best_val_loss: f64,
}

impl Trainer {
    /// Fresh trainer with one weight slice per time step of `series`.
    ///
    /// # Errors
    /// - Option validation errors.
    /// - [`MixingError::DimensionMismatch`] if `distances` is for a different
    ///   node count than `series`.
    pub fn new(
        series: &Series, distances: &DistanceVector, options: TrainOptions,
    ) -> MixingResult<Self> {
        options.validate()?;
        if distances.n_nodes() != series.n_nodes() {
            return Err(MixingError::DimensionMismatch {
                what: "distance nodes",
                expected: vec![series.n_nodes()],
                found: vec![distances.n_nodes()],
            });
        }
        let basis = BasisMatrix::new(distances, options.model.shape, options.model.knots)?;
        let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
        let model = MixingModel::new(basis, series.len(), options.model.init, &mut rng)?;
        Ok(Self::assemble(model, options, rng))
    }

    /// Restore weights, optimizer, generator, epoch counter and best loss.
    ///
    /// # Errors
    /// [`MixingError::CheckpointMismatch`] if the checkpoint does not fit
    /// the model.
    pub fn resume_from(&mut self, ckpt: Checkpoint) -> MixingResult<()> {
        ckpt.verify_dims(self.model.basis(), self.model.n_slices())?;
        *self.model.weights_mut() = ckpt.weights;
        self.optimizer = ckpt.optimizer;
        self.rng = ckpt.rng;
        self.epochs_done = ckpt.epoch;
        self.best_val_loss = ckpt.best_val_loss;
        Ok(())
    }

    /// Snapshot of the current training state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            format_version: FORMAT_VERSION,
            n_nodes: self.model.n_nodes(),
            shape: self.model.basis().shape(),
            knot_policy: self.model.basis().knot_policy(),
            knots: self.model.basis().knots().to_owned(),
            weights: self.model.weights().to_owned(),
            optimizer: self.optimizer.clone(),
            epoch: self.epochs_done,
            best_val_loss: self.best_val_loss,
            rng: self.rng.clone(),
        }
    }

    pub fn model(&self) -> &MixingModel {
        &self.model
    }

    pub fn into_model(self) -> MixingModel {
        self.model
    }

    pub fn optimizer(&self) -> &GradientOptimizer {
        &self.optimizer
    }

    pub fn options(&self) -> &TrainOptions {
        &self.options
    }

    pub fn epochs_done(&self) -> usize {
        self.epochs_done
    }

    pub fn best_val_loss(&self) -> f64 {
        self.best_val_loss
    }

    /// Train until `options.epochs` or an early stop.
    ///
    /// # Errors
    /// - [`MixingError::MissingReference`] under
    ///   [`ValidationPolicy::ReferenceMixing`] without a reference.
    /// - [`MixingError::InvalidOption`] if the held-out set leaves no
    ///   training samples.
    /// - `DataUnavailable` errors for an unreadable or mismatched checkpoint.
    /// - `NumericDivergence` errors for non-finite losses or gradients.
    pub fn fit(
        &mut self, series: &Series, reference: Option<ArrayView2<'_, f64>>,
        checkpoint_path: Option<&Path>,
    ) -> MixingResult<TrainReport> {
        if series.n_nodes() != self.model.n_nodes() {
            return Err(MixingError::DimensionMismatch {
                what: "series nodes",
                expected: vec![self.model.n_nodes()],
                found: vec![series.n_nodes()],
            });
        }
        if let Some(reference) = reference {
            self.model.mixing_loss(reference)?;
        }
        if let Some(path) = checkpoint_path {
            if let Some(ckpt) = Checkpoint::load_if_exists(path)? {
                info!(epoch = ckpt.epoch, path = %path.display(), "resuming from checkpoint");
                self.resume_from(ckpt)?;
            }
        }

        let windows = WindowSet::from_series(series, self.options.window)?;
        let (train_ids, val_ids) = self.split(windows.len(), reference.is_some())?;
        let mut gate = CheckpointGate::resume(self.options.early_stopping, self.best_val_loss);
        let mut report = TrainReport {
            history: Vec::new(),
            best_val_loss: self.best_val_loss,
            stopped_early: false,
            checkpoints_written: 0,
        };

        for epoch in self.epochs_done + 1..=self.options.epochs {
            let (train_loss, mixing_loss) = self.run_epoch(epoch, &windows, &train_ids, reference)?;
            let val_loss = match self.options.validation {
                ValidationPolicy::HeldOut { .. } => self.model.loss(&windows, &val_ids)?,
                ValidationPolicy::ReferenceMixing => {
                    mixing_loss.ok_or(MixingError::MissingReference)?
                }
            };
            if !val_loss.is_finite() {
                return Err(MixingError::NonFiniteLoss { what: "validation", epoch, value: val_loss });
            }

            self.epochs_done = epoch;
            let decision = gate.observe(val_loss);
            self.best_val_loss = gate.best();
            let mut checkpointed = false;
            if decision == GateDecision::Save {
                if let Some(path) = checkpoint_path {
                    self.checkpoint().save(path)?;
                    debug!(epoch, val_loss, path = %path.display(), "checkpoint written");
                    checkpointed = true;
                    report.checkpoints_written += 1;
                }
            }
            info!(epoch, train_loss, val_loss, mixing_loss = ?mixing_loss, "epoch finished");
            report.history.push(EpochRecord {
                epoch,
                train_loss,
                val_loss,
                mixing_loss,
                checkpointed,
            });

            if decision == GateDecision::Stop {
                warn!(
                    epoch,
                    val_loss,
                    best = gate.best(),
                    stale = gate.stale_epochs(),
                    "validation loss stopped improving; ending training"
                );
                report.stopped_early = true;
                break;
            }
        }
        report.best_val_loss = self.best_val_loss;
        Ok(report)
    }

    // ---- Helper Methods ----

    fn assemble(model: MixingModel, options: TrainOptions, rng: ChaCha8Rng) -> Self {
        let optimizer = GradientOptimizer::new(options.optimizer);
        Self { model, optimizer, options, rng, epochs_done: 0, best_val_loss: f64::INFINITY }
    }

    fn split(&self, n_samples: usize, has_reference: bool) -> MixingResult<(Vec<usize>, Vec<usize>)> {
        match self.options.validation {
            ValidationPolicy::HeldOut { size } => {
                if size >= n_samples {
                    return Err(MixingError::InvalidOption {
                        name: "held_out",
                        value: size,
                        reason: "Held-out set must leave at least one training sample.",
                    });
                }
                let cut = n_samples - size;
                Ok(((0..cut).collect(), (cut..n_samples).collect()))
            }
            ValidationPolicy::ReferenceMixing => {
                if !has_reference {
                    return Err(MixingError::MissingReference);
                }
                Ok(((0..n_samples).collect(), Vec::new()))
            }
        }
    }

    /// One pass over the training ids; returns mean train loss and mean
    /// mixing loss.
    fn run_epoch(
        &mut self, epoch: usize, windows: &WindowSet, train_ids: &[usize],
        reference: Option<ArrayView2<'_, f64>>,
    ) -> MixingResult<(f64, Option<f64>)> {
        let mut ids = train_ids.to_vec();
        if self.options.shuffle {
            ids.shuffle(&mut self.rng);
        }
        let mut train_sum = 0.0;
        let mut mixing_sum = 0.0;
        let mut n_batches = 0usize;
        for batch in ids.chunks(self.options.batch_size) {
            if let Some(reference) = reference {
                mixing_sum += self.model.mixing_loss(reference)?;
            }
            let (loss, grad) = self.model.loss_and_grad(windows, batch)?;
            if !loss.is_finite() {
                return Err(MixingError::NonFiniteLoss { what: "train", epoch, value: loss });
            }
            check_gradient_finite(&grad, epoch)?;
            self.optimizer.step(self.model.weights_mut(), &grad)?;
            train_sum += loss;
            n_batches += 1;
        }
        let n = n_batches.max(1) as f64;
        Ok((train_sum / n, reference.map(|_| mixing_sum / n)))
    }
}

/// Train a fresh model, resuming from `checkpoint_path` when a checkpoint is
/// already there.
pub fn train(
    series: &Series, distances: &DistanceVector, options: TrainOptions,
    reference: Option<ArrayView2<'_, f64>>, checkpoint_path: Option<&Path>,
) -> MixingResult<(MixingModel, TrainReport)> {
    let mut trainer = Trainer::new(series, distances, options)?;
    let report = trainer.fit(series, reference, checkpoint_path)?;
    Ok((trainer.into_model(), report))
}

pub(crate) fn check_gradient_finite(grad: &Array2<f64>, epoch: usize) -> MixingResult<()> {
    match grad.indexed_iter().find(|(_, g)| !g.is_finite()) {
        Some(((row, col), &value)) => {
            Err(MixingError::NonFiniteGradient { epoch, row, col, value })
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixing::core::{
        init::WeightInit,
        options::{EarlyStopping, ModelConfig},
        shape::ShapeConstraint,
    };
    use crate::mixing::errors::ErrorKind;
    use crate::optimization::gradient_descent::OptimizerKind;
    use ndarray::array;

    fn series() -> Series {
        Series::new(array![
            [1.0, 1.2, 0.9, 1.1, 1.0, 1.3, 0.8, 1.0, 1.1, 0.9],
            [0.5, 0.4, 0.6, 0.5, 0.7, 0.4, 0.5, 0.6, 0.5, 0.4]
        ])
        .unwrap()
    }

    fn distances() -> DistanceVector {
        DistanceVector::new(array![0.0, 1.0, 1.0, 0.0], 2).unwrap()
    }

    fn options() -> TrainOptions {
        TrainOptions {
            window: 1,
            batch_size: 3,
            epochs: 5,
            optimizer: OptimizerKind::adam(0.01).unwrap(),
            shuffle: true,
            validation: ValidationPolicy::HeldOut { size: 2 },
            early_stopping: EarlyStopping::Never,
            model: ModelConfig {
                shape: ShapeConstraint::ConvexDec,
                init: WeightInit::XavierNormal,
                ..ModelConfig::default()
            },
            seed: 7,
        }
    }

    #[test]
    // Purpose
    // -------
    // Every epoch is recorded and checkpoints are written only on strict
    // improvement.
    //
    // Given
    // -----
    // - 5 epochs, Never policy, checkpoint path in a temp dir.
    //
    // Expect
    // ------
    // - 5 records; `checkpoints_written` equals the number of records marked
    //   `checkpointed`; the first epoch always saves.
    fn fit_records_every_epoch_and_saves_on_improvement() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        let mut trainer = Trainer::new(&series(), &distances(), options()).unwrap();

        // Act
        let report = trainer.fit(&series(), None, Some(&path)).unwrap();

        // Assert
        assert_eq!(report.history.len(), 5);
        assert!(report.history[0].checkpointed);
        let marked = report.history.iter().filter(|r| r.checkpointed).count();
        assert_eq!(report.checkpoints_written, marked);
        assert!(!report.stopped_early);
        let best = report.history.iter().map(|r| r.val_loss).fold(f64::INFINITY, f64::min);
        assert_eq!(report.best_val_loss, best);
        assert_eq!(Checkpoint::load(&path).unwrap().best_val_loss, best);
    }

    #[test]
    fn reference_policy_requires_reference() {
        let opts = TrainOptions { validation: ValidationPolicy::ReferenceMixing, ..options() };
        let mut trainer = Trainer::new(&series(), &distances(), opts).unwrap();
        let err = trainer.fit(&series(), None, None).unwrap_err();
        assert_eq!(err, MixingError::MissingReference);
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn reference_policy_uses_mixing_loss_as_validation() {
        let opts = TrainOptions { validation: ValidationPolicy::ReferenceMixing, ..options() };
        let mut trainer = Trainer::new(&series(), &distances(), opts).unwrap();
        let reference = Array2::zeros((4, 10));
        let report = trainer.fit(&series(), Some(reference.view()), None).unwrap();
        for record in &report.history {
            assert_eq!(Some(record.val_loss), record.mixing_loss);
        }
        assert_eq!(report.checkpoints_written, 0);
    }

    #[test]
    fn held_out_must_leave_training_samples() {
        let opts = TrainOptions { validation: ValidationPolicy::HeldOut { size: 9 }, ..options() };
        let mut trainer = Trainer::new(&series(), &distances(), opts).unwrap();
        assert!(matches!(
            trainer.fit(&series(), None, None),
            Err(MixingError::InvalidOption { name: "held_out", .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // A diverging run fails with NumericDivergence and writes nothing.
    //
    // Given
    // -----
    // - Series values near f64::MAX so the first loss overflows to +∞.
    //
    // Expect
    // ------
    // - `NumericDivergence` error and no checkpoint file.
    fn divergence_aborts_before_any_write() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        let big = Series::new(Array2::from_elem((2, 10), 1e300)).unwrap();
        let opts = TrainOptions {
            model: ModelConfig { init: WeightInit::Constant(1.0), ..options().model },
            ..options()
        };
        let mut trainer = Trainer::new(&big, &distances(), opts).unwrap();

        // Act
        let err = trainer.fit(&big, None, Some(&path)).unwrap_err();

        // Assert
        assert_eq!(err.kind(), ErrorKind::NumericDivergence);
        assert!(!path.exists());
    }

    #[test]
    fn mismatched_checkpoint_is_rejected_on_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        let mut ckpt = Trainer::new(&series(), &distances(), options()).unwrap().checkpoint();
        ckpt.weights = Array2::zeros((4, 3));
        ckpt.save(&path).unwrap();

        let mut trainer = Trainer::new(&series(), &distances(), options()).unwrap();
        let err = trainer.fit(&series(), None, Some(&path)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }
}
