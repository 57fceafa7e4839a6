//! Integration tests for the spatial mixing pipeline.
//!
//! Purpose
//! -------
//! - Validate the end-to-end non-stationary pipeline: validated series and
//!   distances, minibatch training with checkpoints, and the rolling
//!   forecast loop that resumes from those checkpoints.
//! - Validate the stationary pipeline: L-BFGS fit, in-sample forecast and
//!   artifact persistence.
//!
//! Coverage
//! --------
//! - `mixing::training::trainer`: convergence on a noiseless series,
//!   bit-exact resume from a checkpoint.
//! - `mixing::training::rolling`: prediction-count bounds and bundle layout
//!   when driven from a real training checkpoint.
//! - `mixing::models::stationary`: fit → forecast → save → load.
//!
//! Exclusions
//! ----------
//! - Gate decisions, gradient checks and optimizer formulas are covered by
//!   unit tests next to the code.
//! - Python bindings.
use approx::assert_relative_eq;
use ndarray::{array, Array2};
use rust_spatiotemporal::{
    mixing::{
        core::{
            basis::{BasisMatrix, KnotPolicy},
            checkpoint::Checkpoint,
            data::{DistanceVector, Series},
            forecasts::ForecastBundle,
            init::WeightInit,
            options::{
                EarlyStopping, ForecastOptions, HistorySource, ModelConfig, TrainOptions,
                ValidationPolicy,
            },
            shape::ShapeConstraint,
            windows::WindowSet,
        },
        models::{Normalization, StationaryMixingModel},
        training::{rolling_forecast, Trainer},
    },
    optimization::{gradient_descent::OptimizerKind, loss_optimizer::LossOptions},
};

/// Purpose
/// -------
/// Three nodes at unit distance from each other, so every row of every
/// mixing matrix sees the same distance multiset `{0, 1, 1}`.
fn triangle_distances() -> DistanceVector {
    DistanceVector::from_matrix(&array![[0.0, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]])
        .unwrap()
}

/// Purpose
/// -------
/// Deterministic `3 × len` series with node offsets and a short cycle.
fn wavy_series(len: usize) -> Series {
    Series::new(Array2::from_shape_fn((3, len), |(i, t)| {
        2.0 + 0.5 * i as f64 + 0.3 * ((t * (i + 1)) % 5) as f64
    }))
    .unwrap()
}

fn base_options(epochs: usize, seed: u64) -> TrainOptions {
    TrainOptions {
        window: 1,
        batch_size: 4,
        epochs,
        optimizer: OptimizerKind::adam(0.01).unwrap(),
        shuffle: true,
        validation: ValidationPolicy::HeldOut { size: 3 },
        early_stopping: EarlyStopping::Never,
        model: ModelConfig { shape: ShapeConstraint::ConvexDec, ..ModelConfig::default() },
        seed,
    }
}

#[test]
// Purpose
// -------
// A constant, zero-noise series is fitted to near-zero loss.
//
// Given
// -----
// - N = 3, T = 20, every value 5.0, convex_dec basis, Adam (lr 0.01),
//   full-batch steps for 1500 epochs.
//
// Expect
// ------
// - Final train loss below 0.05 and below 1% of the first epoch's loss.
fn constant_series_converges_to_near_zero_loss() {
    // Arrange
    let series = Series::new(Array2::from_elem((3, 20), 5.0)).unwrap();
    let opts = TrainOptions {
        batch_size: 300,
        epochs: 1500,
        shuffle: false,
        validation: ValidationPolicy::HeldOut { size: 1 },
        ..base_options(1500, 3)
    };
    let mut trainer = Trainer::new(&series, &triangle_distances(), opts).unwrap();

    // Act
    let report = trainer.fit(&series, None, None).unwrap();

    // Assert
    let first = report.history[0].train_loss;
    let last = report.history.last().unwrap().train_loss;
    assert_eq!(report.history.len(), 1500);
    assert!(last < 0.05, "final loss {last}");
    assert!(last < first * 0.01, "final loss {last} vs initial {first}");
}

#[test]
// Purpose
// -------
// Interrupting training and resuming from the checkpoint reproduces the
// uninterrupted weight trajectory.
//
// Given
// -----
// - Same seed, shuffled minibatches, Never policy.
// - Run A: 4 epochs straight. Run B: 2 epochs, then a new trainer with a
//   4-epoch budget pointed at B's checkpoint.
//
// Expect
// ------
// - Identical final weights and optimizer state.
fn checkpoint_resume_reproduces_uninterrupted_run() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.ckpt");
    let path_b = dir.path().join("b.ckpt");
    let series = wavy_series(16);
    let d = triangle_distances();

    // Act
    let mut run_a = Trainer::new(&series, &d, base_options(4, 21)).unwrap();
    run_a.fit(&series, None, Some(&path_a)).unwrap();

    let mut first_half = Trainer::new(&series, &d, base_options(2, 21)).unwrap();
    first_half.fit(&series, None, Some(&path_b)).unwrap();
    let mut resumed = Trainer::new(&series, &d, base_options(4, 21)).unwrap();
    let report = resumed.fit(&series, None, Some(&path_b)).unwrap();

    // Assert
    assert!(report.history.iter().all(|r| r.epoch > 1));
    assert_eq!(resumed.epochs_done(), 4);
    assert_eq!(resumed.model().weights(), run_a.model().weights());
    assert_eq!(resumed.optimizer(), run_a.optimizer());
}

#[test]
// Purpose
// -------
// The rolling loop, driven from a real training checkpoint, honours its
// prediction-count bounds and produces a consistent bundle.
//
// Given
// -----
// - Training on the first 8 columns of a 14-column series.
// - Forecast 10 steps beyond the window with window 1 and Adam retraining.
//
// Expect
// ------
// - 17 ≤ predictions ≤ 18; forecast has `1 + predictions` columns.
// - First forecast column is observed; observed overlap is the full series.
// - Mixing history is `N² × (1 + predictions)`; MSE is finite.
fn rolling_forecast_from_training_checkpoint() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.ckpt");
    let full = wavy_series(14);
    let train_window = Series::new(full.head(8).to_owned()).unwrap();
    let d = triangle_distances();
    let opts = TrainOptions { validation: ValidationPolicy::HeldOut { size: 2 }, ..base_options(20, 5) };
    let config = opts.model;
    Trainer::new(&train_window, &d, opts).unwrap().fit(&train_window, None, Some(&path)).unwrap();
    let ckpt = Checkpoint::load(&path).unwrap();
    let forecast_opts = ForecastOptions {
        train_size: 8,
        until: 10,
        window: 1,
        retrain_epochs: 5,
        optimizer: OptimizerKind::adam(0.01).unwrap(),
        history: HistorySource::Autoregressive,
    };

    // Act
    let report = rolling_forecast(&full, &d, &config, &ckpt, forecast_opts).unwrap();

    // Assert
    let bundle = &report.bundle;
    let predictions = bundle.len() - 1;
    assert!((17..=18).contains(&predictions), "{predictions} predictions");
    assert_eq!(bundle.forecast.column(0), full.column(0));
    assert_eq!(bundle.observed.ncols(), 14);
    assert_eq!(bundle.mixing_history.nrows(), 9);
    assert_eq!(bundle.mixing_history.ncols(), bundle.len());
    assert!(bundle.mixing_at(predictions).is_ok());
    assert!(bundle.mse.unwrap().is_finite());
    assert!(report.retrains >= 1);
}

#[test]
fn rolling_forecast_rejects_checkpoint_for_other_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.ckpt");
    let series = wavy_series(8);
    let d = triangle_distances();
    Trainer::new(&series, &d, base_options(2, 1)).unwrap().fit(&series, None, Some(&path)).unwrap();
    let ckpt = Checkpoint::load(&path).unwrap();
    let config = ModelConfig { shape: ShapeConstraint::ConcaveInc, ..ModelConfig::default() };
    let opts = ForecastOptions { train_size: 8, until: 2, ..ForecastOptions::default() };

    let err = rolling_forecast(&series, &d, &config, &ckpt, opts).unwrap_err();

    assert_eq!(err.kind(), rust_spatiotemporal::mixing::ErrorKind::DataUnavailable);
}

#[test]
// Purpose
// -------
// The stationary model fits, forecasts in-sample and persists its bundle.
//
// Given
// -----
// - Row-softmax normalization on quantile knots, window 2.
//
// Expect
// ------
// - Fitted loss no worse than the starting loss.
// - Bundle survives a save/load round trip unchanged.
fn stationary_fit_forecast_and_persist() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forecast.bin");
    let series = wavy_series(30);
    let d = triangle_distances().scaled((0.0, 2.0)).unwrap();
    let basis = BasisMatrix::new(&d, ShapeConstraint::ConvexDec, KnotPolicy::Quantiles(4)).unwrap();
    let mut model = StationaryMixingModel::new(basis, Normalization::RowSoftmax);
    let windows = WindowSet::from_series(&series, 2).unwrap();
    let theta0 = array![0.5, 0.5, 0.5, 0.5];
    let initial = {
        use rust_spatiotemporal::optimization::loss_optimizer::LossFunction;
        model.value(&theta0, &windows).unwrap()
    };

    // Act
    let fitted = model.fit(theta0, &windows, &LossOptions::default()).unwrap().value;
    let bundle = model.forecast(&series, 2).unwrap();
    bundle.save(&path).unwrap();
    let back = ForecastBundle::load(&path).unwrap();

    // Assert
    assert!(fitted <= initial + 1e-12);
    assert_eq!(back, bundle);
    assert_eq!(bundle.forecast.dim(), (3, 30));
    let mixing = bundle.mixing_at(0).unwrap();
    for row in mixing.rows() {
        assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-10);
    }
}

#[test]
fn constant_init_gives_reproducible_models_without_seed_dependence() {
    let series = wavy_series(10);
    let d = triangle_distances();
    let opts = |seed| TrainOptions {
        model: ModelConfig {
            shape: ShapeConstraint::MonotoneInc,
            init: WeightInit::Constant(0.2),
            ..ModelConfig::default()
        },
        shuffle: false,
        ..base_options(3, seed)
    };
    let a = Trainer::new(&series, &d, opts(1)).unwrap();
    let b = Trainer::new(&series, &d, opts(99)).unwrap();
    assert_eq!(a.model().weights(), b.model().weights());
}
