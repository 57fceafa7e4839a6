//! Rolling forecast loop: seed, extend, retrain on own predictions, repeat.
//!
//! Purpose
//! -------
//! Extend a trained [`MixingModel`] `until` steps past its training window.
//! The model only has `train_size` weight slices, so after every batch of
//! `train_size` single-step predictions it is re-fitted to its own most
//! recent predictions ([`self_distillation_retrain`]) and the next batch
//! reuses the slices cyclically.
//!
//! Key behaviors
//! -------------
//! - **Seed**: evaluate every window whose history lies inside the training
//!   window (plus the one predicting the first step past it, when observed).
//! - **Extend**: up to `train_size` one-step predictions; step `t` of a batch
//!   reads weight slice `(t + k + 1 − p) mod train_size` for history
//!   position `k`.
//! - **Retrain** only while the prediction target is unmet.
//! - **Done**: first `p` observed columns followed by every prediction, with
//!   the mixing tensor in force for each stretch of time.
//!
//! Invariants & assumptions
//! ------------------------
//! - Predictions needed: `until + train_size − p`. The buffer never holds
//!   more than `until + train_size` predictions and never ends with fewer
//!   than the target.
//! - History values at times `< train_size` are always observations.
//! - The basis never changes; only the weights move during retraining.
//!
//! Conventions
//! -----------
//! - Prediction `m` in the buffer is for absolute time `p + m`.
//! - The mixing history holds the seed tensor followed by the tensor used in
//!   each extension batch, cut or extended to exactly the output length.
//!   When the seed already runs one step past the training window, the last
//!   tensor's slices continue cyclically to cover it.
use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};
use std::mem::discriminant;
use tracing::{debug, info};

use crate::{
    mixing::{
        core::{
            basis::BasisMatrix,
            checkpoint::Checkpoint,
            data::{DistanceVector, Series},
            forecasts::ForecastBundle,
            options::{ForecastOptions, HistorySource, ModelConfig},
            windows::WindowSet,
        },
        errors::{MixingError, MixingResult},
        models::MixingModel,
        training::trainer::check_gradient_finite,
    },
    optimization::gradient_descent::GradientOptimizer,
};

/// Result of a completed rolling forecast.
#[derive(Debug, Clone)]
pub struct RollingReport {
    pub bundle: ForecastBundle,
    /// Extension batches run after the seed.
    pub batches: usize,
    pub retrains: usize,
    /// Model after the last retrain.
    pub model: MixingModel,
}

#[derive(Debug)]
pub struct RollingForecaster<'a> {
    series: &'a Series,
    model: MixingModel,
    optimizer: GradientOptimizer,
    options: ForecastOptions,
    buffer: Vec<Array1<f64>>,
    /// `F` produced by the latest seed or retrain.
    in_force: Array2<f64>,
    mixing: Vec<Array2<f64>>,
    batches: usize,
    retrains: usize,
}

impl<'a> RollingForecaster<'a> {
    /// # Errors
    /// - Option validation errors.
    /// - [`MixingError::DimensionMismatch`] if the model's node or slice
    ///   count disagrees with `series` / `options.train_size`.
    /// - [`MixingError::InvalidWindow`] if `series` is shorter than the
    ///   training window.
    pub fn new(
        series: &'a Series, model: MixingModel, optimizer: GradientOptimizer,
        options: ForecastOptions,
    ) -> MixingResult<Self> {
        options.validate()?;
        if model.n_nodes() != series.n_nodes() {
            return Err(MixingError::DimensionMismatch {
                what: "series nodes",
                expected: vec![model.n_nodes()],
                found: vec![series.n_nodes()],
            });
        }
        if model.n_slices() != options.train_size {
            return Err(MixingError::DimensionMismatch {
                what: "weight slices",
                expected: vec![options.train_size],
                found: vec![model.n_slices()],
            });
        }
        if series.len() < options.train_size {
            return Err(MixingError::InvalidWindow {
                window: options.train_size,
                len: series.len(),
                reason: "Series must cover the training window.",
            });
        }
        let in_force = model.flat_mixing();
        Ok(Self {
            series,
            model,
            optimizer,
            options,
            buffer: Vec::new(),
            in_force,
            mixing: Vec::new(),
            batches: 0,
            retrains: 0,
        })
    }

    /// Build the model from a training checkpoint. The checkpoint's optimizer
    /// (and its state) is reused when it is the same kind as
    /// `options.optimizer`; otherwise a fresh optimizer is used.
    pub fn from_checkpoint(
        series: &'a Series, distances: &DistanceVector, config: &ModelConfig, ckpt: &Checkpoint,
        options: ForecastOptions,
    ) -> MixingResult<Self> {
        let basis = BasisMatrix::new(distances, config.shape, config.knots)?;
        let model = MixingModel::from_checkpoint(basis, ckpt)?;
        let optimizer = if discriminant(ckpt.optimizer.kind()) == discriminant(&options.optimizer)
        {
            ckpt.optimizer.clone()
        } else {
            GradientOptimizer::new(options.optimizer)
        };
        Self::new(series, model, optimizer, options)
    }

    /// Predictions produced so far.
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_complete(&self) -> bool {
        self.buffer.len() >= self.options.target_predictions()
    }

    /// Drive the loop to completion.
    pub fn run(mut self) -> MixingResult<RollingReport> {
        self.seed()?;
        while !self.is_complete() {
            self.extend_batch()?;
            if self.is_complete() {
                break;
            }
            self.retrain()?;
        }
        self.finish()
    }

    /// Evaluate the trained model over the training window.
    pub fn seed(&mut self) -> MixingResult<()> {
        let p = self.options.window;
        let seed_len = (self.options.train_size + 1).min(self.series.len());
        // Every history column lies before `train_size`, so all slices exist.
        let windows = WindowSet::from_matrix(self.series.head(seed_len), p)?;
        let (preds, flat) =
            self.model.evaluate(windows.inputs.view(), windows.input_indices.view())?;
        self.buffer = preds.rows().into_iter().map(|row| row.to_owned()).collect();
        for (m, pred) in self.buffer.iter().enumerate() {
            check_prediction(m, pred)?;
        }
        self.mixing = vec![flat.clone()];
        self.in_force = flat;
        debug!(predictions = self.buffer.len(), "seeded rolling forecast");
        Ok(())
    }

    /// Up to `train_size` single-step predictions with the current weights.
    pub fn extend_batch(&mut self) -> MixingResult<()> {
        let p = self.options.window;
        let n_slices = self.model.n_slices();
        let target = self.options.target_predictions();
        info!(
            remaining = target.saturating_sub(self.buffer.len()),
            batch = self.batches + 1,
            "forecasting next steps"
        );
        for t in 0..self.options.train_size {
            if self.is_complete() {
                break;
            }
            let next_time = p + self.buffer.len();
            let history = self.history_window(next_time);
            let slices: Vec<usize> = (0..p)
                .map(|k| ((t + k + 1) as i64 - p as i64).rem_euclid(n_slices as i64) as usize)
                .collect();
            let pred = self.model.predict_with(self.in_force.view(), history.view(), &slices)?;
            check_prediction(self.buffer.len(), &pred)?;
            self.buffer.push(pred);
            debug!(remaining = target.saturating_sub(self.buffer.len()), "steps until completion");
        }
        self.mixing.push(self.in_force.clone());
        self.batches += 1;
        Ok(())
    }

    /// Re-fit the weights to the last `train_size` predictions; the resulting
    /// `F` drives the next batch.
    pub fn retrain(&mut self) -> MixingResult<()> {
        let len = self.options.train_size.min(self.buffer.len());
        let recent = &self.buffer[self.buffer.len() - len..];
        let pseudo = Array2::from_shape_fn((self.model.n_nodes(), len), |(i, t)| recent[t][i]);
        debug!(
            epochs = self.options.retrain_epochs,
            predictions = self.buffer.len(),
            "self-distillation retrain"
        );
        self.in_force = self_distillation_retrain(
            &mut self.model,
            &mut self.optimizer,
            pseudo.view(),
            self.options.window,
            self.options.retrain_epochs,
        )?;
        self.retrains += 1;
        Ok(())
    }

    /// Assemble the forecast bundle.
    pub fn finish(self) -> MixingResult<RollingReport> {
        let p = self.options.window;
        let n = self.model.n_nodes();
        let preds = Array2::from_shape_fn((n, self.buffer.len()), |(i, m)| self.buffer[m][i]);
        let out_len = p + self.buffer.len();
        let forecast = concatenate(Axis(1), &[self.series.head(p), preds.view()])
            .map_err(|_| shape_error(n, out_len))?;
        let views: Vec<ArrayView2<'_, f64>> = self.mixing.iter().map(|f| f.view()).collect();
        let recorded = concatenate(Axis(1), &views).map_err(|_| shape_error(n * n, out_len))?;
        let mixing_history = if recorded.ncols() >= out_len {
            recorded.slice(s![.., ..out_len]).to_owned()
        } else {
            let last = self.mixing.last().ok_or_else(|| shape_error(n * n, out_len))?;
            let start = recorded.ncols();
            let pad = Array2::from_shape_fn((n * n, out_len - start), |(row, j)| {
                last[[row, (start + j) % last.ncols()]]
            });
            concatenate(Axis(1), &[recorded.view(), pad.view()])
                .map_err(|_| shape_error(n * n, out_len))?
        };
        let observed = self.series.head(out_len.min(self.series.len())).to_owned();
        let bundle = ForecastBundle::new(observed, forecast, mixing_history)?;
        info!(
            predictions = self.buffer.len(),
            retrains = self.retrains,
            mse = ?bundle.mse,
            "rolling forecast complete"
        );
        Ok(RollingReport {
            bundle,
            batches: self.batches,
            retrains: self.retrains,
            model: self.model,
        })
    }

    // ---- Helper Methods ----

    /// `N × p` history preceding `time`, oldest first.
    fn history_window(&self, time: usize) -> Array2<f64> {
        let p = self.options.window;
        let n = self.model.n_nodes();
        let mut history = Array2::zeros((n, p));
        for k in 0..p {
            let h = time - p + k;
            let observed = h < self.options.train_size
                || (self.options.history == HistorySource::Observed && h < self.series.len());
            if observed {
                history.column_mut(k).assign(&self.series.column(h));
            } else {
                history.column_mut(k).assign(&self.buffer[h - p]);
            }
        }
        history
    }
}

/// Fit `model` to a pseudo-series of its own predictions with full-batch
/// steps; returns the resulting `F`.
///
/// This feeds the model's output back as its training signal, so errors in
/// the predictions are learned as if they were observations.
///
/// # Errors
/// - [`MixingError::InvalidWindow`] if the pseudo-series is not longer than
///   `window`.
/// - `NumericDivergence` errors for non-finite losses or gradients.
pub fn self_distillation_retrain(
    model: &mut MixingModel, optimizer: &mut GradientOptimizer, pseudo: ArrayView2<'_, f64>,
    window: usize, epochs: usize,
) -> MixingResult<Array2<f64>> {
    let windows = WindowSet::from_matrix(pseudo, window)?;
    let ids: Vec<usize> = (0..windows.len()).collect();
    for epoch in 1..=epochs {
        let (loss, grad) = model.loss_and_grad(&windows, &ids)?;
        if !loss.is_finite() {
            return Err(MixingError::NonFiniteLoss { what: "retrain", epoch, value: loss });
        }
        check_gradient_finite(&grad, epoch)?;
        optimizer.step(model.weights_mut(), &grad)?;
    }
    Ok(model.flat_mixing())
}

/// Rolling forecast from a training checkpoint.
pub fn rolling_forecast(
    series: &Series, distances: &DistanceVector, config: &ModelConfig, ckpt: &Checkpoint,
    options: ForecastOptions,
) -> MixingResult<RollingReport> {
    RollingForecaster::from_checkpoint(series, distances, config, ckpt, options)?.run()
}

fn check_prediction(step: usize, pred: &Array1<f64>) -> MixingResult<()> {
    match pred.iter().position(|v| !v.is_finite()) {
        Some(node) => Err(MixingError::NonFinitePrediction { step, node, value: pred[node] }),
        None => Ok(()),
    }
}

fn shape_error(rows: usize, cols: usize) -> MixingError {
    MixingError::DimensionMismatch { what: "forecast output", expected: vec![rows, cols], found: vec![] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixing::core::{init::WeightInit, shape::ShapeConstraint, KnotPolicy};
    use crate::optimization::gradient_descent::OptimizerKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn series(len: usize) -> Series {
        Series::new(Array2::from_shape_fn((2, len), |(i, t)| {
            1.0 + 0.1 * i as f64 + 0.05 * ((t % 4) as f64)
        }))
        .unwrap()
    }

    fn model(train_size: usize) -> MixingModel {
        let d = DistanceVector::new(ndarray::array![0.0, 1.0, 1.0, 0.0], 2).unwrap();
        let basis =
            BasisMatrix::new(&d, ShapeConstraint::ConvexDec, KnotPolicy::OrderStatistics).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        MixingModel::new(basis, train_size, WeightInit::Constant(0.3), &mut rng).unwrap()
    }

    fn options(train_size: usize, until: usize, window: usize) -> ForecastOptions {
        ForecastOptions {
            train_size,
            until,
            window,
            retrain_epochs: 3,
            optimizer: OptimizerKind::rms_prop(0.001).unwrap(),
            history: HistorySource::Autoregressive,
        }
    }

    fn run(len: usize, train_size: usize, until: usize, window: usize) -> RollingReport {
        let s = series(len);
        let optimizer = GradientOptimizer::new(OptimizerKind::rms_prop(0.001).unwrap());
        RollingForecaster::new(&s, model(train_size), optimizer, options(train_size, until, window))
            .unwrap()
            .run()
            .unwrap()
    }

    #[test]
    // Purpose
    // -------
    // The prediction count lands inside the documented bounds for a spread
    // of horizons and windows.
    //
    // Given
    // -----
    // - train_size 6, until ∈ {0, 1, 5, 13}, p ∈ {1, 2}, series longer and
    //   exactly as long as the training window.
    //
    // Expect
    // ------
    // - until + train_size − p ≤ predictions ≤ until + train_size.
    // - Forecast has p + predictions columns.
    fn buffer_length_stays_within_bounds() {
        for len in [6, 20] {
            for until in [0, 1, 5, 13] {
                for window in [1, 2] {
                    // Act
                    let report = run(len, 6, until, window);

                    // Assert
                    let preds = report.bundle.len() - window;
                    assert!(preds >= until + 6 - window, "len {len} until {until} p {window}");
                    assert!(preds <= until + 6, "len {len} until {until} p {window}");
                    let cols = report.bundle.forecast.ncols();
                    assert_eq!(report.bundle.mixing_history.dim(), (4, cols));
                    assert!(report.bundle.mixing_at(cols - 1).is_ok());
                }
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // When the seed alone meets the target, no batch or retrain runs and the
    // mixing history still covers every output column.
    //
    // Given
    // -----
    // - Series of 20 columns, train_size 6, until 0, p 1.
    //
    // Expect
    // ------
    // - Seed predicts times 1..=6, so the forecast has 7 columns.
    // - Mixing history has 7 columns; the last repeats slice 0 of the seed.
    fn target_met_at_seed_skips_retraining() {
        // Act
        let report = run(20, 6, 0, 1);

        // Assert
        assert_eq!(report.batches, 0);
        assert_eq!(report.retrains, 0);
        assert_eq!(report.bundle.len(), 7);
        let history = &report.bundle.mixing_history;
        assert_eq!(history.dim(), (4, 7));
        assert_eq!(history.column(6), history.column(0));
        assert_eq!(report.bundle.mixing_at(6).unwrap(), report.bundle.mixing_at(0).unwrap());
    }

    #[test]
    fn retrain_result_drives_the_next_batch() {
        let s = series(6);
        let optimizer = GradientOptimizer::new(OptimizerKind::sgd(0.05).unwrap());
        let mut forecaster =
            RollingForecaster::new(&s, model(6), optimizer, options(6, 13, 1)).unwrap();
        forecaster.seed().unwrap();
        forecaster.extend_batch().unwrap();
        let before = forecaster.in_force.clone();

        forecaster.retrain().unwrap();
        forecaster.extend_batch().unwrap();

        assert_ne!(forecaster.in_force, before);
        assert_eq!(forecaster.in_force, forecaster.model.flat_mixing());
        assert_eq!(forecaster.mixing.last(), Some(&forecaster.in_force));
        assert_eq!(forecaster.mixing.len(), 3);
    }

    #[test]
    // Purpose
    // -------
    // Batches and retrains alternate and the mixing history is aligned to
    // the output.
    //
    // Given
    // -----
    // - train_size 6, until 13, p 1, series of exactly 6 columns.
    //
    // Expect
    // ------
    // - Seed gives 5 predictions; target 18 needs batches of 6, 6, 1.
    // - Two retrains; mixing history truncated to the 19 output columns.
    fn batches_alternate_with_retrains() {
        let report = run(6, 6, 13, 1);
        assert_eq!(report.batches, 3);
        assert_eq!(report.retrains, 2);
        assert_eq!(report.bundle.len(), 19);
        assert_eq!(report.bundle.mixing_history.dim(), (4, 19));
        assert_eq!(report.bundle.forecast.column(0), series(6).column(0));
        // Observed overlap is the 6 training columns.
        assert_eq!(report.bundle.observed.ncols(), 6);
    }

    #[test]
    fn retrain_changes_weights_but_not_basis() {
        let mut m = model(6);
        let before_w = m.weights().to_owned();
        let before_g = m.basis().g().to_owned();
        let mut opt = GradientOptimizer::new(OptimizerKind::sgd(0.05).unwrap());
        let pseudo = series(6).into_inner();

        let flat = self_distillation_retrain(&mut m, &mut opt, pseudo.view(), 1, 2).unwrap();

        assert_ne!(m.weights(), before_w);
        assert_eq!(m.basis().g(), before_g);
        assert_eq!(flat, m.flat_mixing());
    }

    #[test]
    fn slice_count_must_match_train_size() {
        let s = series(10);
        let optimizer = GradientOptimizer::new(OptimizerKind::rms_prop(0.01).unwrap());
        let err = RollingForecaster::new(&s, model(5), optimizer, options(6, 2, 1)).unwrap_err();
        assert!(matches!(err, MixingError::DimensionMismatch { what: "weight slices", .. }));
    }

    #[test]
    fn observed_history_reads_series_past_training_window() {
        let s = series(12);
        let optimizer = GradientOptimizer::new(OptimizerKind::rms_prop(0.001).unwrap());
        let mut opts = options(6, 4, 1);
        opts.history = HistorySource::Observed;
        let mut forecaster = RollingForecaster::new(&s, model(6), optimizer, opts).unwrap();
        forecaster.seed().unwrap();
        // Seed predicts times 1..=6; the next step reads time 6, past the window.
        assert_eq!(forecaster.buffer_len(), 6);
        let history = forecaster.history_window(7);
        assert_eq!(history.column(0), s.column(6));
        assert_ne!(history.column(0), forecaster.buffer[5]);
    }
}
