//! rust_spatiotemporal — shape-constrained spatial mixing models for
//! spatio-temporal forecasting, with Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the mixing models to Python via the `_rust_spatiotemporal`
//! extension module. When the `python-bindings` feature is enabled, this
//! module defines the Python-facing classes, functions and the `mixing`
//! submodule used by the `rust_spatiotemporal` package.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules (`mixing` and `optimization`) as the
//!   public crate surface.
//! - Define `#[pyfunction]`s (`basis_function`, `train`, `rolling_forecast`)
//!   and `#[pyclass]` wrappers for results and the stationary model.
//! - Register the `mixing` submodule under `rust_spatiotemporal` so that
//!   dot-notation imports work as expected.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner Rust modules; this file performs
//!   only FFI glue, input conversion and error mapping.
//! - Series arrive as `N × T` (nodes on rows); distances as a length-`N²`
//!   vector or an `N × N` matrix.
//!
//! Conventions
//! -----------
//! - Errors from core Rust code are propagated as [`mixing::MixingError`]
//!   internally and converted to `ValueError` at the PyO3 boundary.
//! - Native Rust code should depend on [`mixing`] directly and can ignore
//!   the items guarded by the `python-bindings` feature.
//!
//! Testing notes
//! -------------
//! - Core behavior is covered by unit tests in the inner modules and by the
//!   integration tests under `tests/`.

pub mod mixing;
pub mod optimization;
pub mod utils;

#[cfg(feature = "python-bindings")]
use ndarray::Array2;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray1, PyArray2};

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use rand::SeedableRng;

#[cfg(feature = "python-bindings")]
use std::path::Path;

#[cfg(feature = "python-bindings")]
use crate::{
    mixing::{
        core::{
            basis::BasisMatrix, checkpoint::Checkpoint, data::DistanceVector,
            forecasts::ForecastBundle, init::WeightInit, options::ForecastOptions,
            windows::WindowSet,
        },
        models::StationaryMixingModel,
        training::{rolling::RollingForecaster, trainer::TrainReport, Trainer},
    },
    optimization::loss_optimizer::{OptimOutcome, Theta},
    utils::{
        build_train_options, extract_distances, extract_f64_array, extract_f64_matrix,
        extract_history, extract_loss_opts, extract_model_config, extract_normalization,
        extract_optimizer, extract_series,
    },
};

#[cfg(feature = "python-bindings")]
fn scaled_distances<'py>(
    py: Python<'py>, distances: &Bound<'py, PyAny>, distance_range: Option<(f64, f64)>,
) -> PyResult<DistanceVector> {
    let d = extract_distances(py, distances)?;
    match distance_range {
        Some(range) => Ok(d.scaled(range)?),
        None => Ok(d),
    }
}

/// basis_function — shape-constrained design matrix for a set of distances.
///
/// Returns the `N² × K` matrix whose non-negative combinations are curves of
/// the requested shape in distance. `knots=None` uses every order statistic
/// (`K = N²`); `knots=k` uses `k` quantile knots.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(
    signature = (distances, shape = None, knots = None, distance_range = None),
    text_signature = "(distances, /, shape='concave_inc', knots=None, distance_range=None)"
)]
pub fn basis_function<'py>(
    py: Python<'py>, distances: &Bound<'py, PyAny>, shape: Option<&str>, knots: Option<usize>,
    distance_range: Option<(f64, f64)>,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let d = scaled_distances(py, distances, distance_range)?;
    let config = extract_model_config(shape, knots, None)?;
    let g = crate::mixing::core::basis::basis_function(&d, config.shape, config.knots)?;
    Ok(g.into_pyarray(py))
}

/// train — fit a non-stationary mixing model, checkpointing on improvement.
///
/// An existing checkpoint at `checkpoint_path` is resumed. `validation` is
/// `'held_out'` (last `held_out` samples) or `'reference'` (mixing MSE
/// against `reference`, an `N² × T` array).
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(
    signature = (
        series,
        distances,
        window = None,
        batch_size = None,
        epochs = None,
        optimizer = None,
        learning_rate = None,
        shape = None,
        knots = None,
        init_constant = None,
        shuffle = None,
        validation = None,
        held_out = None,
        reference = None,
        early_stopping = None,
        patience = None,
        seed = None,
        checkpoint_path = None,
        distance_range = None,
    ),
    text_signature = "(series, distances, /, window=1, batch_size=300, epochs=1000, \
                      optimizer='sgd', learning_rate=0.01, shape='concave_inc', knots=None, \
                      init_constant=None, shuffle=False, validation='held_out', held_out=50, \
                      reference=None, early_stopping='break', patience=None, seed=0, \
                      checkpoint_path=None, distance_range=None)"
)]
pub fn train<'py>(
    py: Python<'py>, series: &Bound<'py, PyAny>, distances: &Bound<'py, PyAny>,
    window: Option<usize>, batch_size: Option<usize>, epochs: Option<usize>,
    optimizer: Option<&str>, learning_rate: Option<f64>, shape: Option<&str>,
    knots: Option<usize>, init_constant: Option<f64>, shuffle: Option<bool>,
    validation: Option<&str>, held_out: Option<usize>, reference: Option<&Bound<'py, PyAny>>,
    early_stopping: Option<&str>, patience: Option<usize>, seed: Option<u64>,
    checkpoint_path: Option<&str>, distance_range: Option<(f64, f64)>,
) -> PyResult<TrainSummary> {
    let series = extract_series(series)?;
    let d = scaled_distances(py, distances, distance_range)?;
    let model = extract_model_config(shape, knots, init_constant)?;
    let opts = build_train_options(
        window,
        batch_size,
        epochs,
        optimizer,
        learning_rate,
        shuffle,
        validation,
        held_out,
        early_stopping,
        patience,
        model,
        seed,
    )?;
    let reference = reference.map(extract_f64_matrix).transpose()?;

    let mut trainer = Trainer::new(&series, &d, opts)?;
    let report =
        trainer.fit(&series, reference.as_ref().map(|r| r.view()), checkpoint_path.map(Path::new))?;
    Ok(TrainSummary { report, weights: trainer.model().weights().to_owned() })
}

/// rolling_forecast — extend a trained model past its training window.
///
/// Loads the checkpoint written by `train`, forecasts `until` steps beyond
/// `train_size`, and optionally saves the bundle to `forecast_path`.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(
    signature = (
        series,
        distances,
        checkpoint_path,
        train_size = None,
        until = None,
        window = None,
        retrain_epochs = None,
        optimizer = None,
        learning_rate = None,
        shape = None,
        knots = None,
        history = None,
        forecast_path = None,
        distance_range = None,
    ),
    text_signature = "(series, distances, checkpoint_path, /, train_size=300, until=200, \
                      window=1, retrain_epochs=100, optimizer='rmsprop', learning_rate=0.01, \
                      shape='concave_inc', knots=None, history='autoregressive', \
                      forecast_path=None, distance_range=None)"
)]
pub fn rolling_forecast<'py>(
    py: Python<'py>, series: &Bound<'py, PyAny>, distances: &Bound<'py, PyAny>,
    checkpoint_path: &str, train_size: Option<usize>, until: Option<usize>,
    window: Option<usize>, retrain_epochs: Option<usize>, optimizer: Option<&str>,
    learning_rate: Option<f64>, shape: Option<&str>, knots: Option<usize>,
    history: Option<&str>, forecast_path: Option<&str>, distance_range: Option<(f64, f64)>,
) -> PyResult<ForecastResult> {
    let series = extract_series(series)?;
    let d = scaled_distances(py, distances, distance_range)?;
    let config = extract_model_config(shape, knots, None)?;
    let defaults = ForecastOptions::default();
    let opts = ForecastOptions {
        train_size: train_size.unwrap_or(defaults.train_size),
        until: until.unwrap_or(defaults.until),
        window: window.unwrap_or(defaults.window),
        retrain_epochs: retrain_epochs.unwrap_or(defaults.retrain_epochs),
        optimizer: extract_optimizer(optimizer, learning_rate, "rmsprop")?,
        history: extract_history(history)?,
    };
    let ckpt = Checkpoint::load(Path::new(checkpoint_path))?;
    let report = RollingForecaster::from_checkpoint(&series, &d, &config, &ckpt, opts)?.run()?;
    if let Some(path) = forecast_path {
        report.bundle.save(Path::new(path))?;
    }
    Ok(ForecastResult { inner: report.bundle, retrains: report.retrains })
}

/// TrainSummary — per-epoch losses and final weights of a training run.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_spatiotemporal.mixing")]
pub struct TrainSummary {
    pub report: TrainReport,
    /// `K × T` weights after the last completed epoch.
    pub weights: Array2<f64>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl TrainSummary {
    #[getter]
    pub fn epochs(&self) -> Vec<usize> {
        self.report.history.iter().map(|r| r.epoch).collect()
    }

    #[getter]
    pub fn train_losses(&self) -> Vec<f64> {
        self.report.history.iter().map(|r| r.train_loss).collect()
    }

    #[getter]
    pub fn val_losses(&self) -> Vec<f64> {
        self.report.history.iter().map(|r| r.val_loss).collect()
    }

    #[getter]
    pub fn mixing_losses(&self) -> Vec<Option<f64>> {
        self.report.history.iter().map(|r| r.mixing_loss).collect()
    }

    #[getter]
    pub fn best_val_loss(&self) -> f64 {
        self.report.best_val_loss
    }

    #[getter]
    pub fn stopped_early(&self) -> bool {
        self.report.stopped_early
    }

    #[getter]
    pub fn checkpoints_written(&self) -> usize {
        self.report.checkpoints_written
    }

    #[getter]
    pub fn weights<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.weights.clone().into_pyarray(py)
    }
}

/// ForecastResult — observed overlap, forecast path and mixing history.
///
/// Notes
/// -----
/// - `mixing_history` is `N² × L`; column `t` reshaped row-major is the
///   `N × N` operator in force around time `t`.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_spatiotemporal.mixing")]
pub struct ForecastResult {
    pub inner: ForecastBundle,
    pub retrains: usize,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl ForecastResult {
    #[getter]
    pub fn observed<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.inner.observed.clone().into_pyarray(py)
    }

    #[getter]
    pub fn forecast<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.inner.forecast.clone().into_pyarray(py)
    }

    #[getter]
    pub fn mixing_history<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.inner.mixing_history.clone().into_pyarray(py)
    }

    #[getter]
    pub fn mse(&self) -> Option<f64> {
        self.inner.mse
    }

    #[getter]
    pub fn retrains(&self) -> usize {
        self.retrains
    }

    #[pyo3(text_signature = "(self, path)")]
    pub fn save(&self, path: &str) -> PyResult<()> {
        Ok(self.inner.save(Path::new(path))?)
    }
}

/// StationaryMixing — Python-facing wrapper for [`StationaryMixingModel`].
///
/// Constructed from Python via
/// `StationaryMixing(distances, shape='convex_dec', normalization='row_softmax', knots=None)`;
/// fitted with L-BFGS by `fit(series, window)` and evaluated in-sample by
/// `forecast(series, window)`.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_spatiotemporal.mixing", unsendable)]
pub struct StationaryMixing {
    pub inner: StationaryMixingModel,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl StationaryMixing {
    #[new]
    #[pyo3(
        signature = (distances, shape = None, normalization = None, knots = None, distance_range = None),
        text_signature = "(distances, /, shape='convex_dec', normalization='row_softmax', \
                          knots=None, distance_range=None)"
    )]
    pub fn new<'py>(
        py: Python<'py>, distances: &Bound<'py, PyAny>, shape: Option<&str>,
        normalization: Option<&str>, knots: Option<usize>, distance_range: Option<(f64, f64)>,
    ) -> PyResult<Self> {
        let d = scaled_distances(py, distances, distance_range)?;
        let config = extract_model_config(Some(shape.unwrap_or("convex_dec")), knots, None)?;
        let basis = BasisMatrix::new(&d, config.shape, config.knots)?;
        let inner = StationaryMixingModel::new(basis, extract_normalization(normalization)?);
        Ok(StationaryMixing { inner })
    }

    #[pyo3(
        signature = (
            series,
            window = None,
            theta0 = None,
            seed = None,
            tol_grad = None,
            tol_cost = None,
            max_iter = None,
            line_searcher = None,
            lbfgs_mem = None,
            verbose = None,
        ),
        text_signature = "(self, series, /, window=1, theta0=None, seed=0, tol_grad=None, \
                          tol_cost=None, max_iter=None, line_searcher=None, lbfgs_mem=None, \
                          verbose=False)"
    )]
    pub fn fit<'py>(
        &mut self, py: Python<'py>, series: &Bound<'py, PyAny>, window: Option<usize>,
        theta0: Option<&Bound<'py, PyAny>>, seed: Option<u64>, tol_grad: Option<f64>,
        tol_cost: Option<f64>, max_iter: Option<usize>, line_searcher: Option<&str>,
        lbfgs_mem: Option<usize>, verbose: Option<bool>,
    ) -> PyResult<MixingOptimOutcome> {
        let series = extract_series(series)?;
        let windows = WindowSet::from_series(&series, window.unwrap_or(1))?;
        let opts =
            extract_loss_opts(tol_grad, tol_cost, max_iter, line_searcher, lbfgs_mem, verbose)?;
        let theta0: Theta = match theta0 {
            Some(raw) => extract_f64_array(py, raw)?.as_array().to_owned(),
            None => {
                let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed.unwrap_or(0));
                self.inner.initial_theta(WeightInit::XavierNormal, &mut rng)?
            }
        };
        let outcome = self.inner.fit(theta0, &windows, &opts)?.clone();
        Ok(MixingOptimOutcome { inner: outcome })
    }

    #[pyo3(signature = (series, window = None), text_signature = "(self, series, /, window=1)")]
    pub fn forecast<'py>(
        &self, series: &Bound<'py, PyAny>, window: Option<usize>,
    ) -> PyResult<ForecastResult> {
        let series = extract_series(series)?;
        let bundle = self.inner.forecast(&series, window.unwrap_or(1))?;
        Ok(ForecastResult { inner: bundle, retrains: 0 })
    }

    #[getter]
    pub fn results(&self) -> Option<MixingOptimOutcome> {
        self.inner.outcome().map(|o| MixingOptimOutcome { inner: o.clone() })
    }

    #[getter]
    pub fn mixing_matrix<'py>(&self, py: Python<'py>) -> PyResult<Option<Bound<'py, PyArray2<f64>>>> {
        match self.inner.outcome() {
            Some(o) => {
                let m = self.inner.mixing_matrix(&o.theta_hat).map_err(mixing::MixingError::from)?;
                Ok(Some(m.into_pyarray(py)))
            }
            None => Ok(None),
        }
    }
}

/// MixingOptimOutcome — Python view of an L-BFGS [`OptimOutcome`].
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_spatiotemporal.mixing")]
pub struct MixingOptimOutcome {
    pub inner: OptimOutcome,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl MixingOptimOutcome {
    #[getter]
    pub fn theta_hat<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.theta_hat.clone().into_pyarray(py)
    }

    #[getter]
    pub fn value(&self) -> f64 {
        self.inner.value
    }

    #[getter]
    pub fn converged(&self) -> bool {
        self.inner.converged
    }

    #[getter]
    pub fn status(&self) -> String {
        self.inner.status.clone()
    }

    #[getter]
    pub fn iterations(&self) -> usize {
        self.inner.iterations
    }

    #[getter]
    pub fn grad_norm(&self) -> Option<f64> {
        self.inner.grad_norm
    }

    #[getter]
    pub fn fn_evals(&self) -> Vec<(String, u64)> {
        self.inner.fn_evals.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }
}

/// Python module initializer for `_rust_spatiotemporal`.
///
/// Creates the `mixing` submodule, registers it, and inserts it into
/// `sys.modules` as `rust_spatiotemporal.mixing` so dot-notation imports
/// work.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _rust_spatiotemporal<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let mixing_mod = PyModule::new(_py, "mixing")?;
    mixing_models(_py, m, &mixing_mod)?;

    // Manually add submodules into sys.modules to allow for dot notation.
    _py.import("sys")?.getattr("modules")?.set_item("rust_spatiotemporal.mixing", mixing_mod)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn mixing_models<'py>(
    _py: Python, rust_spatiotemporal: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>,
) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(basis_function, m)?)?;
    m.add_function(wrap_pyfunction!(train, m)?)?;
    m.add_function(wrap_pyfunction!(rolling_forecast, m)?)?;
    m.add_class::<TrainSummary>()?;
    m.add_class::<ForecastResult>()?;
    m.add_class::<StationaryMixing>()?;
    m.add_class::<MixingOptimOutcome>()?;
    rust_spatiotemporal.add_submodule(m)?;
    Ok(())
}
