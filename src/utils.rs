#[cfg(feature = "python-bindings")]
use ndarray::{Array1, Array2};

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    mixing::{
        core::{
            basis::KnotPolicy,
            data::{DistanceVector, Series},
            init::WeightInit,
            options::{
                EarlyStopping, HistorySource, ModelConfig, TrainOptions, ValidationPolicy,
            },
            shape::ShapeConstraint,
        },
        errors::MixingError,
        models::Normalization,
    },
    optimization::{
        gradient_descent::OptimizerKind,
        loss_optimizer::traits::{LineSearcher, LossOptions, Tolerances},
    },
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1, PyReadonlyArray2,
};

#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64",
        )
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Copy a 2-D array-like (ndarray, DataFrame, nested sequence) into an owned
/// `Array2<f64>`.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_matrix<'py>(raw_data: &Bound<'py, PyAny>) -> PyResult<Array2<f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro.as_array().to_owned());
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(frame_ro) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(frame_ro.as_array().to_owned());
        }
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 2-D numpy.ndarray, pandas.DataFrame, or nested sequence of float64",
        )
    })?;
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(PyValueError::new_err("nested sequence rows must all have the same length"));
    }
    let n_rows = rows.len();
    Array2::from_shape_vec((n_rows, n_cols), rows.into_iter().flatten().collect())
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// `N × T` series (nodes on rows).
#[cfg(feature = "python-bindings")]
pub fn extract_series<'py>(raw_data: &Bound<'py, PyAny>) -> PyResult<Series> {
    Ok(Series::new(extract_f64_matrix(raw_data)?)?)
}

/// Distances as a length-`N²` vector or an `N × N` matrix.
#[cfg(feature = "python-bindings")]
pub fn extract_distances<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<DistanceVector> {
    if let Ok(matrix) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(DistanceVector::from_matrix(&matrix.as_array().to_owned())?);
    }
    let arr = extract_f64_array(py, raw_data)?;
    let slice = arr.as_slice().map_err(|_| {
        PyValueError::new_err("distances must be a 1-D contiguous float64 array or sequence")
    })?;
    let n_nodes = (slice.len() as f64).sqrt().round() as usize;
    Ok(DistanceVector::new(Array1::from(slice.to_vec()), n_nodes)?)
}

#[cfg(feature = "python-bindings")]
pub fn extract_shape(shape: Option<&str>) -> PyResult<ShapeConstraint> {
    Ok(shape.unwrap_or("concave_inc").parse::<ShapeConstraint>()?)
}

/// `None` → one knot per distance; `Some(k)` → `k` quantile knots.
#[cfg(feature = "python-bindings")]
pub fn extract_knots(knots: Option<usize>) -> KnotPolicy {
    knots.map_or(KnotPolicy::OrderStatistics, KnotPolicy::Quantiles)
}

#[cfg(feature = "python-bindings")]
pub fn extract_optimizer(
    name: Option<&str>, learning_rate: Option<f64>, default: &str,
) -> PyResult<OptimizerKind> {
    let lr = learning_rate.unwrap_or(0.01);
    let name_str = name.unwrap_or(default).to_lowercase();
    let kind = match name_str.as_str() {
        "sgd" => OptimizerKind::sgd(lr),
        "rmsprop" | "rms_prop" => OptimizerKind::rms_prop(lr),
        "adam" => OptimizerKind::adam(lr),
        other => {
            return Err(PyValueError::new_err(format!(
                "invalid optimizer {:?} (expected 'sgd', 'rmsprop', or 'adam')",
                other
            )));
        }
    };
    Ok(kind.map_err(MixingError::from)?)
}

#[cfg(feature = "python-bindings")]
pub fn extract_early_stopping(
    name: Option<&str>, patience: Option<usize>,
) -> PyResult<EarlyStopping> {
    let name_str = name.unwrap_or("break").to_lowercase();
    match name_str.as_str() {
        "break" | "break_on_regression" => Ok(EarlyStopping::BreakOnRegression),
        "patience" => {
            let n = patience.ok_or_else(|| {
                PyValueError::new_err("patience must be provided when early_stopping='patience'")
            })?;
            Ok(EarlyStopping::Patience(n))
        }
        "never" => Ok(EarlyStopping::Never),
        other => Err(PyValueError::new_err(format!(
            "invalid early stopping policy {:?} (expected 'break', 'patience', or 'never')",
            other
        ))),
    }
}

#[cfg(feature = "python-bindings")]
pub fn extract_validation(
    name: Option<&str>, held_out: Option<usize>,
) -> PyResult<ValidationPolicy> {
    let name_str = name.unwrap_or("held_out").to_lowercase();
    match name_str.as_str() {
        "held_out" => Ok(ValidationPolicy::HeldOut { size: held_out.unwrap_or(50) }),
        "reference" | "reference_mixing" => Ok(ValidationPolicy::ReferenceMixing),
        other => Err(PyValueError::new_err(format!(
            "invalid validation policy {:?} (expected 'held_out' or 'reference')",
            other
        ))),
    }
}

#[cfg(feature = "python-bindings")]
pub fn extract_history(name: Option<&str>) -> PyResult<HistorySource> {
    let name_str = name.unwrap_or("autoregressive").to_lowercase();
    match name_str.as_str() {
        "autoregressive" => Ok(HistorySource::Autoregressive),
        "observed" => Ok(HistorySource::Observed),
        other => Err(PyValueError::new_err(format!(
            "invalid history source {:?} (expected 'autoregressive' or 'observed')",
            other
        ))),
    }
}

#[cfg(feature = "python-bindings")]
pub fn extract_normalization(name: Option<&str>) -> PyResult<Normalization> {
    let name_str = name.unwrap_or("row_softmax").to_lowercase();
    match name_str.as_str() {
        "identity" | "none" => Ok(Normalization::Identity),
        "min_max" | "minmax" => Ok(Normalization::MinMax),
        "row_softmax" | "softmax" => Ok(Normalization::RowSoftmax),
        other => Err(PyValueError::new_err(format!(
            "invalid normalization {:?} (expected 'identity', 'min_max', or 'row_softmax')",
            other
        ))),
    }
}

/// Model configuration shared by training and forecasting entry points.
#[cfg(feature = "python-bindings")]
pub fn extract_model_config(
    shape: Option<&str>, knots: Option<usize>, init_constant: Option<f64>,
) -> PyResult<ModelConfig> {
    Ok(ModelConfig {
        shape: extract_shape(shape)?,
        knots: extract_knots(knots),
        init: init_constant.map_or(WeightInit::XavierNormal, WeightInit::Constant),
    })
}

#[cfg(feature = "python-bindings")]
pub fn build_train_options(
    window: Option<usize>, batch_size: Option<usize>, epochs: Option<usize>,
    optimizer: Option<&str>, learning_rate: Option<f64>, shuffle: Option<bool>,
    validation: Option<&str>, held_out: Option<usize>, early_stopping: Option<&str>,
    patience: Option<usize>, model: ModelConfig, seed: Option<u64>,
) -> PyResult<TrainOptions> {
    let defaults = TrainOptions::default();
    let opts = TrainOptions {
        window: window.unwrap_or(defaults.window),
        batch_size: batch_size.unwrap_or(defaults.batch_size),
        epochs: epochs.unwrap_or(defaults.epochs),
        optimizer: extract_optimizer(optimizer, learning_rate, "sgd")?,
        shuffle: shuffle.unwrap_or(defaults.shuffle),
        validation: extract_validation(validation, held_out)?,
        early_stopping: extract_early_stopping(early_stopping, patience)?,
        model,
        seed: seed.unwrap_or(defaults.seed),
    };
    opts.validate()?;
    Ok(opts)
}

#[cfg(feature = "python-bindings")]
pub fn extract_loss_opts(
    tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    line_searcher: Option<&str>, lbfgs_mem: Option<usize>, verbose: Option<bool>,
) -> PyResult<LossOptions> {
    use std::str::FromStr;

    let defaults = Tolerances::default();
    let tols = Tolerances::new(
        tol_grad.or(defaults.tol_grad),
        tol_cost.or(defaults.tol_cost),
        max_iter.or(defaults.max_iter),
    )
    .map_err(MixingError::from)?;

    let ls = match line_searcher {
        Some(name) => LineSearcher::from_str(name).map_err(MixingError::from)?,
        None => LineSearcher::MoreThuente,
    };

    let opts =
        LossOptions::new(tols, ls, verbose.unwrap_or(false), lbfgs_mem).map_err(MixingError::from)?;

    Ok(opts)
}
