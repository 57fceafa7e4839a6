//! Errors for the optimization layer (solver configuration, gradients,
//! stochastic optimizer state, and argmin backend failures).
//!
//! [`OptError`] is the single error surface of `optimization::*`. Model-layer
//! errors raised inside a [`LossFunction`](crate::optimization::loss_optimizer::LossFunction)
//! are carried through as [`OptError::Model`] so the solver never needs to
//! know about model-specific enums.
use argmin::core::{ArgminError, Error};
use thiserror::Error;

use crate::mixing::errors::MixingError;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that FD should be used
    #[error("Gradient not implemented")]
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    /// Gradient elements need to be finite
    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- LossOptions ----
    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    #[error("Invalid cost function change tolerance {tol}: {reason}")]
    InvalidTolCost { tol: f64, reason: &'static str },

    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    /// At least one tolerance must be provided.
    #[error("No tolerances provided")]
    NoTolerancesProvided,

    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    /// lbfgs_mem needs to be at least 1.
    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- Gradient-descent optimizers ----
    #[error("Invalid learning rate {value}: {reason}")]
    InvalidLearningRate { value: f64, reason: &'static str },

    /// Momentum / decay coefficients must lie in [0, 1).
    #[error("Invalid optimizer coefficient '{name}' = {value}: {reason}")]
    InvalidCoefficient { name: &'static str, value: f64, reason: &'static str },

    #[error("Parameter shape {params:?} does not match gradient shape {grads:?}")]
    ParamShapeMismatch { params: Vec<usize>, grads: Vec<usize> },

    #[error("Optimizer state does not match optimizer kind")]
    StateMismatch,

    // ---- Cost function ----
    #[error("Non-finite cost value: {value}")]
    NonFiniteCost { value: f64 },

    // ---- Optimizer outcome ----
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    #[error("Missing estimated parameters (theta hat)")]
    MissingThetaHat,

    #[error("Invalid theta input at index {index}: {value}, must be finite")]
    InvalidThetaInput { index: usize, value: f64 },

    #[error("Theta length mismatch: expected {expected}, actual {actual}")]
    ThetaLengthMismatch { expected: usize, actual: usize },

    // ---- Model ----
    /// A model-layer failure raised inside a loss evaluation.
    #[error("Model error: {0}")]
    Model(Box<MixingError>),

    // ---- Argmin ----
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },
    #[error("Not implemented: {text}")]
    NotImplemented { text: String },
    #[error("Not initialized: {text}")]
    NotInitialized { text: String },
    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },
    #[error("Checkpoint not found: {text}")]
    CheckPointNotFound { text: String },
    #[error("Potential bug: {text}")]
    PotentialBug { text: String },
    #[error("Impossible error: {text}")]
    ImpossibleError { text: String },
    /// Wrapper for other argmin::Error types
    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        // Errors raised by our own cost/gradient come back wrapped by argmin.
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

impl From<MixingError> for OptError {
    fn from(err: MixingError) -> Self {
        match err {
            MixingError::Optimization(inner) => inner,
            other => OptError::Model(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Errors raised by our own adapter survive the round trip through
    // `argmin::core::Error` unchanged.
    fn own_errors_round_trip_through_argmin() {
        let err: Error = OptError::NonFiniteCost { value: f64::INFINITY }.into();
        let back = OptError::from(err);
        assert_eq!(back, OptError::NonFiniteCost { value: f64::INFINITY });
    }

    #[test]
    fn argmin_errors_map_to_named_variants() {
        let err: Error = ArgminError::InvalidParameter { text: "bad".to_string() }.into();
        assert_eq!(OptError::from(err), OptError::InvalidParameter { text: "bad".to_string() });
    }

    #[test]
    fn model_errors_are_boxed_and_optimizer_errors_unwrapped() {
        let wrapped = OptError::from(MixingError::EmptySeries);
        assert_eq!(wrapped, OptError::Model(Box::new(MixingError::EmptySeries)));

        let passthrough = OptError::from(MixingError::Optimization(OptError::StateMismatch));
        assert_eq!(passthrough, OptError::StateMismatch);
    }
}
