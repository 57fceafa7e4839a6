//! Execution helper that runs an argmin solver on an adapted loss and
//! returns an [`OptimOutcome`].
use crate::optimization::{
    errors::OptResult,
    loss_optimizer::{
        adapter::ArgMinAdapter,
        traits::{LossFunction, LossOptions, OptimOutcome},
        types::{Grad, Theta},
    },
};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient};
use argmin::core::{Executor, State};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;
use tracing::debug;

/// Run an L-BFGS solver (either line search) on `problem` starting at `theta0`.
///
/// With the `obs_slog` feature and `opts.verbose`, a terminal slog observer
/// is attached and the initial loss / gradient norm is logged first.
///
/// # Errors
/// - argmin runtime errors (line-search failures, observer errors), mapped
///   through `From<argmin::core::Error>`; errors raised by the loss itself
///   come back as their original `OptError`.
/// - Validation errors from [`OptimOutcome::new`].
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &LossOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LossFunction,
    S: argmin::core::Solver<
            ArgMinAdapter<'a, F>,
            argmin::core::IterState<Theta, Grad, (), (), (), f64>,
        > + Send
        + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        log_initial_state(&theta0, &problem)?;
    }
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.take_gradient();
    let outcome = OptimOutcome::new(
        result.take_best_param(),
        result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )?;
    debug!(
        iterations = outcome.iterations,
        loss = outcome.value,
        status = %outcome.status,
        "l-bfgs finished"
    );
    Ok(outcome)
}

// ---- Helper Methods ----

#[cfg(feature = "obs_slog")]
fn log_initial_state<F>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) -> OptResult<()>
where
    F: LossFunction,
{
    let loss0 = problem.cost(theta0)?;
    let g0n = problem.gradient(theta0).ok().map(|g| g.l2_norm());
    tracing::info!(loss = loss0, grad_norm = ?g0n, "l-bfgs initial state");
    Ok(())
}
