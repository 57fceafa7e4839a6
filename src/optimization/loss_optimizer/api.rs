//! High-level entry point for minimizing a [`LossFunction`].
use crate::optimization::{
    errors::OptResult,
    loss_optimizer::{
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LossFunction, LossOptions, OptimOutcome},
        types::Theta,
    },
};

/// Minimize `L(θ)` with L-BFGS and the line search chosen in `opts`.
///
/// # Behavior
/// - Validates the initial guess via `f.check(theta0, data)`.
/// - Wraps `(f, data)` in an [`ArgMinAdapter`].
/// - Builds an L-BFGS solver (More–Thuente or Hager–Zhang).
/// - Runs it through [`run_lbfgs`].
///
/// # Errors
/// Propagates errors from `f.check`, the builders and the run.
///
/// # Example
/// ```no_run
/// use ndarray::array;
/// use rust_spatiotemporal::optimization::errors::OptResult;
/// use rust_spatiotemporal::optimization::loss_optimizer::{
///     minimize, LossFunction, LossOptions, Theta,
/// };
///
/// struct Bowl;
/// impl LossFunction for Bowl {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(theta.dot(theta))
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = minimize(&Bowl, array![0.1, -0.2, 0.3], &(), &LossOptions::default())?;
/// println!("θ̂ = {:?}", out.theta_hat);
/// # Ok::<(), rust_spatiotemporal::optimization::errors::OptError>(())
/// ```
pub fn minimize<F: LossFunction>(
    f: &F, theta0: Theta, data: &F::Data, opts: &LossOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{
        errors::OptError,
        loss_optimizer::{traits::Tolerances, types::Grad},
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // Convex bowl centred at `target`.
    struct Bowl;

    impl LossFunction for Bowl {
        type Data = Theta;

        fn value(&self, theta: &Theta, target: &Theta) -> OptResult<f64> {
            Ok((theta - target).mapv(|x| x * x).sum())
        }

        fn check(&self, theta: &Theta, target: &Theta) -> OptResult<()> {
            if theta.len() != target.len() {
                return Err(OptError::ThetaLengthMismatch {
                    expected: target.len(),
                    actual: theta.len(),
                });
            }
            Ok(())
        }

        fn grad(&self, theta: &Theta, target: &Theta) -> OptResult<Grad> {
            Ok((theta - target).mapv(|x| 2.0 * x))
        }
    }

    #[test]
    // Purpose
    // -------
    // Both line searches drive a convex quadratic to its minimum.
    //
    // Given
    // -----
    // - `L(θ) = ||θ − (1, −2)||²`, start at the origin.
    //
    // Expect
    // ------
    // - `θ̂ ≈ (1, −2)`, `L(θ̂) ≈ 0`, solver reports termination.
    fn minimize_finds_bowl_minimum_with_both_line_searches() {
        for ls in [LineSearcher::MoreThuente, LineSearcher::HagerZhang] {
            // Arrange
            let target = array![1.0, -2.0];
            let opts = LossOptions::new(Tolerances::default(), ls, false, None).unwrap();

            // Act
            let out = minimize(&Bowl, array![0.0, 0.0], &target, &opts).unwrap();

            // Assert
            assert_relative_eq!(out.theta_hat[0], 1.0, epsilon = 1e-5);
            assert_relative_eq!(out.theta_hat[1], -2.0, epsilon = 1e-5);
            assert!(out.value < 1e-8);
            assert!(out.converged);
        }
    }

    #[test]
    fn check_failure_short_circuits() {
        let err =
            minimize(&Bowl, array![0.0], &array![1.0, 2.0], &LossOptions::default()).unwrap_err();
        assert_eq!(err, OptError::ThetaLengthMismatch { expected: 2, actual: 1 });
    }
}
