//! loss_optimizer::builders — L-BFGS solver construction helpers.
//!
//! Builders apply the L-BFGS memory and the optional gradient / cost-change
//! tolerances from [`LossOptions`]. The initial parameter vector and the
//! iteration cap are runtime concerns left to [`run_lbfgs`](super::run::run_lbfgs).
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    errors::OptResult,
    loss_optimizer::{
        traits::LossOptions,
        types::{
            Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente, Loss, MoreThuenteLS, Theta,
            DEFAULT_LBFGS_MEM,
        },
    },
};

/// Construct L-BFGS with Hager–Zhang line search.
///
/// # Errors
/// `OptError` (via `From<argmin::core::Error>`) when argmin rejects a
/// tolerance.
pub fn build_optimizer_hager_zhang(opts: &LossOptions) -> OptResult<LbfgsHagerZhang> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsHagerZhang::new(HagerZhangLS::new(), mem), opts)
}

/// Construct L-BFGS with More–Thuente line search.
///
/// # Errors
/// Same as [`build_optimizer_hager_zhang`].
pub fn build_optimizer_more_thuente(opts: &LossOptions) -> OptResult<LbfgsMoreThuente> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsMoreThuente::new(MoreThuenteLS::new(), mem), opts)
}

/// Apply the optional tolerances in `opts` to an L-BFGS solver of any
/// line-search type. Absent tolerances keep argmin's defaults.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Loss>, opts: &LossOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Loss>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}
