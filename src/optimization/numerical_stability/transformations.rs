//! Numerically stable matrix normalizations.
//!
//! - [`row_softmax`]: max-shifted softmax over each row.
//! - [`row_softmax_backward`]: vector–Jacobian product of [`row_softmax`].
//! - [`min_max_scale`]: affine rescaling of all entries into `[0, 1]`.
//!
//! All helpers are pure and allocate their output.
use ndarray::{Array2, Axis, Zip};

/// Ranges narrower than this are treated as degenerate by [`min_max_scale`].
pub const RANGE_EPS: f64 = 1e-12;

/// Softmax over each row of `a`, shifted by the row maximum so `exp`
/// never overflows.
pub fn row_softmax(a: &Array2<f64>) -> Array2<f64> {
    let mut out = a.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
        row.mapv_inplace(|x| (x - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|x| x / sum);
    }
    out
}

/// Pull an upstream gradient `g_out = ∂L/∂S` back through `S = row_softmax(A)`.
///
/// Row-wise: `∂L/∂A = S ∘ (g_out − ⟨g_out, S⟩)`.
pub fn row_softmax_backward(softmax: &Array2<f64>, g_out: &Array2<f64>) -> Array2<f64> {
    let mut g_in = Array2::zeros(softmax.raw_dim());
    Zip::from(g_in.rows_mut()).and(softmax.rows()).and(g_out.rows()).for_each(
        |mut gi, s, go| {
            let inner = s.dot(&go);
            Zip::from(&mut gi).and(&s).and(&go).for_each(|gi, &s, &go| *gi = s * (go - inner));
        },
    );
    g_in
}

/// Rescale all entries of `a` into `[0, 1]` by `(a − min) / (max − min)`.
///
/// A degenerate range (`max − min < RANGE_EPS`) maps every entry to zero.
pub fn min_max_scale(a: &Array2<f64>) -> Array2<f64> {
    let min = a.fold(f64::INFINITY, |m, &x| m.min(x));
    let max = a.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
    let range = max - min;
    if !(range >= RANGE_EPS) {
        return Array2::zeros(a.raw_dim());
    }
    a.mapv(|x| (x - min) / range)
}
