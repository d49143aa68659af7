//! Linear least squares.
//!
//! Two consumers:
//!
//! - the reduced-dimension fitter, which solves a tiny (1–2 column) problem for every
//!   T1 candidate on its grid
//! - the closed-form fitters, which run a weighted straight-line regression after
//!   linearizing the signal equation
//!
//! Implementation choices:
//! - Weighted problems are solved by scaling rows with `sqrt(w_i)`.
//! - SVD handles tall systems and near-collinear columns (nalgebra's `QR::solve`
//!   only accepts square systems).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Straight-line fit `y ≈ intercept + slope·x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub intercept: f64,
    pub slope: f64,
    /// Weighted sum of squared residuals.
    pub sse: f64,
}

/// Weighted straight-line regression.
///
/// `weights` of `None` means uniform. Requires at least two points with distinct `x`.
pub fn fit_line(x: &[f64], y: &[f64], weights: Option<&[f64]>) -> Option<LineFit> {
    let n = x.len();
    if n < 2 || y.len() != n || weights.is_some_and(|w| w.len() != n) {
        return None;
    }

    let x_first = x[0];
    if x.iter().all(|&v| (v - x_first).abs() <= f64::EPSILON * x_first.abs().max(1.0)) {
        return None;
    }

    let mut design = DMatrix::<f64>::zeros(n, 2);
    let mut rhs = DVector::<f64>::zeros(n);
    for i in 0..n {
        let w = weights.map_or(1.0, |w| w[i]);
        if !(w.is_finite() && w >= 0.0) {
            return None;
        }
        let sw = w.sqrt();
        design[(i, 0)] = sw;
        design[(i, 1)] = x[i] * sw;
        rhs[i] = y[i] * sw;
    }

    let beta = solve_least_squares(&design, &rhs)?;
    let (intercept, slope) = (beta[0], beta[1]);

    let sse = (0..n)
        .map(|i| {
            let w = weights.map_or(1.0, |w| w[i]);
            let r = y[i] - (intercept + slope * x[i]);
            w * r * r
        })
        .sum();

    Some(LineFit {
        intercept,
        slope,
        sse,
    })
}
