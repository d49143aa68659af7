//! Levenberg–Marquardt for small nonlinear least-squares problems.
//!
//! Minimizes `½ Σ r_i(p)²` for a residual function supplied by the caller.
//!
//! - Jacobian: central finite differences (one-sided next to an infeasible region)
//! - Damping: Marquardt scaling, `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr`
//! - Infeasible trial points (the residual function returns `None`) are treated as
//!   rejected steps, which is how the fitters keep `T1 > 0`
//!
//! How the search ended is reported in `LmOutcome::status`. Running out of
//! iterations, stalling away from a stationary point, and an unusable Jacobian
//! are distinct outcomes.

use nalgebra::{DMatrix, DVector};

/// Relative finite-difference step.
const FD_STEP: f64 = 1e-6;

/// Damping above which no further progress is attempted.
const LAMBDA_MAX: f64 = 1e16;

/// Cost ratio (current / initial) treated as an exact fit.
const EXACT_FIT: f64 = 1e-28;

/// Largest Gauss–Newton predicted decrease, relative to the cost, that still counts
/// as stationary when no downhill step can be found.
const STATIONARY_DECREASE: f64 = 1e-8;

/// Solver controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    /// Maximum number of Jacobian evaluations.
    pub max_iterations: usize,
    /// Relative tolerance on parameter steps and cost reduction.
    pub tolerance: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmStatus {
    /// A step, cost, or stationarity criterion was met.
    Converged,
    /// `max_iterations` Jacobians were used without meeting a criterion.
    MaxIterations,
    /// No damping produced a downhill step, and the point is not stationary.
    Stalled,
    /// The residual function rejected both finite-difference points of a parameter.
    JacobianFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmOutcome {
    pub params: Vec<f64>,
    /// Final `½ Σ r²`.
    pub cost: f64,
    pub iterations: usize,
    pub status: LmStatus,
}

impl LmOutcome {
    pub fn converged(&self) -> bool {
        self.status == LmStatus::Converged
    }
}

/// Run Levenberg–Marquardt from `initial`.
///
/// Returns `None` when the residual function rejects the starting point.
pub fn levenberg_marquardt<F>(residuals: F, initial: &[f64], opts: &LmOptions) -> Option<LmOutcome>
where
    F: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let mut params = initial.to_vec();
    let mut r = residuals(&params)?;
    let mut cost = half_sq(&r);
    if !cost.is_finite() {
        return None;
    }

    let cost0 = cost;
    let p = params.len();
    let mut lambda = opts.initial_lambda.max(1e-12);

    let outcome = |params: Vec<f64>, cost: f64, iterations: usize, status: LmStatus| LmOutcome {
        params,
        cost,
        iterations,
        status,
    };

    if cost == 0.0 {
        return Some(outcome(params, cost, 0, LmStatus::Converged));
    }

    for iter in 1..=opts.max_iterations {
        let Some(jac) = jacobian(&residuals, &params, &r) else {
            return Some(outcome(params, cost, iter, LmStatus::JacobianFailed));
        };
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let g = &jt * DVector::from_column_slice(&r);

        loop {
            let mut a = jtj.clone();
            for i in 0..p {
                let d = jtj[(i, i)];
                a[(i, i)] += lambda * if d > 0.0 { d } else { 1.0 };
            }

            let step = a.cholesky().map(|c| c.solve(&(-&g)));
            if let Some(step) = step {
                let trial: Vec<f64> = params.iter().zip(step.iter()).map(|(x, d)| x + d).collect();
                if let Some(r_new) = residuals(&trial) {
                    let cost_new = half_sq(&r_new);
                    if cost_new.is_finite() && cost_new < cost {
                        let step_norm = step.norm();
                        let param_norm = params.iter().map(|v| v * v).sum::<f64>().sqrt();
                        let reduction = cost - cost_new;

                        params = trial;
                        r = r_new;
                        cost = cost_new;
                        lambda = (lambda / 10.0).max(1e-12);

                        let small_step = step_norm <= opts.tolerance * (param_norm + opts.tolerance);
                        let small_reduction = reduction <= opts.tolerance * (cost + reduction);
                        if small_step || small_reduction || cost <= EXACT_FIT * cost0 {
                            return Some(outcome(params, cost, iter, LmStatus::Converged));
                        }
                        break;
                    }
                }
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No downhill step at any damping: accept only if stationary.
                let stationary = cost <= EXACT_FIT * cost0
                    || predicted_decrease(&jtj, &g).is_some_and(|d| d <= STATIONARY_DECREASE * cost);
                let status = if stationary { LmStatus::Converged } else { LmStatus::Stalled };
                return Some(outcome(params, cost, iter, status));
            }
        }
    }

    let iterations = opts.max_iterations;
    Some(outcome(params, cost, iterations, LmStatus::MaxIterations))
}

/// Cost decrease promised by the Gauss–Newton step: `½ gᵀ(JᵀJ)⁻¹g`.
/// Invariant under rescaling of the parameters.
fn predicted_decrease(jtj: &DMatrix<f64>, g: &DVector<f64>) -> Option<f64> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        let d = jtj[(i, i)];
        a[(i, i)] += 1e-12 * if d > 0.0 { d } else { 1.0 };
    }
    let step = a.cholesky()?.solve(g);
    let decrease = 0.5 * g.dot(&step);
    decrease.is_finite().then_some(decrease.max(0.0))
}

fn half_sq(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

fn jacobian<F>(residuals: &F, params: &[f64], r0: &[f64]) -> Option<DMatrix<f64>>
where
    F: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let m = r0.len();
    let mut jac = DMatrix::<f64>::zeros(m, params.len());
    let mut shifted = params.to_vec();

    for j in 0..params.len() {
        let h = FD_STEP * params[j].abs().max(1.0);

        shifted[j] = params[j] + h;
        let fwd = residuals(&shifted).filter(|v| v.len() == m);
        shifted[j] = params[j] - h;
        let bwd = residuals(&shifted).filter(|v| v.len() == m);
        shifted[j] = params[j];

        for i in 0..m {
            jac[(i, j)] = match (&fwd, &bwd) {
                (Some(f), Some(b)) => (f[i] - b[i]) / (2.0 * h),
                (Some(f), None) => (f[i] - r0[i]) / h,
                (None, Some(b)) => (r0[i] - b[i]) / h,
                (None, None) => return None,
            };
        }
    }

    Some(jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exp_residuals(x: &[f64], y: &[f64]) -> impl Fn(&[f64]) -> Option<Vec<f64>> {
        let x = x.to_vec();
        let y = y.to_vec();
        move |p: &[f64]| {
            if p[1] <= 0.0 {
                return None;
            }
            Some(
                x.iter()
                    .zip(&y)
                    .map(|(&xi, &yi)| p[0] * (-xi / p[1]).exp() - yi)
                    .collect(),
            )
        }
    }

    #[test]
    fn recovers_exponential_decay() {
        let x: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * (-v / 2.0).exp()).collect();

        let out = levenberg_marquardt(exp_residuals(&x, &y), &[1.0, 0.7], &LmOptions::default())
            .unwrap();
        assert!(out.converged());
        assert_relative_eq!(out.params[0], 3.0, max_relative = 1e-6);
        assert_relative_eq!(out.params[1], 2.0, max_relative = 1e-6);
    }

    #[test]
    fn reports_non_convergence_when_capped() {
        let x: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * (-v / 2.0).exp()).collect();

        let opts = LmOptions {
            max_iterations: 1,
            ..LmOptions::default()
        };
        let out = levenberg_marquardt(exp_residuals(&x, &y), &[0.1, 40.0], &opts).unwrap();
        assert_eq!(out.status, LmStatus::MaxIterations);
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn restarting_at_a_noisy_minimum_reports_convergence() {
        let x: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 3.0 * (-v / 2.0).exp() + if i % 2 == 0 { 0.01 } else { -0.013 })
            .collect();

        let first = levenberg_marquardt(exp_residuals(&x, &y), &[1.0, 0.7], &LmOptions::default()).unwrap();
        assert!(first.converged(), "{:?}", first.status);
        assert!(first.cost > 1e-6);

        let again = levenberg_marquardt(exp_residuals(&x, &y), &first.params, &LmOptions::default()).unwrap();
        assert_eq!(again.status, LmStatus::Converged);
        assert_relative_eq!(again.params[1], first.params[1], max_relative = 1e-6);
    }

    #[test]
    fn unusable_jacobian_is_not_an_iteration_cap() {
        let residuals = |p: &[f64]| (p[0] == 1.0 && p[1] == 1.0).then(|| vec![1.0, 2.0]);
        let out = levenberg_marquardt(residuals, &[1.0, 1.0], &LmOptions::default()).unwrap();
        assert_eq!(out.status, LmStatus::JacobianFailed);
    }

    #[test]
    fn rejects_infeasible_start() {
        let out = levenberg_marquardt(exp_residuals(&[1.0], &[1.0]), &[1.0, -1.0], &LmOptions::default());
        assert!(out.is_none());
    }
}
