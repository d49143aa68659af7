//! Nonlinear least squares on the full signal equation.
//!
//! Parameters are `[A, T1]`. Magnitude data are fitted with `|A·shape(T1)|`, which
//! removes the need for polarity restoration at the cost of a kink at the null.

use log::{debug, warn};

use crate::domain::{AcquisitionProtocol, EquationVariant, FitKind, FitResult, FittedModel};
use crate::error::{Result, T1Error};
use crate::fit::FitOptions;
use crate::fit::fitter::finish;
use crate::math::{LmOptions, LmStatus, levenberg_marquardt};
use crate::models::shape;

/// Levenberg–Marquardt fit of `(A, T1)` starting from `initial_t1_ms`.
///
/// Hitting the iteration cap is `FitNotConverged`. A stall away from a stationary
/// point or an unusable Jacobian is `FitFailed`.
pub fn fit_nonlinear(
    protocol: &AcquisitionProtocol,
    values: &[f64],
    magnitude: bool,
    opts: &FitOptions,
    initial_t1_ms: f64,
) -> Result<FitResult> {
    if !(initial_t1_ms.is_finite() && initial_t1_ms > 0.0) {
        return Err(T1Error::invalid("initial_t1_ms", initial_t1_ms, "must be finite and > 0"));
    }
    if !(opts.tolerance.is_finite() && opts.tolerance > 0.0) {
        return Err(T1Error::invalid("tolerance", opts.tolerance, "must be finite and > 0"));
    }
    if opts.max_iterations == 0 {
        return Err(T1Error::invalid("max_iterations", 0.0, "must be >= 1"));
    }
    if values.len() < 2 {
        return Err(T1Error::fit_failed("nonlinear fit needs at least two samples"));
    }

    let initial_amplitude = project_amplitude(protocol, values, magnitude, initial_t1_ms);
    debug!("nonlinear start: A={initial_amplitude:.6} T1={initial_t1_ms:.3}ms");

    let residuals = |p: &[f64]| -> Option<Vec<f64>> {
        let (a, t1) = (p[0], p[1]);
        if !(a.is_finite() && t1.is_finite() && t1 > 0.0) {
            return None;
        }
        Some(
            shape(protocol, EquationVariant::Full, t1)
                .iter()
                .zip(values)
                .map(|(&g, &y)| {
                    let m = a * g;
                    (if magnitude { m.abs() } else { m }) - y
                })
                .collect(),
        )
    };

    let lm = LmOptions {
        max_iterations: opts.max_iterations,
        tolerance: opts.tolerance,
        ..LmOptions::default()
    };
    let outcome = levenberg_marquardt(residuals, &[initial_amplitude, initial_t1_ms], &lm)
        .ok_or_else(|| T1Error::fit_failed("initial guess produces non-finite residuals"))?;

    match outcome.status {
        LmStatus::Converged => {}
        LmStatus::MaxIterations => {
            warn!(
                "nonlinear fit hit the {} iteration cap (cost={:.3e})",
                outcome.iterations, outcome.cost
            );
            return Err(T1Error::FitNotConverged {
                iterations: outcome.iterations,
                cost: outcome.cost,
            });
        }
        LmStatus::Stalled => {
            return Err(T1Error::fit_failed(format!(
                "no downhill step from T1={:.3}ms (cost={:.3e}) and the point is not stationary",
                outcome.params[1], outcome.cost
            )));
        }
        LmStatus::JacobianFailed => {
            return Err(T1Error::fit_failed(format!(
                "signal derivatives are undefined around T1={:.3}ms",
                outcome.params[1]
            )));
        }
    }

    let amplitude = if magnitude { outcome.params[0].abs() } else { outcome.params[0] };
    finish(
        protocol,
        values,
        magnitude,
        outcome.params[1],
        FittedModel::Scaled {
            amplitude,
            equation: EquationVariant::Full,
        },
        FitKind::Nonlinear,
        outcome.iterations,
    )
}

/// Least-squares amplitude for a fixed T1: `A = Σ y·g / Σ g²`.
fn project_amplitude(protocol: &AcquisitionProtocol, values: &[f64], magnitude: bool, t1_ms: f64) -> f64 {
    let g = shape(protocol, EquationVariant::Full, t1_ms);
    let (num, den) = g.iter().zip(values).fold((0.0, 0.0), |(num, den), (&g, &y)| {
        let g = if magnitude { g.abs() } else { g };
        (num + g * y, den + g * g)
    });
    if den > 0.0 && (num / den).is_finite() { num / den } else { 1.0 }
}
