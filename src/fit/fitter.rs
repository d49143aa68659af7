//! Fit dispatch.
//!
//! Given:
//! - an acquisition protocol
//! - an observed signal curve (signed or magnitude)
//! - fitting options
//!
//! we validate the pair, resolve the fitting policy, run it, and attach the
//! goodness-of-fit diagnostics (SSE / RMSE in signal units).

use log::{debug, info};

use crate::domain::{AcquisitionProtocol, FitKind, FitMethod, FitResult, FittedModel, SequenceKind, SignalCurve};
use crate::error::{Result, T1Error};
use crate::fit::{linear, nonlinear, reduced};
use crate::models::predict;

/// Fitting options shared by every policy.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub method: FitMethod,

    /// Starting T1 (ms) for the nonlinear search.
    pub initial_t1_ms: f64,
    /// Relative convergence tolerance for the nonlinear search.
    pub tolerance: f64,
    /// Iteration cap for the nonlinear search.
    pub max_iterations: usize,

    /// Reduced-dimension search range (ms).
    pub t1_min_ms: f64,
    pub t1_max_ms: f64,
    /// Grid points per pass.
    pub t1_steps: usize,
    /// Extra passes, each re-gridding between the best candidate's neighbours.
    pub refine_passes: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            method: FitMethod::Auto,
            initial_t1_ms: 1000.0,
            tolerance: 1e-10,
            max_iterations: 200,
            t1_min_ms: 1.0,
            t1_max_ms: 10_000.0,
            t1_steps: 200,
            refine_passes: 2,
        }
    }
}

/// Fit T1 to an observed curve.
pub fn fit_curve(protocol: &AcquisitionProtocol, curve: &SignalCurve, opts: &FitOptions) -> Result<FitResult> {
    protocol.validate()?;
    if curve.len() != protocol.len() {
        return Err(T1Error::LengthMismatch {
            expected: protocol.len(),
            actual: curve.len(),
        });
    }
    if let Some(&bad) = curve.values.iter().find(|v| !v.is_finite()) {
        return Err(T1Error::invalid("signal", bad, "must be finite"));
    }

    let values = &curve.values;
    let magnitude = curve.magnitude;

    let fit = match opts.method {
        FitMethod::Linear => linear::fit_linear(protocol, values, magnitude)?,
        FitMethod::Nonlinear => nonlinear::fit_nonlinear(protocol, values, magnitude, opts, opts.initial_t1_ms)?,
        FitMethod::ReducedDimension => reduced::fit_reduced(protocol, values, magnitude, opts)?,
        FitMethod::Auto => fit_auto(protocol, values, magnitude, opts)?,
    };

    debug!(
        "fit ({}): T1={:.3}ms sse={:.3e} iterations={}",
        fit.method.display_name(),
        fit.t1_ms,
        fit.sse,
        fit.iterations
    );
    Ok(fit)
}

fn fit_auto(protocol: &AcquisitionProtocol, values: &[f64], magnitude: bool, opts: &FitOptions) -> Result<FitResult> {
    match protocol.kind() {
        SequenceKind::Vfa => linear::fit_linear(protocol, values, magnitude),
        SequenceKind::Ir => match linear::fit_linear(protocol, values, magnitude) {
            Err(T1Error::ApproximationInvalid { t1_ms, tr_ms, .. }) => {
                info!(
                    "long-TR approximation invalid (TR={tr_ms:.1}ms, T1≈{t1_ms:.1}ms); switching to nonlinear fit"
                );
                nonlinear::fit_nonlinear(protocol, values, magnitude, opts, t1_ms)
            }
            other => other,
        },
    }
}

/// Build a `FitResult` and compute its diagnostics against the observations.
///
/// Magnitude observations are compared to `|model|`.
pub(crate) fn finish(
    protocol: &AcquisitionProtocol,
    values: &[f64],
    magnitude: bool,
    t1_ms: f64,
    model: FittedModel,
    method: FitKind,
    iterations: usize,
) -> Result<FitResult> {
    if !(t1_ms.is_finite() && t1_ms > 0.0) {
        return Err(T1Error::fit_failed(format!("non-physical T1 estimate {t1_ms}")));
    }

    let mut fit = FitResult {
        t1_ms,
        model,
        method,
        sse: 0.0,
        rmse: 0.0,
        n: values.len(),
        iterations,
    };

    let sse: f64 = predict(protocol, &fit)
        .iter()
        .zip(values)
        .map(|(&p, &y)| {
            let p = if magnitude { p.abs() } else { p };
            (y - p) * (y - p)
        })
        .sum();
    if !sse.is_finite() {
        return Err(T1Error::fit_failed("non-finite residuals"));
    }

    fit.sse = sse;
    fit.rmse = (sse / values.len() as f64).sqrt();
    Ok(fit)
}
