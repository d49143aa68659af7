//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{AcquisitionProtocol, FitResult, SignalCurve};
use crate::error::AppError;
use crate::models::predict;

/// One observed sample next to the fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResidual {
    /// TI (ms) or flip angle (degrees).
    pub x: f64,
    pub observed: f64,
    pub fitted: f64,
    pub residual: f64,
}

/// Compute fitted values and residuals for each sample.
///
/// Magnitude curves are compared against `|model|`.
pub fn compute_residuals(
    protocol: &AcquisitionProtocol,
    curve: &SignalCurve,
    fit: &FitResult,
) -> Result<Vec<SampleResidual>, AppError> {
    let fitted = predict(protocol, fit);
    if fitted.len() != curve.len() {
        return Err(AppError::new(
            2,
            format!("Curve has {} samples but the protocol has {}.", curve.len(), fitted.len()),
        ));
    }

    let mut out = Vec::with_capacity(curve.len());
    for ((x, observed), y_fit) in curve.points().zip(fitted) {
        let y_fit = if curve.magnitude { y_fit.abs() } else { y_fit };
        if !y_fit.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        out.push(SampleResidual {
            x,
            observed,
            fitted: y_fit,
            residual: observed - y_fit,
        });
    }
    Ok(out)
}
