//! Protocol-level signal evaluation.
//!
//! The fitters rely on three primitive operations:
//! - evaluate a unit-amplitude shape for a candidate T1 (nonlinear / linear fits)
//! - build a design row for a given sample and T1 (reduced-dimension OLS)
//! - predict the fitted curve from a `FitResult` (residuals / plots)
//!
//! `evaluate` is the public evaluator: it validates its inputs and is a pure
//! function of `(protocol, tissue, variant, magnitude)`.

use crate::domain::{
    AcquisitionProtocol, EquationVariant, FitResult, FittedModel, SequenceKind, SignalCurve,
    TissueParameters,
};
use crate::error::Result;
use crate::math::decay;
use crate::models::{ir_shape, vfa_shape};

/// Evaluate the closed-form signal at every protocol sample point.
pub fn evaluate(
    protocol: &AcquisitionProtocol,
    tissue: &TissueParameters,
    variant: EquationVariant,
    magnitude: bool,
) -> Result<SignalCurve> {
    protocol.validate()?;
    tissue.validate()?;

    let amplitude = tissue.amplitude();
    let values = shape(protocol, variant, tissue.t1_ms)
        .into_iter()
        .map(|s| {
            let v = amplitude * s;
            if magnitude { v.abs() } else { v }
        })
        .collect();

    Ok(SignalCurve {
        kind: protocol.kind(),
        x: protocol.abscissa().to_vec(),
        values,
        magnitude,
    })
}

/// Unit-amplitude signal for every sample point (no validation).
pub fn shape(protocol: &AcquisitionProtocol, variant: EquationVariant, t1_ms: f64) -> Vec<f64> {
    (0..protocol.len())
        .map(|i| shape_at(protocol, variant, i, t1_ms))
        .collect()
}

/// Unit-amplitude signal at sample `idx`.
pub fn shape_at(protocol: &AcquisitionProtocol, variant: EquationVariant, idx: usize, t1_ms: f64) -> f64 {
    match protocol {
        AcquisitionProtocol::Ir(p) => ir_shape(
            variant,
            p.ti_ms()[idx],
            p.tr_ms(),
            t1_ms,
            p.inversion_deg(),
            p.excitation_deg(),
        ),
        AcquisitionProtocol::Vfa(p) => vfa_shape(variant, p.flip_deg()[idx], p.tr_ms(), t1_ms),
    }
}

/// Number of linear coefficients solved per T1 candidate.
pub fn design_len(kind: SequenceKind) -> usize {
    match kind {
        SequenceKind::Ir => 2,
        SequenceKind::Vfa => 1,
    }
}

/// Fill a design row for the reduced-dimension model at sample `idx`.
///
/// - IR: `[1, exp(-TI/T1)]` (the signal is `a + b·exp(-TI/T1)` for any TR)
/// - VFA: `[shape_full(α; T1)]`
///
/// # Panics
/// Panics if `out` is shorter than `design_len(protocol.kind())`.
pub fn fill_design_row(protocol: &AcquisitionProtocol, idx: usize, t1_ms: f64, out: &mut [f64]) {
    match protocol {
        AcquisitionProtocol::Ir(p) => {
            out[0] = 1.0;
            out[1] = decay(p.ti_ms()[idx], t1_ms);
        }
        AcquisitionProtocol::Vfa(_) => {
            out[0] = shape_at(protocol, EquationVariant::Full, idx, t1_ms);
        }
    }
}

/// Signed fitted signal at every protocol sample point.
pub fn predict(protocol: &AcquisitionProtocol, fit: &FitResult) -> Vec<f64> {
    match fit.model {
        FittedModel::Scaled {
            amplitude,
            equation,
        } => shape(protocol, equation, fit.t1_ms)
            .into_iter()
            .map(|s| amplitude * s)
            .collect(),
        FittedModel::Exponential { a, b } => protocol
            .abscissa()
            .iter()
            .map(|&ti| a + b * decay(ti, fit.t1_ms))
            .collect(),
    }
}
