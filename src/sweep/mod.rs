//! TR sweep: how far the long-TR approximation drifts from the full equation.
//!
//! Each TR is evaluated independently (parallel); output order follows the input.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{AcquisitionProtocol, EquationVariant, TissueParameters};
use crate::error::Result;
use crate::models::evaluate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub tr_ms: f64,
    pub full: Vec<f64>,
    pub long_tr: Vec<f64>,
    pub max_abs_diff: f64,
    /// `max_abs_diff` relative to the largest full-equation magnitude.
    pub max_rel_diff: f64,
}

/// Evaluate both equation variants of `protocol` at every TR in `tr_values`.
pub fn sweep_tr(
    protocol: &AcquisitionProtocol,
    tissue: &TissueParameters,
    tr_values: &[f64],
    magnitude: bool,
) -> Result<Vec<SweepPoint>> {
    tr_values
        .par_iter()
        .map(|&tr_ms| {
            let p = protocol.with_tr(tr_ms)?;
            let full = evaluate(&p, tissue, EquationVariant::Full, magnitude)?.values;
            let long_tr = evaluate(&p, tissue, EquationVariant::LongTr, magnitude)?.values;

            let max_abs_diff = full
                .iter()
                .zip(&long_tr)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            let scale = full.iter().map(|v| v.abs()).fold(0.0, f64::max);
            let max_rel_diff = if scale > 0.0 { max_abs_diff / scale } else { 0.0 };

            Ok(SweepPoint {
                tr_ms,
                full,
                long_tr,
                max_abs_diff,
                max_rel_diff,
            })
        })
        .collect()
}
