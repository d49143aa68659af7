//! Reduced-dimension fit: grid search over T1, linear solve for everything else.
//!
//! For a fixed T1 both signal families are linear in their remaining constants:
//!
//! - IR: `S(TI) = a + b·exp(-TI/T1)` for any TR and pulse angles
//! - VFA: `S(α) = A·shape(α; T1)`
//!
//! so each grid candidate costs one tiny OLS solve. Magnitude IR data are handled
//! by trying every polarity split (the first `k` samples in TI order negated) and
//! keeping the best.

use std::cmp::Ordering;

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{AcquisitionProtocol, EquationVariant, FitKind, FitResult, FittedModel, SequenceKind};
use crate::error::{Result, T1Error};
use crate::fit::FitOptions;
use crate::fit::fitter::finish;
use crate::fit::t1_grid::{log_space, refine_bounds};
use crate::math::solve_least_squares;
use crate::models::{design_len, fill_design_row};

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    t1_ms: f64,
    coefs: Vec<f64>,
    sse: f64,
}

/// Grid search over T1 with `refine_passes` zoom-in passes.
pub fn fit_reduced(
    protocol: &AcquisitionProtocol,
    values: &[f64],
    magnitude: bool,
    opts: &FitOptions,
) -> Result<FitResult> {
    if values.len() != protocol.len() {
        return Err(T1Error::LengthMismatch {
            expected: protocol.len(),
            actual: values.len(),
        });
    }
    let kind = protocol.kind();
    let p = design_len(kind);
    if values.len() <= p {
        return Err(T1Error::fit_failed(format!(
            "reduced-dimension fit needs more than {p} samples, got {}",
            values.len()
        )));
    }

    let splits = polarity_splits(protocol, values, magnitude);

    let mut grid = log_space(opts.t1_min_ms, opts.t1_max_ms, opts.t1_steps)?;
    let mut best = search(protocol, &grid, &splits, p)?;
    if best.idx == 0 || best.idx + 1 == grid.len() {
        warn!(
            "best T1 {:.3}ms sits on the search boundary [{}, {}]ms",
            best.t1_ms, opts.t1_min_ms, opts.t1_max_ms
        );
    }

    let mut passes = 0;
    for _ in 0..opts.refine_passes {
        let (lo, hi) = refine_bounds(&grid, best.idx);
        if hi <= lo {
            break;
        }
        grid = log_space(lo, hi, opts.t1_steps)?;
        best = search(protocol, &grid, &splits, p)?;
        passes += 1;
    }
    debug!(
        "reduced-dimension: T1={:.4}ms sse={:.3e} after {passes} refinement passes",
        best.t1_ms, best.sse
    );

    let model = match kind {
        SequenceKind::Ir => FittedModel::Exponential {
            a: best.coefs[0],
            b: best.coefs[1],
        },
        SequenceKind::Vfa => FittedModel::Scaled {
            amplitude: if magnitude { best.coefs[0].abs() } else { best.coefs[0] },
            equation: EquationVariant::Full,
        },
    };

    finish(
        protocol,
        values,
        magnitude,
        best.t1_ms,
        model,
        FitKind::ReducedDimension,
        passes + 1,
    )
}

/// Candidate right-hand sides: the data as-is, or every polarity split for magnitude IR.
fn polarity_splits(protocol: &AcquisitionProtocol, values: &[f64], magnitude: bool) -> Vec<Vec<f64>> {
    let AcquisitionProtocol::Ir(ir) = protocol else {
        return vec![values.to_vec()];
    };
    if !magnitude {
        return vec![values.to_vec()];
    }

    let ti = ir.ti_ms();
    let mut order: Vec<usize> = (0..ti.len()).collect();
    order.sort_by(|&a, &b| ti[a].partial_cmp(&ti[b]).unwrap_or(Ordering::Equal));

    (0..=order.len())
        .map(|k| {
            let mut signed: Vec<f64> = values.iter().map(|v| v.abs()).collect();
            for &i in &order[..k] {
                signed[i] = -signed[i];
            }
            signed
        })
        .collect()
}

fn search(protocol: &AcquisitionProtocol, grid: &[f64], splits: &[Vec<f64>], p: usize) -> Result<Candidate> {
    // Evaluate each T1 independently (parallel).
    let candidates: Vec<Candidate> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &t1_ms)| {
            evaluate_candidate(protocol, t1_ms, splits, p).map(|(coefs, sse)| Candidate {
                idx,
                t1_ms,
                coefs,
                sse,
            })
        })
        .collect();

    // Deterministic selection: minimum SSE, ties broken by grid index.
    let mut iter = candidates.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| T1Error::fit_failed("no valid T1 candidates on the grid"))?;
    Ok(iter.fold(first, |best, c| {
        if c.sse < best.sse || (c.sse == best.sse && c.idx < best.idx) {
            c
        } else {
            best
        }
    }))
}

fn evaluate_candidate(
    protocol: &AcquisitionProtocol,
    t1_ms: f64,
    splits: &[Vec<f64>],
    p: usize,
) -> Option<(Vec<f64>, f64)> {
    let n = protocol.len();
    let mut x = DMatrix::<f64>::zeros(n, p);
    let mut row = vec![0.0; p];
    for i in 0..n {
        fill_design_row(protocol, i, t1_ms, &mut row);
        for j in 0..p {
            x[(i, j)] = row[j];
        }
    }
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut best: Option<(Vec<f64>, f64)> = None;
    for y in splits {
        let rhs = DVector::from_column_slice(y);
        let Some(beta) = solve_least_squares(&x, &rhs) else {
            continue;
        };
        let sse = (&x * &beta - &rhs).norm_squared();
        if sse.is_finite() && best.as_ref().is_none_or(|(_, b)| sse < *b) {
            best = Some((beta.iter().copied().collect(), sse));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InversionRecovery, TissueParameters};
    use crate::models::evaluate;

    fn short_tr_ir() -> AcquisitionProtocol {
        AcquisitionProtocol::Ir(
            InversionRecovery::new(2500.0, vec![50.0, 150.0, 400.0, 800.0, 1200.0, 1800.0, 2400.0]).unwrap(),
        )
    }

    fn values(protocol: &AcquisitionProtocol, t1: f64, magnitude: bool) -> Vec<f64> {
        let tissue = TissueParameters::new(t1, 1.0).unwrap();
        evaluate(protocol, &tissue, EquationVariant::Full, magnitude)
            .unwrap()
            .values
    }

    #[test]
    fn recovers_short_tr_ir_with_and_without_sign() {
        let protocol = short_tr_ir();
        for magnitude in [false, true] {
            let y = values(&protocol, 900.0, magnitude);
            let fit = fit_reduced(&protocol, &y, magnitude, &FitOptions::default()).unwrap();
            assert!(
                (fit.t1_ms - 900.0).abs() / 900.0 < 1e-3,
                "magnitude={magnitude}: T1={}",
                fit.t1_ms
            );
            assert!(matches!(fit.model, FittedModel::Exponential { .. }));
            assert_eq!(fit.method, FitKind::ReducedDimension);
        }
    }

    #[test]
    fn magnitude_splits_cover_every_prefix() {
        let protocol = short_tr_ir();
        let y = values(&protocol, 900.0, true);
        let splits = polarity_splits(&protocol, &y, true);
        assert_eq!(splits.len(), y.len() + 1);
        assert!(splits[0].iter().all(|v| *v >= 0.0));
        assert!(splits[y.len()].iter().all(|v| *v <= 0.0));
    }

    #[test]
    fn refinement_sharpens_the_estimate() {
        let protocol = short_tr_ir();
        let y = values(&protocol, 1234.0, false);
        let coarse = FitOptions {
            t1_steps: 20,
            refine_passes: 0,
            ..FitOptions::default()
        };
        let fine = FitOptions {
            t1_steps: 20,
            refine_passes: 4,
            ..FitOptions::default()
        };
        let a = fit_reduced(&protocol, &y, false, &coarse).unwrap();
        let b = fit_reduced(&protocol, &y, false, &fine).unwrap();
        assert!((b.t1_ms - 1234.0).abs() < (a.t1_ms - 1234.0).abs());
        assert_eq!(b.iterations, 5);
    }

    #[test]
    fn too_few_samples_are_rejected() {
        let protocol = AcquisitionProtocol::Ir(InversionRecovery::new(2500.0, vec![100.0, 800.0]).unwrap());
        let y = values(&protocol, 900.0, false);
        assert!(matches!(
            fit_reduced(&protocol, &y, false, &FitOptions::default()),
            Err(T1Error::FitFailed { .. })
        ));
    }
}
