//! Closed-form fits after linearizing the signal equation.
//!
//! VFA (DESPOT1): the full spoiled-gradient-echo equation rearranges to
//!
//! ```text
//! S/sinα = E1 · S/tanα + A·(1 − E1)
//! ```
//!
//! so a straight line through `(S/tanα, S/sinα)` has slope `E1 = exp(-TR/T1)`.
//!
//! IR: the long-TR approximation rearranges to
//!
//! ```text
//! ln(1 − S/A) = ln(1 − cosθ1) − TI/T1
//! ```
//!
//! which is linear in TI for a given plateau `A`. `A` is searched above the largest
//! sample for the lowest signal-domain residual, so protocols whose last TI stops
//! short of the plateau are not biased. The approximation only holds when
//! `TR ≥ LONG_TR_FACTOR·T1`; otherwise the fit is reported as invalid.

use std::cmp::Ordering;

use log::debug;

use crate::domain::{AcquisitionProtocol, EquationVariant, FitKind, FitResult, FittedModel};
use crate::error::{Result, T1Error};
use crate::fit::fitter::finish;
use crate::fit::t1_grid::{log_space, refine_bounds};
use crate::math::{deg_to_rad, fit_line};

/// Minimum `TR / T1` for the long-TR approximation to hold.
pub const LONG_TR_FACTOR: f64 = 5.0;

/// Relative deviation of the fitted `K` from `1 − cosθ1` beyond which the IR fit is rejected.
const INVERSION_TOLERANCE: f64 = 0.5;

/// Plateau search range, as a multiple of the largest sample.
const AMPLITUDE_SEARCH_MAX: f64 = 8.0;
const AMPLITUDE_SCAN_STEPS: usize = 48;
const GOLDEN_MAX_STEPS: usize = 200;

/// Linearized fit for either sequence family.
pub fn fit_linear(protocol: &AcquisitionProtocol, values: &[f64], magnitude: bool) -> Result<FitResult> {
    match protocol {
        AcquisitionProtocol::Vfa(p) => {
            let (t1_ms, amplitude) = despot1(p.tr_ms(), p.flip_deg(), values)?;
            finish(
                protocol,
                values,
                magnitude,
                t1_ms,
                FittedModel::Scaled {
                    amplitude,
                    equation: EquationVariant::Full,
                },
                FitKind::Linear,
                0,
            )
        }
        AcquisitionProtocol::Ir(p) => {
            let inversion = 1.0 - deg_to_rad(p.inversion_deg()).cos();
            let est = ir_log_linear(p.ti_ms(), values, magnitude)?;
            if (est.k - inversion).abs() > INVERSION_TOLERANCE * inversion {
                return Err(T1Error::fit_failed(format!(
                    "fitted inversion factor {:.3} is inconsistent with a {}° inversion ({inversion:.3})",
                    est.k,
                    p.inversion_deg()
                )));
            }

            let tr_ms = p.tr_ms();
            if tr_ms < LONG_TR_FACTOR * est.t1_ms {
                return Err(T1Error::ApproximationInvalid {
                    tr_ms,
                    t1_ms: est.t1_ms,
                    factor: LONG_TR_FACTOR,
                });
            }

            finish(
                protocol,
                values,
                magnitude,
                est.t1_ms,
                FittedModel::Scaled {
                    amplitude: est.amplitude,
                    equation: EquationVariant::LongTr,
                },
                FitKind::Linear,
                0,
            )
        }
    }
}

fn despot1(tr_ms: f64, flip_deg: &[f64], values: &[f64]) -> Result<(f64, f64)> {
    let mut x = Vec::with_capacity(values.len());
    let mut y = Vec::with_capacity(values.len());
    for (&alpha, &s) in flip_deg.iter().zip(values) {
        let a = deg_to_rad(alpha);
        let (sin, cos) = a.sin_cos();
        // α = 0° / 180° carry no information (and divide by zero).
        if sin.abs() < 1e-9 {
            continue;
        }
        y.push(s / sin);
        x.push(s * cos / sin);
    }
    if x.len() < 2 {
        return Err(T1Error::fit_failed("DESPOT1 needs at least two flip angles in (0°, 180°)"));
    }

    let line = fit_line(&x, &y, None)
        .ok_or_else(|| T1Error::fit_failed("DESPOT1 regression is degenerate"))?;
    let e1 = line.slope;
    if !(e1 > 0.0 && e1 < 1.0) {
        return Err(T1Error::fit_failed(format!(
            "DESPOT1 slope {e1:.6} is outside (0, 1)"
        )));
    }

    let t1_ms = -tr_ms / e1.ln();
    let amplitude = line.intercept / (1.0 - e1);
    debug!("DESPOT1: E1={e1:.6} T1={t1_ms:.3}ms A={amplitude:.6}");
    Ok((t1_ms, amplitude))
}

#[derive(Debug, Clone, Copy)]
struct IrEstimate {
    t1_ms: f64,
    amplitude: f64,
    /// Fitted `K` in `A·(1 − K·E(TI))`.
    k: f64,
    /// Squared residual of `A·(1 − K·E(TI))` against the signed samples.
    sse: f64,
}

fn ir_log_linear(ti_ms: &[f64], values: &[f64], magnitude: bool) -> Result<IrEstimate> {
    if !magnitude {
        return ir_regression(ti_ms, values);
    }

    // Polarity restoration: every sample earlier than the null is negative.
    let mut order: Vec<usize> = (0..ti_ms.len()).collect();
    order.sort_by(|&a, &b| ti_ms[a].partial_cmp(&ti_ms[b]).unwrap_or(Ordering::Equal));

    let null_pos = order
        .iter()
        .enumerate()
        .min_by(|&(_, &a), &(_, &b)| {
            values[a]
                .abs()
                .partial_cmp(&values[b].abs())
                .unwrap_or(Ordering::Equal)
        })
        .map(|(pos, _)| pos)
        .unwrap_or(0);

    // The null sample itself may sit on either side of the crossing.
    let mut best: Option<IrEstimate> = None;
    for flip_null in [true, false] {
        let mut signed: Vec<f64> = values.iter().map(|v| v.abs()).collect();
        let cut = if flip_null { null_pos + 1 } else { null_pos };
        for &i in &order[..cut] {
            signed[i] = -signed[i];
        }
        match ir_regression(ti_ms, &signed) {
            Ok(est) if best.is_none_or(|b| est.sse < b.sse) => best = Some(est),
            Ok(_) => {}
            Err(err) => debug!("polarity split at {cut} rejected: {err}"),
        }
    }

    best.ok_or_else(|| T1Error::fit_failed("IR regression failed for every polarity split"))
}

/// Log-linear IR fit with the plateau `A` searched alongside T1.
///
/// `A` must exceed every sample. It is scanned on a log grid above the largest
/// sample and then polished by golden-section search on the signal-domain SSE.
fn ir_regression(ti_ms: &[f64], signed: &[f64]) -> Result<IrEstimate> {
    let peak = signed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(peak.is_finite() && peak > 0.0) {
        return Err(T1Error::fit_failed("IR signal never recovers above zero"));
    }

    let grid = log_space(peak, AMPLITUDE_SEARCH_MAX * peak, AMPLITUDE_SCAN_STEPS)?;
    let (idx, coarse) = grid
        .iter()
        .enumerate()
        .filter_map(|(i, &a)| ir_regression_at(ti_ms, signed, a).ok().map(|est| (i, est)))
        .min_by(|(_, a), (_, b)| a.sse.partial_cmp(&b.sse).unwrap_or(Ordering::Equal))
        .ok_or_else(|| T1Error::fit_failed("IR regression is degenerate for every plateau amplitude"))?;

    let (lo, hi) = refine_bounds(&grid, idx);
    let polished = golden_section_min(
        |a| ir_regression_at(ti_ms, signed, a).map_or(f64::INFINITY, |est| est.sse),
        lo,
        hi,
    );
    let est = match ir_regression_at(ti_ms, signed, polished) {
        Ok(est) if est.sse <= coarse.sse => est,
        _ => coarse,
    };
    debug!(
        "IR log-linear: T1={:.3}ms A={:.6} K={:.4} sse={:.3e}",
        est.t1_ms, est.amplitude, est.k, est.sse
    );
    Ok(est)
}

/// Weighted regression of `ln(1 − S/A)` on TI for a fixed plateau `A`.
fn ir_regression_at(ti_ms: &[f64], signed: &[f64], amplitude: f64) -> Result<IrEstimate> {
    // z = 1 − S/A ∝ E(TI); its log is linear in TI. Var(ln z) ∝ 1/z², hence w = z².
    let mut x = Vec::with_capacity(signed.len());
    let mut y = Vec::with_capacity(signed.len());
    let mut w = Vec::with_capacity(signed.len());
    for (&ti, &s) in ti_ms.iter().zip(signed) {
        let z = 1.0 - s / amplitude;
        if z > 1e-12 {
            x.push(ti);
            y.push(z.ln());
            w.push(z * z);
        }
    }
    if x.len() < 2 {
        return Err(T1Error::fit_failed("IR regression needs at least two samples below the plateau"));
    }

    let line = fit_line(&x, &y, Some(&w))
        .ok_or_else(|| T1Error::fit_failed("IR regression is degenerate"))?;
    if !(line.slope < 0.0) {
        return Err(T1Error::fit_failed(format!(
            "IR regression slope {:.3e} does not describe recovery",
            line.slope
        )));
    }

    let t1_ms = -1.0 / line.slope;
    let k = line.intercept.exp();
    let sse = ti_ms
        .iter()
        .zip(signed)
        .map(|(&ti, &s)| {
            let r = s - amplitude * (1.0 - k * (-ti / t1_ms).exp());
            r * r
        })
        .sum();

    Ok(IrEstimate {
        t1_ms,
        amplitude,
        k,
        sse,
    })
}

/// Minimizer of `f` on `[lo, hi]`, assuming a single minimum in the bracket.
fn golden_section_min<F: Fn(f64) -> f64>(f: F, mut lo: f64, mut hi: f64) -> f64 {
    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let mut c = hi - inv_phi * (hi - lo);
    let mut d = lo + inv_phi * (hi - lo);
    let (mut fc, mut fd) = (f(c), f(d));
    for _ in 0..GOLDEN_MAX_STEPS {
        if hi - lo <= 1e-12 * hi.abs() {
            break;
        }
        if fc <= fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - inv_phi * (hi - lo);
            fc = f(c);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + inv_phi * (hi - lo);
            fd = f(d);
        }
    }
    if fc <= fd { c } else { d }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DEFAULT_TI_MS;
    use crate::data::add_noise;
    use crate::domain::{InversionRecovery, TissueParameters, VariableFlipAngle};
    use crate::models::evaluate;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn long_tr_ir() -> AcquisitionProtocol {
        AcquisitionProtocol::Ir(
            InversionRecovery::new(10_000.0, vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 9000.0])
                .unwrap(),
        )
    }

    fn curve(protocol: &AcquisitionProtocol, t1: f64, m0: f64, magnitude: bool) -> Vec<f64> {
        let tissue = TissueParameters::new(t1, m0).unwrap();
        evaluate(protocol, &tissue, EquationVariant::Full, magnitude)
            .unwrap()
            .values
    }

    #[test]
    fn despot1_is_exact_on_noiseless_data() {
        let protocol = AcquisitionProtocol::Vfa(VariableFlipAngle::new(15.0, vec![3.0, 8.0, 15.0, 25.0]).unwrap());
        let values = curve(&protocol, 1200.0, 2.5, false);
        let fit = fit_linear(&protocol, &values, false).unwrap();
        assert_relative_eq!(fit.t1_ms, 1200.0, max_relative = 1e-8);
        match fit.model {
            FittedModel::Scaled { amplitude, .. } => assert_relative_eq!(amplitude, 2.5, max_relative = 1e-8),
            other => panic!("unexpected model {other:?}"),
        }
        assert!(fit.rmse < 1e-10);
    }

    #[test]
    fn despot1_skips_zero_flip_angle() {
        let protocol = AcquisitionProtocol::Vfa(VariableFlipAngle::new(15.0, vec![0.0, 3.0, 20.0]).unwrap());
        let values = curve(&protocol, 800.0, 1.0, false);
        let fit = fit_linear(&protocol, &values, false).unwrap();
        assert_relative_eq!(fit.t1_ms, 800.0, max_relative = 1e-8);
    }

    #[test]
    fn despot1_needs_two_angles() {
        let protocol = AcquisitionProtocol::Vfa(VariableFlipAngle::new(15.0, vec![10.0]).unwrap());
        let values = curve(&protocol, 800.0, 1.0, false);
        assert!(matches!(
            fit_linear(&protocol, &values, false),
            Err(T1Error::FitFailed { .. })
        ));
    }

    #[test]
    fn ir_recovers_t1_from_signed_and_magnitude_data() {
        let protocol = long_tr_ir();
        for magnitude in [false, true] {
            let values = curve(&protocol, 900.0, 1.0, magnitude);
            let fit = fit_linear(&protocol, &values, magnitude).unwrap();
            assert!(
                (fit.t1_ms - 900.0).abs() / 900.0 < 0.01,
                "magnitude={magnitude}: T1={}",
                fit.t1_ms
            );
        }
    }

    #[test]
    fn ir_polarity_restoration_ignores_sample_order() {
        let protocol = AcquisitionProtocol::Ir(
            InversionRecovery::new(10_000.0, vec![4000.0, 50.0, 1000.0, 250.0, 9000.0, 500.0, 100.0, 2000.0])
                .unwrap(),
        );
        let values = curve(&protocol, 900.0, 1.0, true);
        let fit = fit_linear(&protocol, &values, true).unwrap();
        assert!((fit.t1_ms - 900.0).abs() / 900.0 < 0.01, "T1={}", fit.t1_ms);
    }

    #[test]
    fn ir_plateau_is_found_when_ti_stops_short_of_recovery() {
        // Last TI ≈ 2.7·T1: the largest sample sits well below the plateau.
        let protocol = AcquisitionProtocol::Ir(InversionRecovery::new(10_000.0, DEFAULT_TI_MS.to_vec()).unwrap());
        for magnitude in [false, true] {
            let values = curve(&protocol, 900.0, 1.0, magnitude);
            let fit = fit_linear(&protocol, &values, magnitude).unwrap();
            assert_relative_eq!(fit.t1_ms, 900.0, max_relative = 1e-4);
            match fit.model {
                FittedModel::Scaled { amplitude, .. } => assert_relative_eq!(amplitude, 1.0, max_relative = 1e-3),
                other => panic!("unexpected model {other:?}"),
            }
        }
    }

    #[test]
    fn ir_linear_fit_is_unbiased_under_noise() {
        let protocol = AcquisitionProtocol::Ir(InversionRecovery::new(10_000.0, DEFAULT_TI_MS.to_vec()).unwrap());
        let tissue = TissueParameters::new(900.0, 1.0).unwrap();
        for magnitude in [false, true] {
            let clean = evaluate(&protocol, &tissue, EquationVariant::Full, magnitude).unwrap();
            let mut t1 = Vec::new();
            for seed in 0..200 {
                let mut rng = StdRng::seed_from_u64(seed);
                let noisy = add_noise(&clean, 0.01, &mut rng).unwrap();
                let fit = fit_linear(&protocol, &noisy.values, magnitude)
                    .unwrap_or_else(|err| panic!("magnitude={magnitude} seed={seed}: {err}"));
                assert!((fit.t1_ms - 900.0).abs() / 900.0 < 0.15, "seed={seed}: T1={}", fit.t1_ms);
                t1.push(fit.t1_ms);
            }
            let mean = t1.iter().sum::<f64>() / t1.len() as f64;
            assert!((mean - 900.0).abs() / 900.0 < 0.02, "magnitude={magnitude}: mean T1={mean}");
        }
    }

    #[test]
    fn ir_validity_uses_the_unbiased_estimate() {
        // TR = 4400 < 5·900: rejected even though the TI list stops short of the plateau.
        let protocol = AcquisitionProtocol::Ir(
            InversionRecovery::new(4400.0, vec![50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 2400.0, 2900.0]).unwrap(),
        );
        let values = curve(&protocol, 900.0, 1.0, false);
        assert!(matches!(
            fit_linear(&protocol, &values, false),
            Err(T1Error::ApproximationInvalid { .. })
        ));
    }

    #[test]
    fn ir_fit_rejects_inconsistent_inversion_factor() {
        // A 60° inversion gives K = 0.5; data acquired with a 180° pulse fit K ≈ 2.
        let acquired = AcquisitionProtocol::Ir(InversionRecovery::new(10_000.0, DEFAULT_TI_MS.to_vec()).unwrap());
        let values = curve(&acquired, 900.0, 1.0, false);
        let claimed = AcquisitionProtocol::Ir(
            InversionRecovery::with_angles(10_000.0, DEFAULT_TI_MS.to_vec(), 60.0, 90.0).unwrap(),
        );
        assert!(matches!(
            fit_linear(&claimed, &values, false),
            Err(T1Error::FitFailed { .. })
        ));
    }

    #[test]
    fn golden_section_finds_parabola_vertex() {
        let x = golden_section_min(|v| (v - 1.3) * (v - 1.3), 1.0, 2.0);
        assert_relative_eq!(x, 1.3, max_relative = 1e-6);
    }

    #[test]
    fn short_tr_ir_reports_invalid_approximation() {
        let protocol = AcquisitionProtocol::Ir(
            InversionRecovery::new(2500.0, vec![50.0, 150.0, 400.0, 800.0, 1200.0, 1800.0, 2400.0]).unwrap(),
        );
        let values = curve(&protocol, 900.0, 1.0, true);
        match fit_linear(&protocol, &values, true) {
            Err(T1Error::ApproximationInvalid { tr_ms, factor, .. }) => {
                assert_eq!(tr_ms, 2500.0);
                assert_eq!(factor, LONG_TR_FACTOR);
            }
            other => panic!("expected ApproximationInvalid, got {other:?}"),
        }
    }
}
