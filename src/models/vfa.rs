//! Variable flip angle (spoiled gradient echo) signal equations.
//!
//! With `E1 = exp(-TR/T1)`:
//!
//! ```text
//! full:     S(α) = A · sinα · (1 − E1) / (1 − cosα·E1)
//! long-TR:  S(α) = A · sinα
//! ```
//!
//! The Ernst angle `α_E = arccos(E1)` maximizes the full signal. Two-point DESPOT1
//! protocols are most precise when both angles sit at the same fraction of the
//! Ernst signal (1/√2 by default), one on each side of `α_E`.

use std::f64::consts::FRAC_1_SQRT_2;

use crate::domain::EquationVariant;
use crate::error::{Result, T1Error};
use crate::math::{decay, deg_to_rad, recovery};

/// Default fraction of the Ernst signal for the optimal flip-angle pair.
pub const OPTIMAL_PAIR_FRACTION: f64 = FRAC_1_SQRT_2;

/// Unit-amplitude VFA signal at one flip angle.
pub fn vfa_shape(variant: EquationVariant, alpha_deg: f64, tr_ms: f64, t1_ms: f64) -> f64 {
    let alpha = deg_to_rad(alpha_deg);
    match variant {
        EquationVariant::LongTr => alpha.sin(),
        EquationVariant::Full => {
            let e1 = decay(tr_ms, t1_ms);
            alpha.sin() * recovery(tr_ms, t1_ms) / (1.0 - alpha.cos() * e1)
        }
    }
}

/// Ernst angle in degrees.
pub fn ernst_angle_deg(tr_ms: f64, t1_ms: f64) -> Result<f64> {
    check_times(tr_ms, t1_ms)?;
    Ok(decay(tr_ms, t1_ms).acos().to_degrees())
}

/// The two flip angles (low, high) whose signal is `fraction` of the Ernst signal.
///
/// Solves `S(α) = f·S(α_E)` for `cosα`:
///
/// ```text
/// cosα = [f²·E1 ± (1 − E1²)·√(1 − f²)] / [(1 − E1²) + f²·E1²]
/// ```
pub fn optimal_flip_angle_pair(tr_ms: f64, t1_ms: f64, fraction: f64) -> Result<(f64, f64)> {
    check_times(tr_ms, t1_ms)?;
    if !(fraction.is_finite() && fraction > 0.0 && fraction < 1.0) {
        return Err(T1Error::invalid("fraction", fraction, "must be within (0, 1)"));
    }

    let e1 = decay(tr_ms, t1_ms);
    let f2 = fraction * fraction;
    let u = 1.0 - e1 * e1;
    let denom = u + f2 * e1 * e1;
    let spread = u * (1.0 - f2).sqrt();

    let cos_low = ((f2 * e1 + spread) / denom).clamp(-1.0, 1.0);
    let cos_high = ((f2 * e1 - spread) / denom).clamp(-1.0, 1.0);
    Ok((cos_low.acos().to_degrees(), cos_high.acos().to_degrees()))
}

fn check_times(tr_ms: f64, t1_ms: f64) -> Result<()> {
    if !(tr_ms.is_finite() && tr_ms > 0.0) {
        return Err(T1Error::invalid("tr_ms", tr_ms, "must be finite and > 0"));
    }
    if !(t1_ms.is_finite() && t1_ms > 0.0) {
        return Err(T1Error::invalid("t1_ms", t1_ms, "must be finite and > 0"));
    }
    Ok(())
}
