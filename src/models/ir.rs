//! Inversion recovery signal equations.
//!
//! With `E(t) = exp(-t/T1)`, inversion angle `θ1` and excitation angle `θ2`:
//!
//! ```text
//! full:     S(TI) = A · [1 − cosθ1·E(TR) − (1 − cosθ1)·E(TI)] / [1 − cosθ1·cosθ2·E(TR)]
//! long-TR:  S(TI) = A · [1 − (1 − cosθ1)·E(TI)]
//! ```
//!
//! For the ideal 180°/90° pair the full form reduces to `A·(1 − 2E(TI) + E(TR))`.

use crate::domain::EquationVariant;
use crate::math::{decay, deg_to_rad};

/// Unit-amplitude IR signal at one inversion time.
pub fn ir_shape(
    variant: EquationVariant,
    ti_ms: f64,
    tr_ms: f64,
    t1_ms: f64,
    inversion_deg: f64,
    excitation_deg: f64,
) -> f64 {
    let cos1 = deg_to_rad(inversion_deg).cos();
    let e_ti = decay(ti_ms, t1_ms);

    match variant {
        EquationVariant::LongTr => 1.0 - (1.0 - cos1) * e_ti,
        EquationVariant::Full => {
            let cos2 = deg_to_rad(excitation_deg).cos();
            let e_tr = decay(tr_ms, t1_ms);
            (1.0 - cos1 * e_tr - (1.0 - cos1) * e_ti) / (1.0 - cos1 * cos2 * e_tr)
        }
    }
}

/// Inversion time at which the long-TR signal crosses zero: `TI = T1·ln(1 − cosθ1)`.
///
/// Returns `None` when the inversion is too weak to produce a null (`θ1 ≤ 90°`).
pub fn null_time_ms(t1_ms: f64, inversion_deg: f64) -> Option<f64> {
    let k = 1.0 - deg_to_rad(inversion_deg).cos();
    if k > 1.0 { Some(t1_ms * k.ln()) } else { None }
}
