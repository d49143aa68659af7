//! T1 grid generation for the reduced-dimension search.
//!
//! Why grid search?
//! - It avoids local minima (and the sign ambiguity of magnitude IR data).
//! - It is deterministic given the same inputs/flags.
//! - With one nonlinear parameter, a log-spaced grid plus a few refinement passes
//!   reaches sub-millisecond resolution cheaply.

use crate::error::{Result, T1Error};

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && min > 0.0) {
        return Err(T1Error::invalid("t1_min_ms", min, "must be finite and > 0"));
    }
    if !(max.is_finite() && max > min) {
        return Err(T1Error::invalid("t1_max_ms", max, "must be finite and > t1_min_ms"));
    }
    if steps < 2 {
        return Err(T1Error::invalid("t1_steps", steps as f64, "must be >= 2"));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    // Pin the endpoints exactly (exp(ln(x)) may drift by an ulp).
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}

/// Bounds of the next refinement pass around `grid[idx]`: its two neighbours.
pub fn refine_bounds(grid: &[f64], idx: usize) -> (f64, f64) {
    let lo = if idx > 0 { grid[idx - 1] } else { grid[idx] };
    let hi = if idx + 1 < grid.len() { grid[idx + 1] } else { grid[idx] };
    (lo, hi)
}
