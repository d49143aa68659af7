//! Stable relaxation factors.
//!
//! Every signal equation is built from the longitudinal recovery term
//!
//! - `E(t) = exp(-t/T1)`
//! - `1 - E(t)`
//!
//! Numerical notes:
//! - For `t ≪ T1` (e.g. VFA with TR = 25ms and T1 ≈ 1s), `1 - exp(-x)` suffers from
//!   catastrophic cancellation. We use `expm1` to keep full precision.

/// `exp(-t/T1)`.
pub fn decay(t: f64, t1: f64) -> f64 {
    (-t / t1).exp()
}

/// `1 - exp(-t/T1)` computed as `-expm1(-t/T1)`.
pub fn recovery(t: f64, t1: f64) -> f64 {
    -(-t / t1).exp_m1()
}

pub fn deg_to_rad(deg: f64) -> f64 {
    deg.to_radians()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovery_is_accurate_for_tiny_ratios() {
        let t1 = 1.0e9;
        let t = 1.0;
        // Series: 1 - e^{-x} ≈ x - x²/2
        let x = t / t1;
        assert_relative_eq!(recovery(t, t1), x - x * x / 2.0, max_relative = 1e-12);
    }

    #[test]
    fn decay_and_recovery_sum_to_one() {
        for &t1 in &[50.0, 900.0, 4000.0] {
            for &t in &[0.0, 1.0, 25.0, 900.0, 10_000.0] {
                assert_relative_eq!(decay(t, t1) + recovery(t, t1), 1.0, epsilon = 1e-15);
            }
        }
    }
}
