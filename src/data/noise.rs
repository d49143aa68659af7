//! Measurement noise for simulated curves.
//!
//! - signed data: additive Gaussian noise
//! - magnitude data: Rician noise, `|S + n_re + i·n_im|` with independent Gaussian
//!   channels (the noiseless magnitude is treated as the real channel)

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::domain::SignalCurve;
use crate::error::{Result, T1Error};

/// Return a noisy copy of `curve`. `sigma = 0` returns an identical copy.
pub fn add_noise<R: Rng + ?Sized>(curve: &SignalCurve, sigma: f64, rng: &mut R) -> Result<SignalCurve> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(T1Error::invalid("noise_sigma", sigma, "must be finite and >= 0"));
    }
    if sigma == 0.0 {
        return Ok(curve.clone());
    }

    let normal = Normal::new(0.0, sigma).map_err(|_| T1Error::invalid("noise_sigma", sigma, "invalid distribution"))?;
    let values = curve
        .values
        .iter()
        .map(|&s| {
            if curve.magnitude {
                let re = s + normal.sample(rng);
                let im = normal.sample(rng);
                re.hypot(im)
            } else {
                s + normal.sample(rng)
            }
        })
        .collect();

    Ok(SignalCurve {
        values,
        ..curve.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SequenceKind;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn curve(magnitude: bool) -> SignalCurve {
        SignalCurve {
            kind: SequenceKind::Ir,
            x: (0..200).map(|i| i as f64).collect(),
            values: vec![-0.5; 200],
            magnitude,
        }
    }

    #[test]
    fn same_seed_gives_same_noise() {
        let c = curve(false);
        let a = add_noise(&c, 0.05, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = add_noise(&c, 0.05, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.values, c.values);
        assert_eq!(a.x, c.x);
    }

    #[test]
    fn rician_noise_is_non_negative() {
        let mut c = curve(true);
        c.values = vec![0.0; 200];
        let noisy = add_noise(&c, 0.1, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(noisy.values.iter().all(|v| *v >= 0.0));
        assert!(noisy.values.iter().any(|v| *v > 0.0));
    }

    #[test]
    fn zero_sigma_is_identity_and_negative_is_rejected() {
        let c = curve(false);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(add_noise(&c, 0.0, &mut rng).unwrap(), c);
        assert!(add_noise(&c, -1.0, &mut rng).is_err());
    }
}
