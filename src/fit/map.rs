//! Voxel-wise T1 maps.
//!
//! Every masked voxel is an independent curve fit (run in parallel). A voxel
//! whose fit fails is recorded as missing rather than aborting the map.

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::domain::SignalCurve;
use crate::error::{Result, T1Error};
use crate::fit::{FitOptions, fit_curve};

/// A fitted T1 map. `t1_ms[i]` is `None` for unmasked or failed voxels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct T1Map {
    pub dims: [usize; 3],
    pub t1_ms: Vec<Option<f64>>,
    pub fitted: usize,
    pub failed: usize,
}

impl T1Map {
    /// Mean and standard deviation of the fitted values.
    pub fn stats(&self) -> Option<(f64, f64)> {
        let values: Vec<f64> = self.t1_ms.iter().flatten().copied().collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Some((mean, var.sqrt()))
    }
}

/// Fit every masked voxel of `dataset`.
pub fn fit_dataset(dataset: &Dataset, opts: &FitOptions) -> Result<T1Map> {
    dataset.protocol.validate()?;
    dataset
        .check_shape()
        .map_err(|reason| T1Error::DatasetShape { reason })?;
    let voxels = dataset.voxel_count();

    let kind = dataset.protocol.kind();
    let x = dataset.protocol.abscissa().to_vec();

    let results: Vec<Option<std::result::Result<f64, T1Error>>> = (0..voxels)
        .into_par_iter()
        .map(|i| {
            if dataset.mask[i] == 0 {
                return None;
            }
            let curve = SignalCurve {
                kind,
                x: x.clone(),
                values: dataset.voxel(i).to_vec(),
                magnitude: dataset.magnitude,
            };
            Some(fit_curve(&dataset.protocol, &curve, opts).map(|fit| fit.t1_ms))
        })
        .collect();

    let mut fitted = 0;
    let mut failed = 0;
    let t1_ms = results
        .into_iter()
        .enumerate()
        .map(|(i, r)| match r {
            None => None,
            Some(Ok(t1)) => {
                fitted += 1;
                Some(t1)
            }
            Some(Err(err)) => {
                debug!("voxel {i}: {err}");
                failed += 1;
                None
            }
        })
        .collect();

    info!("T1 map: {fitted} voxels fitted, {failed} failed");
    Ok(T1Map {
        dims: dataset.dims,
        t1_ms,
        fitted,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PhantomSpec, generate_phantom};
    use crate::domain::{AcquisitionProtocol, InversionRecovery, VariableFlipAngle};

    fn phantom_spec() -> PhantomSpec {
        PhantomSpec {
            protocol: AcquisitionProtocol::Vfa(VariableFlipAngle::new(15.0, vec![3.0, 8.0, 20.0]).unwrap()),
            nx: 8,
            ny: 5,
            t1_ms: vec![500.0, 1000.0, 1500.0, 2000.0],
            m0: 1.0,
            noise_sigma: 0.0,
            magnitude: false,
            seed: 42,
        }
    }

    #[test]
    fn noiseless_phantom_maps_to_truth() {
        let phantom = generate_phantom(&phantom_spec()).unwrap();
        let map = fit_dataset(&phantom.dataset, &FitOptions::default()).unwrap();

        assert_eq!(map.dims, [8, 5, 1]);
        assert_eq!(map.failed, 0);
        assert_eq!(map.fitted, phantom.dataset.masked_count());
        for (got, want) in map.t1_ms.iter().zip(&phantom.truth) {
            match (got, want) {
                (Some(g), Some(w)) => assert!((g - w).abs() / w < 1e-6, "{g} vs {w}"),
                (None, None) => {}
                other => panic!("mask mismatch: {other:?}"),
            }
        }
    }

    #[test]
    fn failed_voxels_are_counted_not_fatal() {
        let mut phantom = generate_phantom(&phantom_spec()).unwrap();
        // Voxel (1, 1): flat signal gives a degenerate DESPOT1 slope.
        let n = phantom.dataset.protocol.len();
        let i = 8 + 1;
        for v in &mut phantom.dataset.data[i * n..(i + 1) * n] {
            *v = 0.0;
        }
        let map = fit_dataset(&phantom.dataset, &FitOptions::default()).unwrap();
        assert_eq!(map.failed, 1);
        assert_eq!(map.t1_ms[i], None);
        assert_eq!(map.fitted + map.failed, phantom.dataset.masked_count());
    }

    #[test]
    fn short_mask_is_reported_by_its_own_length() {
        let mut phantom = generate_phantom(&phantom_spec()).unwrap();
        phantom.dataset.mask.truncate(3);
        let err = fit_dataset(&phantom.dataset, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, T1Error::DatasetShape { .. }), "{err}");
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("mask has 3 entries, expected 40"), "{err}");
    }

    #[test]
    fn noisy_magnitude_ir_phantom_has_no_failed_voxels() {
        let spec = PhantomSpec {
            protocol: AcquisitionProtocol::Ir(
                InversionRecovery::new(2500.0, vec![50.0, 150.0, 400.0, 800.0, 1200.0, 1800.0, 2400.0]).unwrap(),
            ),
            nx: 16,
            ny: 16,
            t1_ms: vec![450.0, 700.0, 900.0, 1200.0],
            m0: 1.0,
            noise_sigma: 0.005,
            magnitude: true,
            seed: 7,
        };
        let phantom = generate_phantom(&spec).unwrap();
        let map = fit_dataset(&phantom.dataset, &FitOptions::default()).unwrap();
        assert_eq!(map.failed, 0);
        assert_eq!(map.fitted, phantom.dataset.masked_count());
        for (got, want) in map.t1_ms.iter().zip(&phantom.truth) {
            if let (Some(g), Some(w)) = (got, want) {
                assert!((g - w).abs() / w < 0.1, "{g} vs {w}");
            }
        }
    }

    #[test]
    fn stats_skip_missing_voxels() {
        let map = T1Map {
            dims: [3, 1, 1],
            t1_ms: vec![Some(100.0), None, Some(300.0)],
            fitted: 2,
            failed: 0,
        };
        let (mean, sd) = map.stats().unwrap();
        assert_eq!(mean, 200.0);
        assert_eq!(sd, 100.0);
    }
}
