//! Voxel datasets for T1 mapping.
//!
//! File format (JSON):
//!
//! ```json
//! {
//!   "protocol": { "sequence": "vfa", "tr_ms": 15.0, "flip_deg": [3.0, 20.0] },
//!   "dims": [nx, ny, nz],
//!   "mask": [0, 1, ...],
//!   "data": [...],
//!   "magnitude": false
//! }
//! ```
//!
//! `data` is voxel-major: the samples of voxel `i` are
//! `data[i*n .. (i+1)*n]` with `n = protocol.len()`. Voxels are numbered with `x`
//! varying fastest.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::domain::AcquisitionProtocol;
use crate::error::{Result, T1Error};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub protocol: AcquisitionProtocol,
    pub dims: [usize; 3],
    /// Non-zero entries are fitted.
    pub mask: Vec<u8>,
    pub data: Vec<f64>,
    #[serde(default)]
    pub magnitude: bool,
}

impl Dataset {
    /// Load and validate a dataset file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| T1Error::DatasetIo {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset: Dataset = serde_json::from_str(&raw).map_err(|e| T1Error::DatasetMalformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        dataset.check_shape().map_err(|reason| T1Error::DatasetMalformed {
            path: path.to_path_buf(),
            reason,
        })?;
        dataset.protocol.validate()?;

        debug!(
            "loaded dataset {}: dims={:?} samples={} masked={}",
            path.display(),
            dataset.dims,
            dataset.protocol.len(),
            dataset.masked_count()
        );
        Ok(dataset)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| T1Error::DatasetMalformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(|source| T1Error::DatasetIo {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn voxel_count(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn masked_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m != 0).count()
    }

    /// Samples of voxel `i`.
    ///
    /// # Panics
    /// Panics if `i >= voxel_count()` on a dataset that passed shape checks.
    pub fn voxel(&self, i: usize) -> &[f64] {
        let n = self.protocol.len();
        &self.data[i * n..(i + 1) * n]
    }

    pub(crate) fn check_shape(&self) -> std::result::Result<(), String> {
        let voxels = self.voxel_count();
        if voxels == 0 {
            return Err(format!("dims {:?} describe an empty volume", self.dims));
        }
        if self.mask.len() != voxels {
            return Err(format!("mask has {} entries, expected {voxels}", self.mask.len()));
        }
        let expected = voxels * self.protocol.len();
        if self.data.len() != expected {
            return Err(format!(
                "data has {} values, expected {expected} ({voxels} voxels × {} samples)",
                self.data.len(),
                self.protocol.len()
            ));
        }
        Ok(())
    }
}
