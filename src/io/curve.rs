//! Read/write curve JSON files.
//!
//! Curve JSON is the portable representation of one evaluated (or observed) curve:
//! - the acquisition protocol it was sampled on
//! - the tissue parameters and equation variant, when it was simulated
//! - the sample values
//! - the fit, when one was run
//!
//! `t1map fit --curve <file>` reads the protocol and values back from this file.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AcquisitionProtocol, EquationVariant, FitResult, SignalCurve, TissueParameters};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub protocol: AcquisitionProtocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tissue: Option<TissueParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equation: Option<EquationVariant>,
    pub curve: SignalCurve,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitResult>,
}

impl CurveFile {
    pub fn new(protocol: AcquisitionProtocol, curve: SignalCurve) -> Self {
        Self {
            tool: "t1map".to_string(),
            generated_at: Utc::now(),
            protocol,
            tissue: None,
            equation: None,
            curve,
            fit: None,
        }
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &CurveFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, curve)
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    Ok(curve)
}
