//! Exports for downstream consumers.
//!
//! - chart JSON: labeled x/y traces, the whole contract a renderer needs
//! - residual CSV: one row per sample, easy to load in spreadsheets or scripts

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::report::SampleResidual;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartFile {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub generated_at: DateTime<Utc>,
    pub traces: Vec<Trace>,
}

impl ChartFile {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            generated_at: Utc::now(),
            traces: Vec::new(),
        }
    }

    pub fn push_trace(&mut self, label: impl Into<String>, x: &[f64], y: &[f64]) {
        self.traces.push(Trace {
            label: label.into(),
            x: x.to_vec(),
            y: y.to_vec(),
        });
    }
}

/// Write a chart JSON file.
pub fn write_chart_json(path: &Path, chart: &ChartFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create chart JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, chart)
        .map_err(|e| AppError::new(2, format!("Failed to write chart JSON: {e}")))?;
    Ok(())
}

/// Write per-sample residuals to a CSV file.
pub fn write_residuals_csv(path: &Path, x_label: &str, residuals: &[SampleResidual]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create residual CSV '{}': {e}", path.display())))?;

    writeln!(file, "{x_label},observed,fitted,residual")
        .map_err(|e| AppError::new(2, format!("Failed to write residual CSV header: {e}")))?;
    for r in residuals {
        writeln!(file, "{},{:.10},{:.10},{:.10}", r.x, r.observed, r.fitted, r.residual)
            .map_err(|e| AppError::new(2, format!("Failed to write residual CSV row: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_json_lists_traces_in_order() {
        let mut chart = ChartFile::new("IR", "TI (ms)", "signal");
        chart.push_trace("full", &[0.0, 1.0], &[-1.0, 0.5]);
        chart.push_trace("long-TR", &[0.0, 1.0], &[-1.0, 0.6]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.json");
        write_chart_json(&path, &chart).unwrap();

        let back: ChartFile = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, chart);
        assert_eq!(back.traces[1].label, "long-TR");
    }

    #[test]
    fn residual_csv_has_header_and_rows() {
        let rows = vec![SampleResidual {
            x: 100.0,
            observed: 0.5,
            fitted: 0.25,
            residual: 0.25,
        }];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("res.csv");
        write_residuals_csv(&path, "ti_ms", &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ti_ms,observed,fitted,residual");
        assert_eq!(lines[1], "100,0.5000000000,0.2500000000,0.2500000000");
    }
}
