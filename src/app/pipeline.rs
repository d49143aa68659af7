//! Shared pipeline logic used by the CLI commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! evaluate -> noise -> fit -> residuals
//!
//! The command handlers can then focus on presentation (printing and exports).

use std::path::Path;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::data::{Dataset, add_noise};
use crate::domain::{AcquisitionProtocol, EquationVariant, FitResult, RunConfig, SignalCurve};
use crate::error::AppError;
use crate::fit::{FitOptions, T1Map, fit_curve, fit_dataset};
use crate::io::ChartFile;
use crate::models::{evaluate, predict};
use crate::plot::PlotSeries;
use crate::report::{SampleResidual, compute_residuals};

/// All computed outputs of a single `t1map simulate` run.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// Noiseless curve for the configured equation.
    pub clean: SignalCurve,
    /// Both equation variants, for side-by-side comparison.
    pub full: SignalCurve,
    pub long_tr: SignalCurve,
    /// `clean` plus noise (identical to `clean` when noise is disabled).
    pub observed: SignalCurve,
    pub fit: Option<FitOutput>,
}

#[derive(Debug, Clone)]
pub struct FitOutput {
    pub fit: FitResult,
    pub residuals: Vec<SampleResidual>,
}

/// Evaluate, add noise, and optionally fit.
pub fn run_simulation(config: &RunConfig) -> Result<SimulationOutput, AppError> {
    let full = evaluate(&config.protocol, &config.tissue, EquationVariant::Full, config.magnitude)?;
    let long_tr = evaluate(&config.protocol, &config.tissue, EquationVariant::LongTr, config.magnitude)?;
    let clean = match config.equation {
        EquationVariant::Full => full.clone(),
        EquationVariant::LongTr => long_tr.clone(),
    };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let observed = add_noise(&clean, config.noise_sigma, &mut rng)?;
    debug!(
        "simulated {} samples ({}, noise sigma={})",
        observed.len(),
        config.equation.display_name(),
        config.noise_sigma
    );

    let fit = match &config.fit {
        Some(opts) => Some(run_fit(&config.protocol, &observed, opts)?),
        None => None,
    };

    Ok(SimulationOutput {
        clean,
        full,
        long_tr,
        observed,
        fit,
    })
}

/// Fit one curve and compute its residuals.
pub fn run_fit(protocol: &AcquisitionProtocol, curve: &SignalCurve, opts: &FitOptions) -> Result<FitOutput, AppError> {
    let fit = fit_curve(protocol, curve, opts)?;
    info!(
        "fitted T1={:.2}ms with {} (rmse={:.3e})",
        fit.t1_ms,
        fit.method.display_name(),
        fit.rmse
    );
    let residuals = compute_residuals(protocol, curve, &fit)?;
    Ok(FitOutput { fit, residuals })
}

/// Load a dataset and fit every masked voxel.
pub fn run_map(path: &Path, opts: &FitOptions) -> Result<T1Map, AppError> {
    let dataset = Dataset::load(path)?;
    Ok(fit_dataset(&dataset, opts)?)
}

/// Renderer traces for a simulation: both equation variants, observations, fit.
pub fn simulation_chart(protocol: &AcquisitionProtocol, out: &SimulationOutput) -> ChartFile {
    let kind = protocol.kind();
    let mut chart = ChartFile::new(kind.display_name(), kind.abscissa_label(), "signal");
    chart.push_trace(EquationVariant::Full.display_name(), &out.full.x, &out.full.values);
    chart.push_trace(EquationVariant::LongTr.display_name(), &out.long_tr.x, &out.long_tr.values);
    if out.observed != out.clean {
        chart.push_trace("observed", &out.observed.x, &out.observed.values);
    }
    if let Some(fit) = &out.fit {
        let fitted: Vec<f64> = fit.residuals.iter().map(|r| r.fitted).collect();
        chart.push_trace("fit", &out.observed.x, &fitted);
    }
    chart
}

/// Plot series for a simulation, matching `simulation_chart`.
pub fn simulation_series(out: &SimulationOutput) -> Vec<PlotSeries> {
    let mut series = vec![
        PlotSeries::line(EquationVariant::Full.display_name(), '-', &out.full.x, &out.full.values),
        PlotSeries::line(EquationVariant::LongTr.display_name(), '.', &out.long_tr.x, &out.long_tr.values),
    ];
    if let Some(fit) = &out.fit {
        let fitted: Vec<f64> = fit.residuals.iter().map(|r| r.fitted).collect();
        series.push(PlotSeries::line("fit", '~', &out.observed.x, &fitted));
    }
    series.push(PlotSeries::points("observed", 'o', &out.observed.x, &out.observed.values));
    series
}

/// Plot series for a standalone fit.
pub fn fit_series(protocol: &AcquisitionProtocol, curve: &SignalCurve, fit: &FitResult) -> Vec<PlotSeries> {
    let mut fitted = predict(protocol, fit);
    if curve.magnitude {
        fitted.iter_mut().for_each(|v| *v = v.abs());
    }
    vec![
        PlotSeries::line("fit", '-', &curve.x, &fitted),
        PlotSeries::points("observed", 'o', &curve.x, &curve.values),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitKind, TissueParameters, VariableFlipAngle};
    use crate::models::{OPTIMAL_PAIR_FRACTION, optimal_flip_angle_pair};

    fn config(noise_sigma: f64, fit: bool) -> RunConfig {
        let (low, high) = optimal_flip_angle_pair(25.0, 900.0, OPTIMAL_PAIR_FRACTION).unwrap();
        RunConfig {
            protocol: AcquisitionProtocol::Vfa(VariableFlipAngle::new(25.0, vec![low, high]).unwrap()),
            tissue: TissueParameters::new(900.0, 1.0).unwrap(),
            equation: EquationVariant::Full,
            magnitude: false,
            noise_sigma,
            seed: 42,
            fit: fit.then(FitOptions::default),
            plot: false,
            plot_width: 72,
            plot_height: 20,
            export_curve: None,
            export_chart: None,
        }
    }

    #[test]
    fn noiseless_simulation_fits_back_to_truth() {
        let out = run_simulation(&config(0.0, true)).unwrap();
        assert_eq!(out.observed, out.clean);
        let fit = out.fit.unwrap();
        assert_eq!(fit.fit.method, FitKind::Linear);
        assert!((fit.fit.t1_ms - 900.0).abs() < 1e-6);
        assert!(fit.residuals.iter().all(|r| r.residual.abs() < 1e-10));
    }

    #[test]
    fn chart_carries_both_variants_and_observations() {
        let cfg = config(0.001, false);
        let out = run_simulation(&cfg).unwrap();
        let chart = simulation_chart(&cfg.protocol, &out);
        let labels: Vec<&str> = chart.traces.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, ["full", "long-TR", "observed"]);
        assert_eq!(chart.x_label, "flip angle (deg)");
    }

    #[test]
    fn seeded_simulation_is_reproducible() {
        let a = run_simulation(&config(0.01, false)).unwrap();
        let b = run_simulation(&config(0.01, false)).unwrap();
        assert_eq!(a.observed, b.observed);
    }

    #[test]
    fn missing_dataset_maps_to_data_exit_code() {
        let err = run_map(Path::new("/nonexistent/dataset.json"), &FitOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
