//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{AcquisitionProtocol, FitResult, FittedModel, RunConfig, SignalCurve};
use crate::fit::T1Map;
use crate::report::SampleResidual;
use crate::sweep::SweepPoint;

/// Format the run header (protocol, tissue, evaluation settings).
pub fn format_run_summary(config: &RunConfig) -> String {
    let mut out = String::new();

    out.push_str("=== t1map - T1 Mapping ===\n");
    out.push_str(&format_protocol(&config.protocol));
    out.push_str(&format!(
        "Tissue: T1={:.1}ms | M0={} | C={}\n",
        config.tissue.t1_ms, config.tissue.m0, config.tissue.constant
    ));
    out.push_str(&format!(
        "Equation: {} | {}\n",
        config.equation.display_name(),
        if config.magnitude { "magnitude" } else { "signed" }
    ));
    if config.noise_sigma > 0.0 {
        out.push_str(&format!("Noise: sigma={} (seed {})\n", config.noise_sigma, config.seed));
    }
    out.push('\n');

    out
}

/// One-line protocol description.
pub fn format_protocol(protocol: &AcquisitionProtocol) -> String {
    match protocol {
        AcquisitionProtocol::Ir(p) => format!(
            "Sequence: {} | TR={}ms | TI={} ms | inversion={}° excitation={}°\n",
            protocol.kind().display_name(),
            p.tr_ms(),
            fmt_vec(p.ti_ms(), 1),
            p.inversion_deg(),
            p.excitation_deg()
        ),
        AcquisitionProtocol::Vfa(p) => format!(
            "Sequence: {} | TR={}ms | flip={} deg\n",
            protocol.kind().display_name(),
            p.tr_ms(),
            fmt_vec(p.flip_deg(), 2)
        ),
    }
}

/// Format the fit diagnostics.
pub fn format_fit_summary(fit: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("Fit:\n");
    out.push_str(&format!("- method: {}\n", fit.method.display_name()));
    out.push_str(&format!("- T1    : {:.2} ms\n", fit.t1_ms));
    match fit.model {
        FittedModel::Scaled { amplitude, equation } => {
            out.push_str(&format!("- model : A={amplitude:.6} ({})\n", equation.display_name()));
        }
        FittedModel::Exponential { a, b } => {
            out.push_str(&format!("- model : a={a:.6} b={b:.6} (a + b·exp(-TI/T1))\n"));
        }
    }
    out.push_str(&format!(
        "- SSE={:.3e} RMSE={:.3e} n={} iterations={}\n",
        fit.sse, fit.rmse, fit.n, fit.iterations
    ));
    out.push('\n');

    out
}

/// Sample table. Fitted/residual columns appear when residuals are given.
pub fn format_curve_table(curve: &SignalCurve, residuals: Option<&[SampleResidual]>) -> String {
    let mut out = String::new();
    let x_label = curve.kind.abscissa_label();

    match residuals {
        Some(rows) => {
            out.push_str(&format!("{:>12} {:>12} {:>12} {:>12}\n", x_label, "observed", "fitted", "residual"));
            out.push_str(&format!("{:->12} {:->12} {:->12} {:->12}\n", "", "", "", ""));
            for r in rows {
                out.push_str(&format!(
                    "{:>12.2} {:>12.6} {:>12.6} {:>12.6}\n",
                    r.x, r.observed, r.fitted, r.residual
                ));
            }
        }
        None => {
            out.push_str(&format!("{:>12} {:>12}\n", x_label, "signal"));
            out.push_str(&format!("{:->12} {:->12}\n", "", ""));
            for (x, y) in curve.points() {
                out.push_str(&format!("{x:>12.2} {y:>12.6}\n"));
            }
        }
    }

    out
}

/// TR sweep table.
pub fn format_sweep_table(points: &[SweepPoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>12} {:>14} {:>14}\n", "TR (ms)", "max |diff|", "relative"));
    out.push_str(&format!("{:->12} {:->14} {:->14}\n", "", "", ""));
    for p in points {
        out.push_str(&format!(
            "{:>12.1} {:>14.6e} {:>13.3}%\n",
            p.tr_ms,
            p.max_abs_diff,
            100.0 * p.max_rel_diff
        ));
    }
    out
}

/// Ernst angle and the optimal flip-angle pair.
pub fn format_ernst(tr_ms: f64, t1_ms: f64, ernst_deg: f64, fraction: f64, pair: (f64, f64)) -> String {
    let mut out = String::new();
    out.push_str(&format!("TR={tr_ms}ms T1={t1_ms}ms\n"));
    out.push_str(&format!("Ernst angle: {ernst_deg:.3}°\n"));
    out.push_str(&format!(
        "Optimal pair ({:.3} of Ernst signal): {:.3}°, {:.3}°\n",
        fraction, pair.0, pair.1
    ));
    out
}

/// Summary of a voxel-wise map.
pub fn format_map_summary(map: &T1Map) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "T1 map: dims={}×{}×{} | fitted={} failed={}\n",
        map.dims[0], map.dims[1], map.dims[2], map.fitted, map.failed
    ));
    if let Some((mean, sd)) = map.stats() {
        out.push_str(&format!("T1: mean={mean:.1}ms sd={sd:.1}ms\n"));
    }
    out
}

fn fmt_vec(v: &[f64], decimals: usize) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.decimals$}")).collect();
    format!("[{}]", parts.join(", "))
}
