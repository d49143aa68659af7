//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - builds protocols, tissue parameters, and fit options
//! - runs evaluation / fitting / mapping
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{Cli, Command, ErnstArgs, FitArgs, MapArgs, PhantomArgs, SimulateArgs, SweepArgs};
use crate::domain::{AcquisitionProtocol, RunConfig, SignalCurve};
use crate::error::AppError;
use crate::models::{ernst_angle_deg, optimal_flip_angle_pair};

pub mod pipeline;

/// Entry point for the `t1map` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(args) => handle_simulate(args),
        Command::Fit(args) => handle_fit(args),
        Command::Sweep(args) => handle_sweep(args),
        Command::Ernst(args) => handle_ernst(args),
        Command::Map(args) => handle_map(args),
        Command::Phantom(args) => handle_phantom(args),
    }
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let out = pipeline::run_simulation(&config)?;

    println!("{}", crate::report::format_run_summary(&config));
    match &out.fit {
        Some(fit) => {
            println!("{}", crate::report::format_fit_summary(&fit.fit));
            println!("{}", crate::report::format_curve_table(&out.observed, Some(&fit.residuals)));
        }
        None => println!("{}", crate::report::format_curve_table(&out.observed, None)),
    }

    if config.plot {
        let series = pipeline::simulation_series(&out);
        let plot = crate::plot::render_ascii_plot(
            &series,
            config.protocol.kind().abscissa_label(),
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &config.export_curve {
        let mut file = crate::io::CurveFile::new(config.protocol.clone(), out.observed.clone());
        file.tissue = Some(config.tissue);
        file.equation = Some(config.equation);
        file.fit = out.fit.as_ref().map(|f| f.fit.clone());
        crate::io::write_curve_json(path, &file)?;
        info!("wrote curve to {}", path.display());
    }
    if let Some(path) = &config.export_chart {
        crate::io::write_chart_json(path, &pipeline::simulation_chart(&config.protocol, &out))?;
        info!("wrote chart to {}", path.display());
    }

    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let (protocol, curve) = match &args.curve {
        Some(path) => {
            let file = crate::io::read_curve_json(path)?;
            (file.protocol, file.curve)
        }
        None => {
            if args.signal.is_empty() {
                return Err(AppError::new(2, "Provide --signal values or a --curve file."));
            }
            let protocol = args.protocol.build(None)?;
            let curve = SignalCurve {
                kind: protocol.kind(),
                x: protocol.abscissa().to_vec(),
                values: args.signal.clone(),
                magnitude: args.magnitude,
            };
            (protocol, curve)
        }
    };

    let out = pipeline::run_fit(&protocol, &curve, &args.tuning.to_options())?;

    print!("{}", crate::report::format_protocol(&protocol));
    println!();
    println!("{}", crate::report::format_fit_summary(&out.fit));
    println!("{}", crate::report::format_curve_table(&curve, Some(&out.residuals)));

    let series = pipeline::fit_series(&protocol, &curve, &out.fit);
    if !args.plot.no_plot {
        let plot = crate::plot::render_ascii_plot(
            &series,
            protocol.kind().abscissa_label(),
            args.plot.width,
            args.plot.height,
        );
        println!("{plot}");
    }

    if let Some(path) = &args.export_residuals {
        crate::io::write_residuals_csv(path, protocol.kind().abscissa_label(), &out.residuals)?;
    }
    if let Some(path) = &args.export_chart {
        let kind = protocol.kind();
        let mut chart = crate::io::ChartFile::new(kind.display_name(), kind.abscissa_label(), "signal");
        for s in &series {
            let (x, y): (Vec<f64>, Vec<f64>) = s.points.iter().copied().unzip();
            chart.push_trace(s.label.clone(), &x, &y);
        }
        crate::io::write_chart_json(path, &chart)?;
    }

    Ok(())
}

fn handle_sweep(args: SweepArgs) -> Result<(), AppError> {
    let tissue = args.tissue.build()?;
    let protocol = args.protocol.build(Some(tissue.t1_ms))?;
    let tr_values = if args.tr_values.is_empty() {
        default_sweep(&protocol)
    } else {
        args.tr_values.clone()
    };

    let points = crate::sweep::sweep_tr(&protocol, &tissue, &tr_values, args.magnitude)?;

    print!("{}", crate::report::format_protocol(&protocol));
    println!("T1={}ms\n", tissue.t1_ms);
    println!("{}", crate::report::format_sweep_table(&points));

    if let Some(path) = &args.export_chart {
        let kind = protocol.kind();
        let mut chart = crate::io::ChartFile::new(
            format!("{}: full vs long-TR", kind.display_name()),
            kind.abscissa_label(),
            "signal",
        );
        for p in &points {
            chart.push_trace(format!("full TR={}", p.tr_ms), protocol.abscissa(), &p.full);
            chart.push_trace(format!("long-TR TR={}", p.tr_ms), protocol.abscissa(), &p.long_tr);
        }
        crate::io::write_chart_json(path, &chart)?;
    }

    Ok(())
}

fn handle_ernst(args: ErnstArgs) -> Result<(), AppError> {
    let ernst = ernst_angle_deg(args.tr, args.t1)?;
    let pair = optimal_flip_angle_pair(args.tr, args.t1, args.fraction)?;
    print!("{}", crate::report::format_ernst(args.tr, args.t1, ernst, args.fraction, pair));
    Ok(())
}

fn handle_map(args: MapArgs) -> Result<(), AppError> {
    let map = pipeline::run_map(&args.dataset, &args.tuning.to_options())?;
    print!("{}", crate::report::format_map_summary(&map));
    if let Some(path) = &args.output {
        crate::io::write_map_json(path, &map)?;
        info!("wrote T1 map to {}", path.display());
    }
    Ok(())
}

fn handle_phantom(args: PhantomArgs) -> Result<(), AppError> {
    // VFA without explicit angles: optimal pair for the median stripe.
    let hint = args.t1_values.get(args.t1_values.len() / 2).copied();
    let protocol = args.protocol.build(hint)?;
    let spec = crate::data::PhantomSpec {
        protocol,
        nx: args.nx,
        ny: args.ny,
        t1_ms: args.t1_values.clone(),
        m0: args.m0,
        noise_sigma: args.noise,
        magnitude: args.magnitude,
        seed: args.seed,
    };

    let phantom = crate::data::generate_phantom(&spec)?;
    phantom.dataset.save(&args.output)?;
    println!(
        "Wrote {}×{} phantom ({} masked voxels) to {}",
        args.nx,
        args.ny,
        phantom.dataset.masked_count(),
        args.output.display()
    );
    Ok(())
}

/// TR values spanning `TR ≈ T1`-ish protocols up to the long-TR limit.
fn default_sweep(protocol: &AcquisitionProtocol) -> Vec<f64> {
    match protocol {
        AcquisitionProtocol::Ir(p) => {
            let last_ti = p.ti_ms().iter().copied().fold(0.0, f64::max);
            crate::cli::DEFAULT_SWEEP_TR_MS
                .iter()
                .copied()
                .filter(|&tr| tr > last_ti)
                .collect()
        }
        AcquisitionProtocol::Vfa(_) => vec![5.0, 10.0, 25.0, 50.0, 100.0, 500.0, 1000.0, 5000.0],
    }
}

/// Map `simulate` flags into a `RunConfig`.
pub fn run_config_from_args(args: &SimulateArgs) -> Result<RunConfig, AppError> {
    let tissue = args.tissue.build()?;
    let protocol = args.protocol.build(Some(tissue.t1_ms))?;

    if !(args.noise.is_finite() && args.noise >= 0.0) {
        return Err(AppError::new(2, "Noise sigma must be finite and >= 0."));
    }

    Ok(RunConfig {
        protocol,
        tissue,
        equation: args.equation,
        magnitude: args.magnitude,
        noise_sigma: args.noise,
        seed: args.seed,
        fit: args.fit.then(|| args.tuning.to_options()),
        plot: !args.plot.no_plot,
        plot_width: args.plot.width,
        plot_height: args.plot.height,
        export_curve: args.export_curve.clone(),
        export_chart: args.export_chart.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EquationVariant, SequenceKind};

    fn simulate_args(argv: &[&str]) -> SimulateArgs {
        let mut full = vec!["t1map", "simulate"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Simulate(args) => args,
            other => panic!("expected simulate, got {other:?}"),
        }
    }

    #[test]
    fn run_config_maps_flags() {
        let args = simulate_args(&[
            "--sequence",
            "ir",
            "--tr",
            "10000",
            "--ti",
            "100,500,2000",
            "--equation",
            "long-tr",
            "--magnitude",
            "--fit",
            "--no-plot",
        ]);
        let config = run_config_from_args(&args).unwrap();
        assert_eq!(config.protocol.kind(), SequenceKind::Ir);
        assert_eq!(config.protocol.abscissa(), &[100.0, 500.0, 2000.0]);
        assert_eq!(config.equation, EquationVariant::LongTr);
        assert!(config.magnitude);
        assert!(config.fit.is_some());
        assert!(!config.plot);
    }

    #[test]
    fn run_config_rejects_invalid_tissue() {
        let args = simulate_args(&["--t1=-5"]);
        let err = run_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn run_config_rejects_ti_beyond_tr() {
        let args = simulate_args(&["--tr", "1000", "--ti", "100,1500"]);
        assert_eq!(run_config_from_args(&args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn default_ir_sweep_stays_above_last_ti() {
        let args = simulate_args(&[]);
        let protocol = args.protocol.build(None).unwrap();
        let trs = default_sweep(&protocol);
        assert!(!trs.is_empty());
        assert!(trs.iter().all(|&tr| tr > 2400.0));
    }
}
