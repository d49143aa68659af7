//! Command-line parsing for the T1 mapping toolkit.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code. Argument groups that several subcommands share
//! (protocol, tissue, fit tuning, plotting) are flattened into each command.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    AcquisitionProtocol, DEFAULT_EXCITATION_DEG, DEFAULT_INVERSION_DEG, EquationVariant, FitMethod,
    InversionRecovery, SequenceKind, TissueParameters, VariableFlipAngle,
};
use crate::error::AppError;
use crate::fit::FitOptions;
use crate::models::{OPTIMAL_PAIR_FRACTION, optimal_flip_angle_pair};

/// Default inversion times (ms) when `--ti` is not given.
pub const DEFAULT_TI_MS: [f64; 7] = [50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 2400.0];

/// Default TR sweep (ms) when `--tr-values` is not given.
pub const DEFAULT_SWEEP_TR_MS: [f64; 8] = [2500.0, 3000.0, 4000.0, 5000.0, 7500.0, 10_000.0, 15_000.0, 25_000.0];

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "t1map", version, about = "T1 mapping: IR/VFA signal equations and curve fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate the signal equations, optionally add noise and fit.
    Simulate(SimulateArgs),
    /// Fit T1 to an observed curve (inline values or a curve JSON file).
    Fit(FitArgs),
    /// Compare the full and long-TR equations over a range of TR values.
    Sweep(SweepArgs),
    /// Ernst angle and the optimal VFA flip-angle pair.
    Ernst(ErnstArgs),
    /// Fit a voxel dataset and write a T1 map.
    Map(MapArgs),
    /// Generate a striped synthetic phantom dataset.
    Phantom(PhantomArgs),
}

/// Acquisition protocol, from flags or a JSON file.
#[derive(Debug, Args, Clone)]
pub struct ProtocolArgs {
    /// Pulse sequence family.
    #[arg(long, value_enum, default_value_t = SequenceKind::Ir)]
    pub sequence: SequenceKind,

    /// Protocol JSON file (overrides the other protocol flags).
    #[arg(long, value_name = "JSON")]
    pub protocol: Option<PathBuf>,

    /// Repetition time (ms). Defaults to 2500 for IR and 25 for VFA.
    #[arg(long)]
    pub tr: Option<f64>,

    /// Inversion times (ms), comma separated.
    #[arg(long, value_delimiter = ',')]
    pub ti: Vec<f64>,

    /// Flip angles (degrees), comma separated. Defaults to the optimal pair for the tissue T1.
    #[arg(long, value_delimiter = ',')]
    pub flip: Vec<f64>,

    /// Inversion pulse angle (degrees).
    #[arg(long, default_value_t = DEFAULT_INVERSION_DEG)]
    pub inversion: f64,

    /// Excitation pulse angle (degrees).
    #[arg(long, default_value_t = DEFAULT_EXCITATION_DEG)]
    pub excitation: f64,
}

impl ProtocolArgs {
    /// Build the protocol. `t1_hint_ms` picks the default VFA flip-angle pair.
    pub fn build(&self, t1_hint_ms: Option<f64>) -> Result<AcquisitionProtocol, AppError> {
        if let Some(path) = &self.protocol {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| AppError::new(2, format!("Failed to read protocol '{}': {e}", path.display())))?;
            let protocol: AcquisitionProtocol = serde_json::from_str(&raw)
                .map_err(|e| AppError::new(2, format!("Invalid protocol JSON '{}': {e}", path.display())))?;
            protocol.validate()?;
            return Ok(protocol);
        }

        match self.sequence {
            SequenceKind::Ir => {
                let tr = self.tr.unwrap_or(2500.0);
                let ti = if self.ti.is_empty() {
                    DEFAULT_TI_MS.iter().copied().filter(|&t| t < tr).collect()
                } else {
                    self.ti.clone()
                };
                Ok(AcquisitionProtocol::Ir(InversionRecovery::with_angles(
                    tr,
                    ti,
                    self.inversion,
                    self.excitation,
                )?))
            }
            SequenceKind::Vfa => {
                let tr = self.tr.unwrap_or(25.0);
                let flip = if self.flip.is_empty() {
                    let t1 = t1_hint_ms
                        .ok_or_else(|| AppError::new(2, "--flip is required for VFA curves."))?;
                    let (low, high) = optimal_flip_angle_pair(tr, t1, OPTIMAL_PAIR_FRACTION)?;
                    vec![low, high]
                } else {
                    self.flip.clone()
                };
                Ok(AcquisitionProtocol::Vfa(VariableFlipAngle::new(tr, flip)?))
            }
        }
    }
}

/// Tissue parameters.
#[derive(Debug, Args, Clone)]
pub struct TissueArgs {
    /// Longitudinal relaxation time (ms).
    #[arg(long, default_value_t = 900.0)]
    pub t1: f64,

    /// Equilibrium magnetization.
    #[arg(long, default_value_t = 1.0)]
    pub m0: f64,

    /// Signal scale constant C.
    #[arg(long, default_value_t = 1.0)]
    pub constant: f64,
}

impl TissueArgs {
    pub fn build(&self) -> Result<TissueParameters, AppError> {
        let tissue = TissueParameters {
            t1_ms: self.t1,
            m0: self.m0,
            constant: self.constant,
        };
        tissue.validate()?;
        Ok(tissue)
    }
}

/// Fitting policy and tuning.
#[derive(Debug, Args, Clone)]
pub struct FitTuningArgs {
    /// Fitting method.
    #[arg(long, value_enum, default_value_t = FitMethod::Auto)]
    pub method: FitMethod,

    /// Starting T1 (ms) for the nonlinear fit.
    #[arg(long, default_value_t = 1000.0)]
    pub t1_init: f64,

    /// Convergence tolerance for the nonlinear fit.
    #[arg(long, default_value_t = 1e-10)]
    pub tolerance: f64,

    /// Iteration cap for the nonlinear fit.
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,

    /// Minimum T1 (ms) for the reduced-dimension grid.
    #[arg(long, default_value_t = 1.0)]
    pub t1_min: f64,

    /// Maximum T1 (ms) for the reduced-dimension grid.
    #[arg(long, default_value_t = 10_000.0)]
    pub t1_max: f64,

    /// Grid points per reduced-dimension pass.
    #[arg(long, default_value_t = 200)]
    pub t1_steps: usize,

    /// Reduced-dimension refinement passes.
    #[arg(long, default_value_t = 2)]
    pub refine: usize,
}

impl FitTuningArgs {
    pub fn to_options(&self) -> FitOptions {
        FitOptions {
            method: self.method,
            initial_t1_ms: self.t1_init,
            tolerance: self.tolerance,
            max_iterations: self.max_iter,
            t1_min_ms: self.t1_min,
            t1_max_ms: self.t1_max,
            t1_steps: self.t1_steps,
            refine_passes: self.refine,
        }
    }
}

/// Terminal plot options.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub protocol: ProtocolArgs,

    #[command(flatten)]
    pub tissue: TissueArgs,

    /// Equation used for the simulated samples.
    #[arg(long, value_enum, default_value_t = EquationVariant::Full)]
    pub equation: EquationVariant,

    /// Report magnitude signal.
    #[arg(long)]
    pub magnitude: bool,

    /// Noise standard deviation (signal units); 0 disables.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fit T1 to the simulated samples.
    #[arg(long)]
    pub fit: bool,

    #[command(flatten)]
    pub tuning: FitTuningArgs,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Export the simulated curve (and fit) to JSON.
    #[arg(long = "export-curve")]
    pub export_curve: Option<PathBuf>,

    /// Export renderer traces to JSON.
    #[arg(long = "export-chart")]
    pub export_chart: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Curve JSON file produced by `t1map simulate --export-curve`.
    #[arg(long, value_name = "JSON", conflicts_with = "signal")]
    pub curve: Option<PathBuf>,

    #[command(flatten)]
    pub protocol: ProtocolArgs,

    /// Observed signal values, comma separated, in protocol order.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub signal: Vec<f64>,

    /// The signal values are magnitudes.
    #[arg(long)]
    pub magnitude: bool,

    #[command(flatten)]
    pub tuning: FitTuningArgs,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Export per-sample residuals to CSV.
    #[arg(long = "export-residuals")]
    pub export_residuals: Option<PathBuf>,

    /// Export renderer traces to JSON.
    #[arg(long = "export-chart")]
    pub export_chart: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub protocol: ProtocolArgs,

    #[command(flatten)]
    pub tissue: TissueArgs,

    /// TR values (ms), comma separated.
    #[arg(long, value_delimiter = ',')]
    pub tr_values: Vec<f64>,

    /// Compare magnitude signals.
    #[arg(long)]
    pub magnitude: bool,

    /// Export renderer traces (one pair per TR) to JSON.
    #[arg(long = "export-chart")]
    pub export_chart: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct ErnstArgs {
    /// Repetition time (ms).
    #[arg(long, default_value_t = 25.0)]
    pub tr: f64,

    /// Longitudinal relaxation time (ms).
    #[arg(long, default_value_t = 900.0)]
    pub t1: f64,

    /// Fraction of the Ernst signal for the optimal pair.
    #[arg(long, default_value_t = OPTIMAL_PAIR_FRACTION)]
    pub fraction: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct MapArgs {
    /// Dataset JSON file.
    #[arg(long, value_name = "JSON")]
    pub dataset: PathBuf,

    #[command(flatten)]
    pub tuning: FitTuningArgs,

    /// Write the T1 map to JSON.
    #[arg(long, value_name = "JSON")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct PhantomArgs {
    #[command(flatten)]
    pub protocol: ProtocolArgs,

    /// Phantom width (voxels).
    #[arg(long, default_value_t = 16)]
    pub nx: usize,

    /// Phantom height (voxels).
    #[arg(long, default_value_t = 16)]
    pub ny: usize,

    /// One T1 (ms) per stripe, comma separated.
    #[arg(long, value_delimiter = ',', default_values_t = [500.0, 900.0, 1400.0, 2000.0])]
    pub t1_values: Vec<f64>,

    /// Equilibrium magnetization.
    #[arg(long, default_value_t = 1.0)]
    pub m0: f64,

    /// Noise standard deviation (signal units).
    #[arg(long, default_value_t = 0.005)]
    pub noise: f64,

    /// Store magnitude data.
    #[arg(long)]
    pub magnitude: bool,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Dataset JSON file to write.
    #[arg(long, value_name = "JSON")]
    pub output: PathBuf,
}
