//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during evaluation and fitting
//! - exported to JSON (curves, charts, maps)
//! - reloaded later for fitting or plotting
//!
//! Units: times are milliseconds, angles are degrees.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, T1Error};
use crate::fit::FitOptions;

/// Default inversion pulse angle for IR protocols.
pub const DEFAULT_INVERSION_DEG: f64 = 180.0;

/// Default excitation pulse angle for IR protocols.
pub const DEFAULT_EXCITATION_DEG: f64 = 90.0;

/// Pulse sequence family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    /// Inversion recovery (samples indexed by inversion time).
    Ir,
    /// Variable flip angle spoiled gradient echo (samples indexed by flip angle).
    Vfa,
}

impl SequenceKind {
    pub fn display_name(self) -> &'static str {
        match self {
            SequenceKind::Ir => "Inversion recovery",
            SequenceKind::Vfa => "Variable flip angle",
        }
    }

    /// Axis label for the protocol abscissa.
    pub fn abscissa_label(self) -> &'static str {
        match self {
            SequenceKind::Ir => "TI (ms)",
            SequenceKind::Vfa => "flip angle (deg)",
        }
    }
}

/// Which closed-form equation to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EquationVariant {
    /// Full analytical steady-state solution.
    Full,
    /// Limit `TR → ∞` (all `exp(-TR/T1)` terms dropped).
    LongTr,
}

impl EquationVariant {
    pub fn display_name(self) -> &'static str {
        match self {
            EquationVariant::Full => "full",
            EquationVariant::LongTr => "long-TR",
        }
    }
}

/// Requested fitting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FitMethod {
    /// VFA: linear. IR: linear when the long-TR condition holds, else nonlinear.
    Auto,
    Linear,
    Nonlinear,
    ReducedDimension,
}

/// Concrete fitting policy after resolving `FitMethod::Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitKind {
    Linear,
    Nonlinear,
    ReducedDimension,
}

impl FitKind {
    pub fn display_name(self) -> &'static str {
        match self {
            FitKind::Linear => "linear regression",
            FitKind::Nonlinear => "nonlinear least squares (LM)",
            FitKind::ReducedDimension => "reduced-dimension grid search",
        }
    }
}

/// Inversion recovery protocol.
///
/// Fields are private: a protocol is validated on construction and read-only
/// afterwards. Deserialized protocols are validated again by every consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversionRecovery {
    tr_ms: f64,
    ti_ms: Vec<f64>,
    #[serde(default = "default_inversion_deg")]
    inversion_deg: f64,
    #[serde(default = "default_excitation_deg")]
    excitation_deg: f64,
}

fn default_inversion_deg() -> f64 {
    DEFAULT_INVERSION_DEG
}

fn default_excitation_deg() -> f64 {
    DEFAULT_EXCITATION_DEG
}

impl InversionRecovery {
    /// IR protocol with an ideal 180° inversion and 90° excitation.
    pub fn new(tr_ms: f64, ti_ms: Vec<f64>) -> Result<Self> {
        Self::with_angles(tr_ms, ti_ms, DEFAULT_INVERSION_DEG, DEFAULT_EXCITATION_DEG)
    }

    pub fn with_angles(
        tr_ms: f64,
        ti_ms: Vec<f64>,
        inversion_deg: f64,
        excitation_deg: f64,
    ) -> Result<Self> {
        let protocol = Self {
            tr_ms,
            ti_ms,
            inversion_deg,
            excitation_deg,
        };
        protocol.validate()?;
        Ok(protocol)
    }

    pub fn tr_ms(&self) -> f64 {
        self.tr_ms
    }

    pub fn ti_ms(&self) -> &[f64] {
        &self.ti_ms
    }

    pub fn inversion_deg(&self) -> f64 {
        self.inversion_deg
    }

    pub fn excitation_deg(&self) -> f64 {
        self.excitation_deg
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("tr_ms", self.tr_ms)?;
        if self.ti_ms.is_empty() {
            return Err(T1Error::EmptyProtocol);
        }
        for &ti in &self.ti_ms {
            if !ti.is_finite() || ti < 0.0 {
                return Err(T1Error::invalid("ti_ms", ti, "must be finite and >= 0"));
            }
            if ti >= self.tr_ms {
                return Err(T1Error::invalid("ti_ms", ti, "must be shorter than TR"));
            }
        }
        check_angle("inversion_deg", self.inversion_deg)?;
        check_angle("excitation_deg", self.excitation_deg)?;
        Ok(())
    }
}

/// Variable flip angle (spoiled gradient echo) protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableFlipAngle {
    tr_ms: f64,
    flip_deg: Vec<f64>,
}

impl VariableFlipAngle {
    pub fn new(tr_ms: f64, flip_deg: Vec<f64>) -> Result<Self> {
        let protocol = Self { tr_ms, flip_deg };
        protocol.validate()?;
        Ok(protocol)
    }

    pub fn tr_ms(&self) -> f64 {
        self.tr_ms
    }

    pub fn flip_deg(&self) -> &[f64] {
        &self.flip_deg
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("tr_ms", self.tr_ms)?;
        if self.flip_deg.is_empty() {
            return Err(T1Error::EmptyProtocol);
        }
        for &alpha in &self.flip_deg {
            check_angle("flip_deg", alpha)?;
        }
        Ok(())
    }
}

/// An acquisition protocol of either sequence family.
///
/// JSON form carries a `sequence` tag:
///
/// ```text
/// {"sequence":"vfa","tr_ms":25.0,"flip_deg":[3.0,20.0]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sequence", rename_all = "lowercase")]
pub enum AcquisitionProtocol {
    Ir(InversionRecovery),
    Vfa(VariableFlipAngle),
}

impl AcquisitionProtocol {
    pub fn kind(&self) -> SequenceKind {
        match self {
            AcquisitionProtocol::Ir(_) => SequenceKind::Ir,
            AcquisitionProtocol::Vfa(_) => SequenceKind::Vfa,
        }
    }

    pub fn tr_ms(&self) -> f64 {
        match self {
            AcquisitionProtocol::Ir(p) => p.tr_ms(),
            AcquisitionProtocol::Vfa(p) => p.tr_ms(),
        }
    }

    /// Per-sample abscissa: TI (ms) for IR, flip angle (deg) for VFA.
    pub fn abscissa(&self) -> &[f64] {
        match self {
            AcquisitionProtocol::Ir(p) => p.ti_ms(),
            AcquisitionProtocol::Vfa(p) => p.flip_deg(),
        }
    }

    pub fn len(&self) -> usize {
        self.abscissa().len()
    }

    pub fn is_empty(&self) -> bool {
        self.abscissa().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            AcquisitionProtocol::Ir(p) => p.validate(),
            AcquisitionProtocol::Vfa(p) => p.validate(),
        }
    }

    /// Same sample points with a different repetition time.
    pub fn with_tr(&self, tr_ms: f64) -> Result<Self> {
        match self {
            AcquisitionProtocol::Ir(p) => Ok(AcquisitionProtocol::Ir(InversionRecovery::with_angles(
                tr_ms,
                p.ti_ms.clone(),
                p.inversion_deg,
                p.excitation_deg,
            )?)),
            AcquisitionProtocol::Vfa(p) => Ok(AcquisitionProtocol::Vfa(VariableFlipAngle::new(
                tr_ms,
                p.flip_deg.clone(),
            )?)),
        }
    }
}

/// Physical parameters of a simulated tissue (or voxel).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TissueParameters {
    pub t1_ms: f64,
    pub m0: f64,
    /// Scanner/receiver scale constant `C`.
    #[serde(default = "default_constant")]
    pub constant: f64,
}

fn default_constant() -> f64 {
    1.0
}

impl TissueParameters {
    pub fn new(t1_ms: f64, m0: f64) -> Result<Self> {
        let tissue = Self {
            t1_ms,
            m0,
            constant: 1.0,
        };
        tissue.validate()?;
        Ok(tissue)
    }

    /// Signal amplitude `C·M0`.
    pub fn amplitude(&self) -> f64 {
        self.constant * self.m0
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("t1_ms", self.t1_ms)?;
        if !self.m0.is_finite() {
            return Err(T1Error::invalid("m0", self.m0, "must be finite"));
        }
        if !self.constant.is_finite() {
            return Err(T1Error::invalid("constant", self.constant, "must be finite"));
        }
        Ok(())
    }
}

/// Evaluated (or observed) signal, one value per protocol sample point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCurve {
    pub kind: SequenceKind,
    /// Protocol abscissa (TI in ms or flip angle in degrees).
    pub x: Vec<f64>,
    pub values: Vec<f64>,
    /// Whether `values` are magnitudes (sign discarded).
    pub magnitude: bool,
}

impl SignalCurve {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.values.iter().copied())
    }
}

/// Fitted signal model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "kebab-case")]
pub enum FittedModel {
    /// `A · shape(T1)` under the given closed-form equation, `A = C·M0`.
    Scaled {
        amplitude: f64,
        equation: EquationVariant,
    },
    /// `a + b·exp(-TI/T1)` (inversion recovery, reduced dimension).
    Exponential { a: f64, b: f64 },
}

/// Fit output for a single curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub t1_ms: f64,
    pub model: FittedModel,
    pub method: FitKind,
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
    /// Optimizer iterations (grid passes for reduced dimension, 0 for linear).
    pub iterations: usize,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub protocol: AcquisitionProtocol,
    pub tissue: TissueParameters,
    pub equation: EquationVariant,
    pub magnitude: bool,

    /// Gaussian noise standard deviation (same units as the signal); `0` disables.
    pub noise_sigma: f64,
    pub seed: u64,

    pub fit: Option<FitOptions>,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_curve: Option<PathBuf>,
    pub export_chart: Option<PathBuf>,
}

fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(T1Error::invalid(name, value, "must be finite and > 0"))
    }
}

fn check_angle(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=180.0).contains(&value) {
        Ok(())
    } else {
        Err(T1Error::invalid(name, value, "must be within [0, 180] degrees"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_protocols_are_rejected() {
        assert!(matches!(
            InversionRecovery::new(2000.0, vec![]),
            Err(T1Error::EmptyProtocol)
        ));
        assert!(matches!(
            VariableFlipAngle::new(25.0, vec![]),
            Err(T1Error::EmptyProtocol)
        ));
    }

    #[test]
    fn invalid_times_and_angles_are_rejected() {
        assert!(InversionRecovery::new(0.0, vec![100.0]).is_err());
        assert!(InversionRecovery::new(-5.0, vec![100.0]).is_err());
        assert!(InversionRecovery::new(1000.0, vec![1000.0]).is_err());
        assert!(InversionRecovery::new(1000.0, vec![-1.0]).is_err());
        assert!(VariableFlipAngle::new(25.0, vec![190.0]).is_err());
        assert!(VariableFlipAngle::new(f64::NAN, vec![10.0]).is_err());
        assert!(TissueParameters::new(0.0, 1.0).is_err());
        assert!(TissueParameters::new(900.0, f64::INFINITY).is_err());
    }

    #[test]
    fn protocol_json_carries_sequence_tag() {
        let protocol =
            AcquisitionProtocol::Vfa(VariableFlipAngle::new(25.0, vec![3.0, 20.0]).unwrap());
        let json = serde_json::to_string(&protocol).unwrap();
        assert!(json.contains("\"sequence\":\"vfa\""));

        let back: AcquisitionProtocol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, protocol);

        let ir: AcquisitionProtocol =
            serde_json::from_str(r#"{"sequence":"ir","tr_ms":2500.0,"ti_ms":[50.0,400.0]}"#)
                .unwrap();
        match ir {
            AcquisitionProtocol::Ir(p) => {
                assert_eq!(p.inversion_deg(), DEFAULT_INVERSION_DEG);
                assert_eq!(p.excitation_deg(), DEFAULT_EXCITATION_DEG);
            }
            AcquisitionProtocol::Vfa(_) => panic!("expected IR protocol"),
        }
    }

    #[test]
    fn with_tr_revalidates_sample_points() {
        let protocol =
            AcquisitionProtocol::Ir(InversionRecovery::new(3000.0, vec![100.0, 1500.0]).unwrap());
        assert!(protocol.with_tr(5000.0).is_ok());
        assert!(protocol.with_tr(1000.0).is_err());
    }
}
