//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - acquisition protocols (`AcquisitionProtocol`, `InversionRecovery`, `VariableFlipAngle`)
//! - tissue parameters and evaluated signal curves
//! - configuration enums (`EquationVariant`, `FitMethod`)
//! - fit outputs (`FitResult`, `FittedModel`)

pub mod types;

pub use types::*;
