//! Curve fitting.
//!
//! Responsibilities:
//!
//! - resolve the requested policy (`FitMethod::Auto`) per sequence family
//! - closed-form linear regression after linearization (`linear`)
//! - Levenberg–Marquardt on the full equation (`nonlinear`)
//! - reduced-dimension grid search over T1 (parallel) (`reduced`)
//! - voxel-wise maps over a dataset (`map`)

pub mod fitter;
pub mod linear;
pub mod map;
pub mod nonlinear;
pub mod reduced;
pub mod t1_grid;

pub use fitter::*;
pub use map::*;
pub use t1_grid::*;
