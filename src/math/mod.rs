//! Mathematical utilities: relaxation factors, least squares, and a small
//! Levenberg–Marquardt solver.

pub mod lm;
pub mod ols;
pub mod relax;

pub use lm::*;
pub use ols::*;
pub use relax::*;
