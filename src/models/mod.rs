//! Closed-form signal equations.
//!
//! Models are implemented as small, pure functions so that evaluation and fitting
//! code can stay generic over the sequence family:
//!
//! - `ir`: inversion recovery
//! - `vfa`: variable flip angle (spoiled gradient echo), Ernst angle helpers
//! - `signal`: protocol-level evaluation, design rows, fitted-curve prediction

pub mod ir;
pub mod signal;
pub mod vfa;

pub use ir::*;
pub use signal::*;
pub use vfa::*;
