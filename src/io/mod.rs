//! Input/output helpers.
//!
//! - curve JSON read/write (`curve`)
//! - renderer traces (chart JSON) and residual CSV exports (`export`)
//! - T1 map JSON (`map`)

pub mod curve;
pub mod export;
pub mod map;

pub use curve::*;
pub use export::*;
pub use map::*;
