//! `t1-mapping` library crate.
//!
//! The binary (`t1map`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the evaluator and fitters are reusable by other front-ends (renderers, notebooks)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod sweep;
