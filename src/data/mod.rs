//! Input data: synthetic noise, voxel datasets, and generated phantoms.

pub mod dataset;
pub mod noise;
pub mod phantom;

pub use dataset::*;
pub use noise::*;
pub use phantom::*;
