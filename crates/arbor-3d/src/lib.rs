#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera model and depth unprojection.
pub mod camera;

/// I/O utilities for reading and writing 3D data.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Point cloud container types.
pub mod pointcloud;

/// Range image construction from point clouds.
pub mod rangeimage;

/// 3D transforms algorithms.
pub mod transforms;

pub(crate) mod utils;
