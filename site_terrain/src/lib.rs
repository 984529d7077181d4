//! Core library for turning an area of interest into a 3D site model.
//!
//! The pipeline goes elevation raster -> terrain complexity -> adaptive
//! sampling -> triangulated terrain mesh, with building volumes placed on
//! the finished terrain by vertical ray casting.

pub mod complexity;
pub mod error;
pub mod geometry;
pub mod height;
pub mod io;
pub mod mesh;
pub mod placement;
pub mod raster;
pub mod sampling;

pub use error::{ModelError, Result};
