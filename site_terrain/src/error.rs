//! Error types shared across the site model pipeline.

use thiserror::Error;

/// Errors produced while building or placing site model meshes.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Raster or mesh file unreadable or unwritable.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Elevation raster could not be decoded.
    #[error("raster decode error: {0}")]
    Raster(#[from] tiff::TiffError),
    /// Mismatched input shapes or otherwise unusable input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A configuration scalar is outside its allowed range.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Too few distinct points to triangulate.
    #[error("degenerate mesh: {0}")]
    DegenerateMesh(String),
    /// Placement requested without a usable terrain mesh.
    #[error("missing terrain: {0}")]
    MissingTerrain(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ModelError>;
