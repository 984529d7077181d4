//! Single-band elevation raster loading and access.

use std::fs::File;

use log::debug;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::{ModelError, Result};

/// Common nodata sentinel threshold; values at or below it become NaN.
const NODATA_FLOOR: f64 = -9999.0;

/// Pixel-to-world transform of a raster: world origin of the top-left
/// pixel corner plus pixel size. Retained for geo-referencing, not used by
/// the mesh math itself.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

/// Immutable single-band elevation grid in row-major order, row 0 at the
/// top of the raster. Nodata cells are stored as NaN.
#[derive(Debug, Clone)]
pub struct ElevationRaster {
    values: Vec<f64>,
    rows: usize,
    cols: usize,
    geotransform: Option<GeoTransform>,
    crs: Option<String>,
}

impl ElevationRaster {
    /// Loads one band of a GeoTIFF elevation raster. `band` is 1-based;
    /// asking for a band the file does not contain is an error.
    pub fn load(path: &str, band: usize) -> Result<Self> {
        if band == 0 {
            return Err(ModelError::Config("band indices start at 1".to_string()));
        }
        let file = File::open(path)?;
        let mut decoder = Decoder::new(file)?;
        for _ in 1..band {
            if !decoder.more_images() {
                return Err(ModelError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("band {band} not present in {path}"),
                )));
            }
            decoder.next_image()?;
        }
        let (width, height) = decoder.dimensions()?;
        let (rows, cols) = (height as usize, width as usize);
        let raw = match decoder.read_image()? {
            DecodingResult::F64(data) => data,
            DecodingResult::F32(data) => data.iter().map(|&v| v as f64).collect(),
            DecodingResult::I8(data) => data.iter().map(|&v| v as f64).collect(),
            DecodingResult::I16(data) => data.iter().map(|&v| v as f64).collect(),
            DecodingResult::I32(data) => data.iter().map(|&v| v as f64).collect(),
            DecodingResult::I64(data) => data.iter().map(|&v| v as f64).collect(),
            DecodingResult::U8(data) => data.iter().map(|&v| v as f64).collect(),
            DecodingResult::U16(data) => data.iter().map(|&v| v as f64).collect(),
            DecodingResult::U32(data) => data.iter().map(|&v| v as f64).collect(),
            DecodingResult::U64(data) => data.iter().map(|&v| v as f64).collect(),
        };
        if rows == 0 || cols == 0 || raw.len() < rows * cols {
            return Err(ModelError::InvalidInput(format!(
                "raster {path} decoded to {} samples for a {rows}x{cols} grid",
                raw.len()
            )));
        }
        // Squeeze interleaved extra samples down to the first channel.
        let samples = raw.len() / (rows * cols);
        let values: Vec<f64> = raw
            .iter()
            .step_by(samples.max(1))
            .take(rows * cols)
            .map(|&v| if v.is_finite() && v > NODATA_FLOOR { v } else { f64::NAN })
            .collect();

        let geotransform = read_geotransform(&mut decoder);
        let crs = decoder.get_tag_ascii_string(Tag::Unknown(GEO_ASCII_PARAMS)).ok();
        debug!(
            "loaded raster {path}: {rows}x{cols}, band {band}, georeferenced: {}",
            geotransform.is_some()
        );
        Ok(Self {
            values,
            rows,
            cols,
            geotransform,
            crs,
        })
    }

    /// Builds a raster from an in-memory grid. `values` is row-major with
    /// `rows * cols` entries.
    pub fn from_grid(values: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 || values.len() != rows * cols {
            return Err(ModelError::InvalidInput(format!(
                "{} values do not form a {rows}x{cols} grid",
                values.len()
            )));
        }
        Ok(Self {
            values,
            rows,
            cols,
            geotransform: None,
            crs: None,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of pixels.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Elevation at pixel `(col, row)`. Out-of-range coordinates panic,
    /// callers are expected to stay in bounds.
    pub fn value(&self, col: usize, row: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    /// Row-major view of the whole grid.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn geotransform(&self) -> Option<GeoTransform> {
        self.geotransform
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }
}

// GeoTIFF tag ids; the tiff crate does not name them.
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_ASCII_PARAMS: u16 = 34737;

fn read_geotransform(decoder: &mut Decoder<File>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok()?;
    if scale.len() < 2 || tiepoint.len() < 5 {
        return None;
    }
    Some(GeoTransform {
        origin_x: tiepoint[3],
        origin_y: tiepoint[4],
        pixel_width: scale[0],
        pixel_height: scale[1],
    })
}
