//! Complexity-weighted adaptive sampling of raster pixels.
//!
//! Sampling is two-phase on purpose: a probability-weighted exploration
//! draw over the complexity map, then the fixed boundary landmarks that
//! guarantee the mesh spans the full raster extent. The phases must not be
//! merged into a single weighted draw.

use std::collections::BTreeSet;

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::complexity::ComplexityMap;
use crate::error::{ModelError, Result};
use crate::raster::ElevationRaster;

/// Number of fixed boundary landmarks added to every sample set.
pub const LANDMARK_COUNT: usize = 13;

/// Configuration for the adaptive sampler.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SamplerConfig {
    /// Fraction of raster pixels to keep, in (0, 1].
    pub sample_ratio: f64,
    /// Lower bound on the exploratory sample budget.
    pub min_samples: usize,
    /// Upper bound on the exploratory sample budget.
    pub max_samples: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_ratio: 0.2,
            min_samples: 100,
            max_samples: 1_000_000,
        }
    }
}

impl SamplerConfig {
    fn validate(&self) -> Result<()> {
        if !(self.sample_ratio > 0.0 && self.sample_ratio <= 1.0) {
            return Err(ModelError::Config(format!(
                "sample_ratio must be in (0, 1], got {}",
                self.sample_ratio
            )));
        }
        if self.min_samples > self.max_samples {
            return Err(ModelError::Config(format!(
                "min_samples {} exceeds max_samples {}",
                self.min_samples, self.max_samples
            )));
        }
        Ok(())
    }
}

/// Unique pixel coordinates `(col, row)` with their elevations, plus the
/// raster shape they were drawn from.
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub points: Vec<(usize, usize)>,
    pub values: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The 13 fixed boundary landmarks of a `rows x cols` raster as
/// `(col, row)` pairs: the four corners, quarter/half/three-quarter points
/// on the top and bottom edges, and the same fractions down the left edge.
pub fn boundary_landmarks(rows: usize, cols: usize) -> Vec<(usize, usize)> {
    vec![
        (0, 0),
        (cols - 1, 0),
        (0, rows - 1),
        (cols - 1, rows - 1),
        (cols / 4, 0),
        (cols / 2, 0),
        (3 * cols / 4, 0),
        (cols / 4, rows - 1),
        (cols / 2, rows - 1),
        (3 * cols / 4, rows - 1),
        (0, rows / 4),
        (0, rows / 2),
        (0, 3 * rows / 4),
    ]
}

/// Draws a complexity-weighted sample of raster pixels without
/// replacement, then adds the boundary landmarks. The landmarks are
/// present in the output no matter how aggressive `sample_ratio` is.
///
/// Fails with an invalid-input error when the raster and complexity map
/// shapes differ.
pub fn adaptive_sample<R: Rng>(
    raster: &ElevationRaster,
    complexity: &ComplexityMap,
    config: &SamplerConfig,
    rng: &mut R,
) -> Result<SampleSet> {
    config.validate()?;
    let (rows, cols) = (raster.rows(), raster.cols());
    if complexity.rows() != rows || complexity.cols() != cols {
        return Err(ModelError::InvalidInput(format!(
            "raster shape {rows}x{cols} does not match complexity map shape {}x{}",
            complexity.rows(),
            complexity.cols()
        )));
    }

    let total = raster.len();
    let budget = ((total as f64 * config.sample_ratio) as i64 - LANDMARK_COUNT as i64)
        .clamp(config.min_samples as i64, config.max_samples as i64) as usize;
    let budget = budget.min(total);

    // Phase 1: exploration. Weighted reservoir keys u^(1/w) pick `budget`
    // pixels without replacement in proportion to complexity.
    let mut keyed: Vec<(f64, usize)> = Vec::new();
    for (idx, &w) in complexity.values().iter().enumerate() {
        if w > 0.0 && raster.values()[idx].is_finite() {
            let u: f64 = rng.gen_range(f64::EPSILON..1.0);
            keyed.push((u.powf(1.0 / w), idx));
        }
    }
    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    let mut chosen: BTreeSet<usize> = keyed.iter().take(budget).map(|&(_, idx)| idx).collect();

    // A flat (or mostly-nodata) raster leaves the weighted pool short;
    // top up uniformly so the min_samples floor still holds.
    if chosen.len() < budget {
        let pool: Vec<usize> = (0..total)
            .filter(|idx| !chosen.contains(idx) && raster.values()[*idx].is_finite())
            .collect();
        let need = budget - chosen.len();
        chosen.extend(pool.choose_multiple(rng, need).copied());
    }

    // Phase 2: guaranteed coverage.
    for (col, row) in boundary_landmarks(rows, cols) {
        let col = col.min(cols - 1);
        let row = row.min(rows - 1);
        chosen.insert(row * cols + col);
    }

    let points: Vec<(usize, usize)> = chosen.iter().map(|idx| (idx % cols, idx / cols)).collect();
    let values: Vec<f64> = chosen.iter().map(|&idx| raster.values()[idx]).collect();
    debug!(
        "sampled {} of {} pixels (budget {budget} + {LANDMARK_COUNT} landmarks)",
        points.len(),
        total
    );
    Ok(SampleSet {
        points,
        values,
        rows,
        cols,
    })
}
