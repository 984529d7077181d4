//! Terrain complexity estimation over an elevation grid.
//!
//! Complexity is the mean of a Sobel gradient magnitude field and a
//! sliding-window local variance field, min-max normalized to [0, 1].
//! Rough terrain scores high and is sampled densely downstream.

use crate::raster::ElevationRaster;

/// Default sliding window size for the local variance field.
pub const DEFAULT_VARIANCE_WINDOW: usize = 5;

/// Per-pixel terrain complexity in [0, 1], same shape as the source raster.
#[derive(Debug, Clone)]
pub struct ComplexityMap {
    values: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl ComplexityMap {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn value(&self, col: usize, row: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    /// Row-major view of the whole map.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Computes the terrain complexity map of `raster` using a variance window
/// of `window` pixels (see [`DEFAULT_VARIANCE_WINDOW`]). A perfectly flat
/// raster yields a map of all zeros. Nodata cells carry zero complexity.
pub fn complexity_map(raster: &ElevationRaster, window: usize) -> ComplexityMap {
    let (rows, cols) = (raster.rows(), raster.cols());
    let window = window.max(1);

    // Nodata cells would poison the filters; substitute the finite mean
    // and zero their complexity at the end.
    let finite: Vec<f64> = raster.values().iter().copied().filter(|v| v.is_finite()).collect();
    let fill = if finite.is_empty() {
        0.0
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    };
    let grid: Vec<f64> = raster
        .values()
        .iter()
        .map(|&v| if v.is_finite() { v } else { fill })
        .collect();

    let at = |col: i64, row: i64| -> f64 {
        let c = col.clamp(0, cols as i64 - 1) as usize;
        let r = row.clamp(0, rows as i64 - 1) as usize;
        grid[r * cols + c]
    };

    // Sobel 3x3 gradient magnitude with replicated borders.
    let mut combined = vec![0.0; rows * cols];
    for row in 0..rows as i64 {
        for col in 0..cols as i64 {
            let gx = at(col + 1, row - 1) - at(col - 1, row - 1)
                + 2.0 * (at(col + 1, row) - at(col - 1, row))
                + at(col + 1, row + 1) - at(col - 1, row + 1);
            let gy = at(col - 1, row + 1) - at(col - 1, row - 1)
                + 2.0 * (at(col, row + 1) - at(col, row - 1))
                + at(col + 1, row + 1) - at(col + 1, row - 1);
            combined[row as usize * cols + col as usize] = (gx * gx + gy * gy).sqrt();
        }
    }

    // Local variance: box-filtered mean, then box-filtered squared
    // deviation from that mean.
    let half = (window / 2) as i64;
    let box_filter = |src: &dyn Fn(i64, i64) -> f64, col: i64, row: i64| -> f64 {
        let mut sum = 0.0;
        for dr in -half..=half {
            for dc in -half..=half {
                sum += src(col + dc, row + dr);
            }
        }
        sum / (window * window) as f64
    };
    let mut mean = vec![0.0; rows * cols];
    for row in 0..rows as i64 {
        for col in 0..cols as i64 {
            mean[row as usize * cols + col as usize] = box_filter(&at, col, row);
        }
    }
    let sq_dev = |col: i64, row: i64| -> f64 {
        let c = col.clamp(0, cols as i64 - 1) as usize;
        let r = row.clamp(0, rows as i64 - 1) as usize;
        let d = grid[r * cols + c] - mean[r * cols + c];
        d * d
    };
    for row in 0..rows as i64 {
        for col in 0..cols as i64 {
            let variance = box_filter(&sq_dev, col, row);
            let idx = row as usize * cols + col as usize;
            combined[idx] = (combined[idx] + variance) / 2.0;
        }
    }

    for (idx, v) in raster.values().iter().enumerate() {
        if !v.is_finite() {
            combined[idx] = 0.0;
        }
    }

    // Min-max normalize; a zero range (flat raster) stays all zeros
    // rather than dividing by zero.
    let min = combined.iter().copied().fold(f64::INFINITY, f64::min);
    let max = combined.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range > 0.0 {
        for v in &mut combined {
            *v = (*v - min) / range;
        }
    } else {
        combined.iter_mut().for_each(|v| *v = 0.0);
    }

    ComplexityMap {
        values: combined,
        rows,
        cols,
    }
}
