//! Gradient field for cliff detection
//!
//! Each interior cell holds the largest absolute elevation difference to its
//! 8 neighbours, diagonal differences divided by √2. Border cells are zero:
//! a discontinuity needs neighbours on both sides to be asserted.

use crate::maybe_rayon::*;
use escarp_core::raster::{Raster, QUEEN_STEPS};
use escarp_core::{Error, Result};
use ndarray::Array2;

/// Denominator floor for the directional ratios
const RATIO_EPSILON: f64 = 1e-6;

/// Gradient magnitude plus the optional sub-pixel ratio fields
#[derive(Debug, Clone)]
pub struct GradientField {
    pub magnitude: Raster<f64>,
    pub ratios: Option<DirectionalRatios>,
}

impl GradientField {
    /// Compute the magnitude, and the ratio fields when `ratio_alpha` is given
    pub fn compute(dem: &Raster<f64>, ratio_alpha: Option<f64>) -> Result<Self> {
        let magnitude = gradient_magnitude(dem)?;
        let ratios = ratio_alpha
            .map(|alpha| directional_ratios(dem, alpha))
            .transpose()?;
        Ok(Self { magnitude, ratios })
    }
}

/// Horizontal and vertical edge-bias ratios in `[0, 1)`.
///
/// `horizontal` close to 1 means the elevation change is concentrated on the
/// right of the cell, close to 0 on the left; `vertical` likewise for
/// below/above. Border cells are zero.
#[derive(Debug, Clone)]
pub struct DirectionalRatios {
    pub horizontal: Array2<f64>,
    pub vertical: Array2<f64>,
}

/// Maximum scaled 8-neighbour difference per cell
pub fn gradient_magnitude(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let data = dem.data();

    let output: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = vec![0.0; cols];
            if row == 0 || row + 1 >= rows {
                return out;
            }
            for (col, cell) in out.iter_mut().enumerate().take(cols.saturating_sub(1)).skip(1) {
                let z = data[[row, col]];
                *cell = QUEEN_STEPS.iter().fold(0.0_f64, |acc, &(dr, dc, dist)| {
                    let nr = (row as isize + dr) as usize;
                    let nc = (col as isize + dc) as usize;
                    acc.max((z - data[[nr, nc]]).abs() / dist)
                });
            }
            out
        })
        .collect();

    let mut magnitude = dem.with_same_meta::<f64>(rows, cols);
    *magnitude.data_mut() =
        Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))?;
    Ok(magnitude)
}

/// Directional ratio fields with diagonal contributions damped by `alpha`
pub fn directional_ratios(dem: &Raster<f64>, alpha: f64) -> Result<DirectionalRatios> {
    let (rows, cols) = dem.shape();
    let data = dem.data();

    let pairs: Vec<(f64, f64)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = vec![(0.0, 0.0); cols];
            if row == 0 || row + 1 >= rows {
                return out;
            }
            for (col, cell) in out.iter_mut().enumerate().take(cols.saturating_sub(1)).skip(1) {
                let z = data[[row, col]];
                let d = |dr: isize, dc: isize| {
                    let nr = (row as isize + dr) as usize;
                    let nc = (col as isize + dc) as usize;
                    (z - data[[nr, nc]]).abs()
                };

                let right = d(0, 1) + alpha * (d(-1, 1) + d(1, 1));
                let left = d(0, -1) + alpha * (d(-1, -1) + d(1, -1));
                let down = d(1, 0) + alpha * (d(1, -1) + d(1, 1));
                let up = d(-1, 0) + alpha * (d(-1, -1) + d(-1, 1));

                *cell = (
                    right / (left + right + RATIO_EPSILON),
                    down / (up + down + RATIO_EPSILON),
                );
            }
            out
        })
        .collect();

    let (h, v): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
    Ok(DirectionalRatios {
        horizontal: Array2::from_shape_vec((rows, cols), h).map_err(|e| Error::Other(e.to_string()))?,
        vertical: Array2::from_shape_vec((rows, cols), v).map_err(|e| Error::Other(e.to_string()))?,
    })
}
