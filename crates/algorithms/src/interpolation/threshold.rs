//! Threshold-switched fast resampler
//!
//! Bilinear interpolation, except where the four surrounding source cells
//! span more than `threshold` in elevation: there the nearest source cell is
//! copied, which keeps steps sharp without fitting any cliff geometry.

use crate::cliff::MAX_UPSCALE_FACTOR;
use crate::maybe_rayon::*;
use escarp_core::raster::Raster;
use escarp_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Parameters for [`threshold_resample`]
#[derive(Debug, Clone)]
pub struct ThresholdResampleParams {
    /// Output cells per input cell along each axis (default 8)
    pub factor: usize,
    /// Local elevation range above which nearest-neighbour is used (default 50.0)
    pub threshold: f64,
}

impl Default for ThresholdResampleParams {
    fn default() -> Self {
        Self {
            factor: 8,
            threshold: 50.0,
        }
    }
}

/// Threshold-switched resampling algorithm
#[derive(Debug, Clone, Default)]
pub struct ThresholdResample;

impl Algorithm for ThresholdResample {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ThresholdResampleParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ThresholdResample"
    }

    fn description(&self) -> &'static str {
        "Bilinear resampling that switches to nearest-neighbour across steep cells"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        threshold_resample(&input, params.factor, params.threshold)
    }
}

/// Resample `grid` by `factor`.
///
/// Output cell `(r, c)` maps back to source position `(c / factor, r / factor)`.
pub fn threshold_resample(grid: &Raster<f64>, factor: usize, threshold: f64) -> Result<Raster<f64>> {
    if factor == 0 || factor > MAX_UPSCALE_FACTOR {
        return Err(Error::invalid_param(
            "factor",
            factor,
            format!("must lie in 1..={MAX_UPSCALE_FACTOR}"),
        ));
    }
    if threshold.is_nan() {
        return Err(Error::invalid_param("threshold", threshold, "must not be NaN"));
    }
    let (rows, cols) = grid.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { width: cols, height: rows });
    }

    let data = grid.data();
    let f = factor as f64;
    let (out_rows, out_cols) = (rows * factor, cols * factor);

    let output: Vec<f64> = (0..out_rows)
        .into_par_iter()
        .flat_map(|r| {
            let sy = r as f64 / f;
            let y0 = (sy.floor() as usize).min(rows - 1);
            let y1 = (y0 + 1).min(rows - 1);
            let ty = sy - y0 as f64;

            (0..out_cols)
                .map(|c| {
                    let sx = c as f64 / f;
                    let x0 = (sx.floor() as usize).min(cols - 1);
                    let x1 = (x0 + 1).min(cols - 1);
                    let tx = sx - x0 as f64;

                    let v00 = data[[y0, x0]];
                    let v10 = data[[y0, x1]];
                    let v01 = data[[y1, x0]];
                    let v11 = data[[y1, x1]];
                    let hi = v00.max(v10).max(v01).max(v11);
                    let lo = v00.min(v10).min(v01).min(v11);

                    if hi - lo > threshold {
                        let nr = (sy.round() as usize).min(rows - 1);
                        let nc = (sx.round() as usize).min(cols - 1);
                        data[[nr, nc]]
                    } else {
                        let top = v00 * (1.0 - tx) + v10 * tx;
                        let bottom = v01 * (1.0 - tx) + v11 * tx;
                        top * (1.0 - ty) + bottom * ty
                    }
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    let mut out = Raster::from_array(
        Array2::from_shape_vec((out_rows, out_cols), output).map_err(|e| Error::Other(e.to_string()))?,
    );
    out.set_transform(grid.transform().upscaled(factor));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gentle_slope_is_bilinear() {
        let dem = Raster::from_vec(vec![0.0, 1.0, 2.0, 3.0], 2, 2).unwrap();
        let out = threshold_resample(&dem, 2, 10.0).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_relative_eq!(out.get(0, 1).unwrap(), 0.5);
        assert_relative_eq!(out.get(1, 1).unwrap(), 1.5);
        // Clamped at the last row and column
        assert_relative_eq!(out.get(3, 3).unwrap(), 3.0);
    }

    #[test]
    fn test_steep_cell_uses_nearest() {
        let dem = Raster::from_vec(vec![0.0, 100.0, 0.0, 100.0], 2, 2).unwrap();
        let out = threshold_resample(&dem, 4, 50.0).unwrap();
        assert_eq!(out.get(0, 1).unwrap(), 0.0);
        // 2/4 = 0.5 rounds away from zero to column 1
        assert_eq!(out.get(0, 2).unwrap(), 100.0);
        assert!(out.data().iter().all(|&v| v == 0.0 || v == 100.0));
    }

    #[test]
    fn test_rejects_out_of_range_factor() {
        let dem = Raster::filled(2, 2, 1.0);
        assert!(threshold_resample(&dem, 0, 1.0).is_err());
        assert!(threshold_resample(&dem, MAX_UPSCALE_FACTOR + 1, 1.0).is_err());
    }
}
