//! Gaussian smoothing
//!
//! Separable isotropic Gaussian filter. The kernel is truncated at 4σ and the
//! grid is mirror-reflected at its borders (`d c b a | a b c d | d c b a`), so
//! every output cell sees a full, normalized kernel.

use crate::maybe_rayon::*;
use escarp_core::raster::Raster;
use escarp_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Kernel half-width in standard deviations
const TRUNCATE: f64 = 4.0;

/// Parameters for Gaussian smoothing
#[derive(Debug, Clone)]
pub struct GaussianSmoothParams {
    /// Standard deviation in cell units; 0 leaves the grid untouched
    pub sigma: f64,
}

impl Default for GaussianSmoothParams {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

/// Gaussian smoothing algorithm
#[derive(Debug, Clone, Default)]
pub struct GaussianSmooth;

impl Algorithm for GaussianSmooth {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = GaussianSmoothParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "GaussianSmooth"
    }

    fn description(&self) -> &'static str {
        "Separable Gaussian blur with mirrored borders"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        gaussian_smooth(&input, params.sigma)
    }
}

/// Smooth a DEM with a Gaussian of standard deviation `sigma` (cells).
///
/// The output keeps the input's transform and no-data value.
pub fn gaussian_smooth(dem: &Raster<f64>, sigma: f64) -> Result<Raster<f64>> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(Error::invalid_param("sigma", sigma, "must be finite and >= 0"));
    }
    let data = gaussian_blur(dem.data(), sigma)?;
    Ok(dem.with_data(data))
}

/// Kernel half-width `round(4σ)`; zero for `sigma <= 0`
pub fn gaussian_radius(sigma: f64) -> usize {
    (TRUNCATE * sigma + 0.5) as usize
}

/// Normalized 1D Gaussian kernel of odd length `2 * gaussian_radius(sigma) + 1`
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let half = gaussian_radius(sigma);
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..=2 * half)
        .map(|i| {
            let x = i as f64 - half as f64;
            (-x * x / denom).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Blur a plain array. `sigma <= 0` returns a copy.
pub fn gaussian_blur(data: &Array2<f64>, sigma: f64) -> Result<Array2<f64>> {
    let (rows, cols) = data.dim();
    if sigma <= 0.0 || rows == 0 || cols == 0 {
        return Ok(data.clone());
    }

    let kernel = gaussian_kernel(sigma);
    let half = (kernel.len() / 2) as isize;

    // Row pass
    let row_pass: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = vec![0.0; cols];
            for (col, cell) in out.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (ki, &kw) in kernel.iter().enumerate() {
                    let c = reflect(col as isize + ki as isize - half, cols);
                    sum += kw * data[[row, c]];
                }
                *cell = sum;
            }
            out
        })
        .collect();
    let row_arr =
        Array2::from_shape_vec((rows, cols), row_pass).map_err(|e| Error::Other(e.to_string()))?;

    // Column pass
    let col_pass: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = vec![0.0; cols];
            for (col, cell) in out.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (ki, &kw) in kernel.iter().enumerate() {
                    let r = reflect(row as isize + ki as isize - half, rows);
                    sum += kw * row_arr[[r, col]];
                }
                *cell = sum;
            }
            out
        })
        .collect();

    Array2::from_shape_vec((rows, cols), col_pass).map_err(|e| Error::Other(e.to_string()))
}

/// Mirror an out-of-range index back into `0..n`
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m >= n {
        (period - 1 - m) as usize
    } else {
        m as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bumpy_dem(rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                let noise = if (r * 7 + c * 13) % 5 == 0 { 3.0 } else { -1.0 };
                dem.set(r, c, 100.0 + c as f64 + noise).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_kernel_normalized_and_symmetric() {
        let k = gaussian_kernel(1.0);
        assert_eq!(k.len(), 9);
        assert_relative_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for i in 0..k.len() / 2 {
            assert_relative_eq!(k[i], k[k.len() - 1 - i], epsilon = 1e-15);
        }
        assert!(k[4] > k[3]);
    }

    #[test]
    fn test_reflect_indices() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(6, 5), 3);
        assert_eq!(reflect(-3, 1), 0);
        assert_eq!(reflect(2, 2), 1);
    }

    #[test]
    fn test_preserves_flat() {
        let dem = Raster::filled(12, 9, 250.0);
        let out = gaussian_smooth(&dem, 1.0).unwrap();
        for &v in out.data().iter() {
            assert_relative_eq!(v, 250.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reduces_noise() {
        let dem = bumpy_dem(20, 20);
        let out = gaussian_smooth(&dem, 1.0).unwrap();

        let roughness = |r: &Raster<f64>| -> f64 {
            let d = r.data();
            let mut acc = 0.0;
            for row in 1..19 {
                for col in 1..19 {
                    acc += (d[[row, col]] - 0.5 * (d[[row, col - 1]] + d[[row, col + 1]])).abs();
                }
            }
            acc
        };
        assert!(roughness(&out) < roughness(&dem) * 0.5);
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let dem = bumpy_dem(6, 7);
        let out = gaussian_smooth(&dem, 0.0).unwrap();
        assert_eq!(out.data(), dem.data());
    }

    #[test]
    fn test_output_within_input_range() {
        let dem = bumpy_dem(10, 10);
        let out = gaussian_smooth(&dem, 2.0).unwrap();
        let stats_in = dem.statistics();
        let stats_out = out.statistics();
        assert!(stats_out.min.unwrap() >= stats_in.min.unwrap());
        assert!(stats_out.max.unwrap() <= stats_in.max.unwrap());
    }

    #[test]
    fn test_rejects_negative_sigma() {
        let dem = Raster::filled(3, 3, 1.0);
        assert!(gaussian_smooth(&dem, -1.0).is_err());
        assert!(gaussian_smooth(&dem, f64::NAN).is_err());
    }
}
