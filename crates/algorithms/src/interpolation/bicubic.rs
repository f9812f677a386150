//! Bicubic baseline surface
//!
//! A tensor-product interpolating cubic spline over the native cell grid,
//! with not-a-knot end conditions, evaluated at `n * factor` evenly spaced
//! positions spanning `[0, n - 1]` along each axis. Rows are resampled first,
//! then columns. Constant input stays exactly constant.

use crate::maybe_rayon::*;
use escarp_core::raster::Raster;
use escarp_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Bicubic upsampling algorithm; the parameter is the upscale factor
#[derive(Debug, Clone, Default)]
pub struct BicubicUpsample;

impl Algorithm for BicubicUpsample {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = usize;
    type Error = Error;

    fn name(&self) -> &'static str {
        "BicubicUpsample"
    }

    fn description(&self) -> &'static str {
        "Smooth bicubic spline resampling to a finer grid"
    }

    fn execute(&self, input: Self::Input, factor: Self::Params) -> Result<Self::Output> {
        bicubic_upsample(&input, factor)
    }
}

/// Resample `grid` to `rows * factor` x `cols * factor`.
///
/// The output transform covers the input footprint with cells `factor` times
/// smaller.
pub fn bicubic_upsample(grid: &Raster<f64>, factor: usize) -> Result<Raster<f64>> {
    if factor == 0 {
        return Err(Error::invalid_param("factor", 0, "must be at least 1"));
    }
    let (rows, cols) = grid.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { width: cols, height: rows });
    }

    let xs = upsample_positions(cols, factor);
    let ys = upsample_positions(rows, factor);

    let along_rows = resample_rows(grid.data(), &xs)?;
    let along_cols = resample_rows(&along_rows.t().to_owned(), &ys)?;
    let data = along_cols.reversed_axes().as_standard_layout().into_owned();

    let mut out = Raster::from_array(data);
    out.set_transform(grid.transform().upscaled(factor));
    Ok(out)
}

/// `n * factor` evenly spaced positions from 0 to `n - 1` inclusive
pub fn upsample_positions(n: usize, factor: usize) -> Vec<f64> {
    let count = n * factor;
    if count <= 1 || n <= 1 {
        return vec![0.0; count];
    }
    let last = (n - 1) as f64;
    let step = last / (count - 1) as f64;
    let mut pos: Vec<f64> = (0..count).map(|k| k as f64 * step).collect();
    pos[count - 1] = last;
    pos
}

/// Spline-resample every row of `data` at `positions`
fn resample_rows(data: &Array2<f64>, positions: &[f64]) -> Result<Array2<f64>> {
    let rows = data.nrows();
    let width = positions.len();

    let out: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let values: Vec<f64> = data.row(row).to_vec();
            let second = not_a_knot_second_derivatives(&values);
            positions
                .iter()
                .map(|&p| evaluate(&values, &second, p))
                .collect::<Vec<f64>>()
        })
        .collect();

    Array2::from_shape_vec((rows, width), out).map_err(|e| Error::Other(e.to_string()))
}

/// Second derivatives of the not-a-knot interpolating cubic through
/// `y` at unit spacing
fn not_a_knot_second_derivatives(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    match n {
        0..=2 => return vec![0.0; n],
        3 => return vec![y[0] - 2.0 * y[1] + y[2]; 3],
        _ => {}
    }

    let rhs = |i: usize| 6.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1]);
    let mut m = vec![0.0; n];

    // Not-a-knot folds the first and last interior equations to 6 M = rhs
    m[1] = rhs(1) / 6.0;
    m[n - 2] = rhs(n - 2) / 6.0;

    // Remaining interior unknowns M[2..n-2]: M[i-1] + 4 M[i] + M[i+1] = rhs(i)
    let inner = n.saturating_sub(4);
    if inner > 0 {
        let mut c_prime = vec![0.0; inner];
        let mut d_prime = vec![0.0; inner];
        for k in 0..inner {
            let i = k + 2;
            let mut d = rhs(i);
            if k == 0 {
                d -= m[1];
            }
            if k == inner - 1 {
                d -= m[n - 2];
            }
            let (c_prev, d_prev) = if k == 0 { (0.0, 0.0) } else { (c_prime[k - 1], d_prime[k - 1]) };
            let denom = 4.0 - c_prev;
            c_prime[k] = 1.0 / denom;
            d_prime[k] = (d - d_prev) / denom;
        }
        for k in (0..inner).rev() {
            let next = if k + 1 < inner { m[k + 3] } else { 0.0 };
            m[k + 2] = d_prime[k] - c_prime[k] * next;
        }
    }

    m[0] = 2.0 * m[1] - m[2];
    m[n - 1] = 2.0 * m[n - 2] - m[n - 3];
    m
}

fn evaluate(y: &[f64], m: &[f64], p: f64) -> f64 {
    let n = y.len();
    if n == 1 {
        return y[0];
    }
    let i = (p.floor().max(0.0) as usize).min(n - 2);
    let dx = p - i as f64;
    let b = (y[i + 1] - y[i]) - (2.0 * m[i] + m[i + 1]) / 6.0;
    let c = m[i] / 2.0;
    let d = (m[i + 1] - m[i]) / 6.0;
    y[i] + dx * (b + dx * (c + dx * d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use escarp_core::GeoTransform;

    #[test]
    fn test_positions_span_grid() {
        let p = upsample_positions(5, 4);
        assert_eq!(p.len(), 20);
        assert_eq!(p[0], 0.0);
        assert_eq!(p[19], 4.0);
        assert!(p.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(upsample_positions(1, 3), vec![0.0; 3]);
    }

    #[test]
    fn test_spline_reproduces_cubic() {
        // Not-a-knot reproduces any cubic exactly
        let f = |x: f64| 0.5 * x * x * x - 2.0 * x * x + x + 3.0;
        let y: Vec<f64> = (0..7).map(|i| f(i as f64)).collect();
        let m = not_a_knot_second_derivatives(&y);
        for k in 0..=60 {
            let x = k as f64 * 0.1;
            assert_relative_eq!(evaluate(&y, &m, x), f(x), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_short_inputs() {
        let parabola = [1.0, 0.0, 1.0];
        let m = not_a_knot_second_derivatives(&parabola);
        assert_relative_eq!(evaluate(&parabola, &m, 0.5), 0.25, epsilon = 1e-12);

        let line = [2.0, 4.0];
        let m = not_a_knot_second_derivatives(&line);
        assert_relative_eq!(evaluate(&line, &m, 0.25), 2.5, epsilon = 1e-12);

        assert_eq!(evaluate(&[7.0], &[0.0], 0.0), 7.0);
    }

    #[test]
    fn test_interpolates_knots() {
        let y = [3.0, -1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let m = not_a_knot_second_derivatives(&y);
        for (i, &v) in y.iter().enumerate() {
            assert_relative_eq!(evaluate(&y, &m, i as f64), v, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_upsample_dims_and_transform() {
        let mut dem = Raster::filled(6, 9, 42.0);
        dem.set_transform(GeoTransform::new(10.0, 20.0, 8.0, -8.0));
        let out = bicubic_upsample(&dem, 4).unwrap();
        assert_eq!(out.shape(), (24, 36));
        assert_eq!(out.transform().pixel_width, 2.0);
        assert_eq!(out.transform().origin_x, 10.0);
        assert!(out.data().iter().all(|&v| v == 42.0));
    }

    #[test]
    fn test_upsample_plane_is_exact() {
        let mut dem = Raster::new(5, 6);
        for r in 0..5 {
            for c in 0..6 {
                dem.set(r, c, 2.0 * r as f64 - 3.0 * c as f64).unwrap();
            }
        }
        let out = bicubic_upsample(&dem, 3).unwrap();
        let xs = upsample_positions(6, 3);
        let ys = upsample_positions(5, 3);
        for (r, &y) in ys.iter().enumerate() {
            for (c, &x) in xs.iter().enumerate() {
                assert_relative_eq!(out.get(r, c).unwrap(), 2.0 * y - 3.0 * x, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_factor_one_keeps_values() {
        let dem = Raster::from_vec((0..12).map(|v| (v * v) as f64).collect(), 3, 4).unwrap();
        let out = bicubic_upsample(&dem, 1).unwrap();
        for (a, b) in out.data().iter().zip(dem.data().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
        assert!(bicubic_upsample(&dem, 0).is_err());
    }
}
