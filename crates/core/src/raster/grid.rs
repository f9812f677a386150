//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A 2D grid of cell values with optional georeferencing.
///
/// Elevation grids, gradient fields and upsampled outputs are all
/// `Raster<f64>`. Data is row-major, indexed `(row, col)`.
///
/// # Example
///
/// ```
/// use escarp_core::Raster;
///
/// let mut dem: Raster<f64> = Raster::new(4, 6);
/// dem.set(1, 2, 42.0).unwrap();
/// assert_eq!(dem.get(1, 2).unwrap(), 42.0);
/// assert_eq!(dem.shape(), (4, 6));
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Create a zero-filled raster of a possibly different shape and type that
    /// shares this raster's transform
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            nodata: None,
        }
    }

    /// Wrap `data` in a raster carrying this raster's transform and no-data value
    pub fn with_data(&self, data: Array2<T>) -> Self {
        Self {
            data,
            transform: self.transform,
            nodata: self.nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Copy a rectangular window `[row0, row0+rows) x [col0, col0+cols)` into a
    /// new raster whose transform is shifted to the window origin.
    pub fn window(&self, row0: usize, col0: usize, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 || row0 + rows > self.rows() || col0 + cols > self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: row0 + rows,
                col: col0 + cols,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        let data = self
            .data
            .slice(ndarray::s![row0..row0 + rows, col0..col0 + cols])
            .to_owned();
        Ok(Self {
            data,
            transform: self.transform.translated(col0 as f64, row0 as f64),
            nodata: self.nodata,
        })
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Count cells holding no-data
    pub fn nodata_count(&self) -> usize {
        self.data.iter().filter(|&&v| self.is_nodata(v)).count()
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

impl Raster<f64> {
    /// Fail with [`Error::NonFiniteValue`] on the first NaN or infinite cell.
    ///
    /// Input elevation grids have no missing-value semantics, so any
    /// non-finite sample is an input error.
    pub fn ensure_finite(&self) -> Result<()> {
        for ((row, col), &value) in self.data.indexed_iter() {
            if !value.is_finite() {
                return Err(Error::NonFiniteValue { row, col, value });
            }
        }
        Ok(())
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f64> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_from_vec_rejects_bad_length() {
        let result = Raster::from_vec(vec![1.0_f64; 5], 2, 3);
        assert!(matches!(
            result,
            Err(Error::InvalidDimensions { width: 3, height: 2 })
        ));
    }

    #[test]
    fn test_window_shifts_transform() {
        let mut dem: Raster<f64> = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(100.0, 200.0, 2.0, -2.0));
        dem.set(4, 5, 7.0).unwrap();

        let win = dem.window(3, 4, 3, 3).unwrap();
        assert_eq!(win.shape(), (3, 3));
        assert_eq!(win.get(1, 1).unwrap(), 7.0);
        assert_eq!(win.transform().origin_x, 108.0);
        assert_eq!(win.transform().origin_y, 194.0);

        assert!(dem.window(8, 8, 3, 3).is_err());
    }

    #[test]
    fn test_ensure_finite() {
        let mut dem: Raster<f64> = Raster::filled(3, 3, 1.0);
        assert!(dem.ensure_finite().is_ok());
        dem.set(2, 1, f64::NAN).unwrap();
        assert!(matches!(
            dem.ensure_finite(),
            Err(Error::NonFiniteValue { row: 2, col: 1, .. })
        ));
    }

    #[test]
    fn test_statistics_skip_nodata() {
        let mut raster: Raster<f64> = Raster::filled(4, 4, 2.0);
        raster.set_nodata(Some(f64::NAN));
        raster.set(0, 0, f64::NAN).unwrap();
        raster.set(3, 3, 10.0).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(10.0));
        assert_eq!(stats.valid_count, 15);
        assert_eq!(stats.nodata_count, 1);
        assert_eq!(raster.nodata_count(), 1);
    }
}
