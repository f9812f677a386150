//! Affine pixel-to-map transform

use serde::{Deserialize, Serialize};

/// Affine coefficients mapping pixel coordinates (col, row) to map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// The cliff pipeline itself never looks at map coordinates. The transform is
/// carried along so that windowed and upsampled outputs stay georeferenced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Map coordinates of a (fractional) pixel position; `(0, 0)` is the
    /// upper-left corner of the first cell
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Convert map coordinates to fractional pixel coordinates (col, row).
    ///
    /// Use `.floor()` to get integer indices. Returns NaN for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;

        if det.abs() < 1e-15 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Transform of a sub-window starting at pixel (col, row)
    pub fn translated(&self, col: f64, row: f64) -> Self {
        let (origin_x, origin_y) = self.apply(col, row);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    /// Transform of the same footprint sampled `factor` times more densely
    pub fn upscaled(&self, factor: usize) -> Self {
        let f = factor.max(1) as f64;
        Self {
            pixel_width: self.pixel_width / f,
            pixel_height: self.pixel_height / f,
            row_rotation: self.row_rotation / f,
            col_rotation: self.col_rotation / f,
            ..*self
        }
    }

    /// Get the cell size (assumes square pixels and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_apply_geo_to_pixel_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.apply(5.5, 10.5);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_upscaled_keeps_footprint() {
        let gt = GeoTransform::new(-4.0, 56.2, 0.001, -0.0005);
        let up = gt.upscaled(8);

        let (x0, y0) = gt.apply(10.0, 20.0);
        let (x1, y1) = up.apply(80.0, 160.0);
        assert_relative_eq!(x0, x1, epsilon = 1e-12);
        assert_relative_eq!(y0, y1, epsilon = 1e-12);
    }

    #[test]
    fn test_translated_origin() {
        let gt = GeoTransform::new(0.0, 100.0, 2.0, -2.0);
        let t = gt.translated(3.0, 4.0);
        assert_relative_eq!(t.origin_x, 6.0);
        assert_relative_eq!(t.origin_y, 92.0);
        assert_relative_eq!(t.pixel_width, 2.0);
    }
}
