//! Cliff-aware upsampling
//!
//! The pipeline, leaf first:
//!
//! 1. [`GradientField`]: maximum 8-neighbour elevation difference per cell
//! 2. [`CliffMask`] and [`extract_cliff_lines`]: threshold, trace external
//!    contours, split them into elevation-coherent [`CliffLine`]s
//! 3. [`fit_parametric_curve`]: arc-length parametrized smoothing spline
//! 4. [`build_transects`]: perpendicular probes along the smoothed curve
//! 5. Discontinuity injection on top of the bicubic baseline, either
//!    [`InjectionStrategy::Additive`] or [`InjectionStrategy::Subtractive`]
//!
//! [`cliff_aware_upsample`] runs everything and falls back to the plain
//! baseline whenever a stage after input validation fails.

mod additive;
mod curve;
mod diagnostics;
mod gradient;
mod lines;
mod params;
mod pipeline;
mod region;
mod subtractive;
mod transect;

pub use additive::{line_influence, rasterize_curve, sample_sides, InfluenceProfile, LineInfluence, SideSample};
pub use curve::{fit_parametric_curve, ParametricCurve, MIN_CURVE_POINTS};
pub use diagnostics::{Diagnostics, DroppedLines, FallbackReason};
pub use gradient::{directional_ratios, gradient_magnitude, DirectionalRatios, GradientField};
pub use lines::{extract_cliff_lines, refine_subpixel, trace_external_contours, CliffLine, CliffMask};
pub use params::{CliffParams, InjectionStrategy, MAX_SEGMENT_LENGTH, MAX_UPSCALE_FACTOR};
pub use pipeline::{cliff_aware_upsample, CliffAwareOutput, CliffAwareUpsample};
pub use region::{assign_regions, region_palette, RegionAssignment, TransectId};
pub use subtractive::{excise_bands, segment_cells, transform_percentage, ExcisionResult};
pub use transect::{band_index, build_transects, unit_tangents, Transect};

use escarp_core::Error;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};
use thiserror::Error;

/// A 2D point in pixel coordinates: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self - other).length()
    }

    pub fn distance_sq(self, other: Point) -> f64 {
        let d = self - other;
        d.x * d.x + d.y * d.y
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Rotate 90° counter-clockwise in the (x, y) plane
    pub fn perpendicular(self) -> Point {
        Point::new(-self.y, self.x)
    }

    /// Integer cell `(row, col)` by truncation toward zero, if inside a
    /// `rows x cols` grid
    pub fn cell(self, rows: usize, cols: usize) -> Option<(usize, usize)> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return None;
        }
        let col = self.x as isize;
        let row = self.y as isize;
        (row >= 0 && col >= 0 && (row as usize) < rows && (col as usize) < cols)
            .then(|| (row as usize, col as usize))
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Failures of a single curve fit. The affected line is dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    #[error("need at least {required} distinct points, found {found}")]
    InsufficientPoints { found: usize, required: usize },

    #[error("curve has zero arc length")]
    DegenerateCurve,

    #[error("smoothing system is not positive definite (pivot {pivot})")]
    SingularFit { pivot: usize },
}

/// Failures inside the cliff stages. None of these reach the caller of
/// [`cliff_aware_upsample`]; they select the baseline-only result instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no cliff line survived detection and fitting")]
    EmptyCliffSet,

    #[error("sample ({x:.2}, {y:.2}) lies outside the {rows}x{cols} grid")]
    OutOfBounds { x: f64, y: f64, rows: usize, cols: usize },

    #[error("curve fit failed: {0}")]
    Curve(#[from] CurveError),

    #[error(transparent)]
    Core(#[from] Error),
}

/// Elevation of the cell under `p` (truncated coordinates)
pub(crate) fn sample_at(grid: &ndarray::Array2<f64>, p: Point) -> Result<f64, PipelineError> {
    let (rows, cols) = grid.dim();
    p.cell(rows, cols)
        .map(|(r, c)| grid[[r, c]])
        .ok_or(PipelineError::OutOfBounds {
            x: p.x,
            y: p.y,
            rows,
            cols,
        })
}
