//! Additive discontinuity injection
//!
//! Each cliff line is probed on both sides at `sample_distance` along its
//! normals. Every output-resolution point of the fitted curve then takes the
//! nearest recorded probe (over all lines) and stamps an elevation-step
//! profile along that probe's normal. Each line's stamps are blurred on their
//! own inside a window around the line, then added onto the baseline in line
//! order.

use super::pipeline::{dense_curve, Injection, InjectionContext};
use super::transect::{build_transects, Transect};
use super::{sample_at, CliffParams, Point, PipelineError};
use crate::interpolation::KdTree;
use crate::maybe_rayon::*;
use crate::terrain::{gaussian_blur, gaussian_radius};
use escarp_core::Result;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

const MIN_HALF_WIDTH_DIFF: f64 = 5.0;
const MAX_HALF_WIDTH_DIFF: f64 = 30.0;
/// Lines whose influence windows are built concurrently before being summed
const LINE_CHUNK: usize = 8;

/// Elevations probed on both sides of a cliff line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideSample {
    /// Probe origin on the cliff line (input pixels)
    pub anchor: Point,
    /// Unit normal; the positive probe lies at `anchor + normal * distance`
    pub normal: Point,
    pub positive: f64,
    pub negative: f64,
    /// `positive - negative`
    pub difference: f64,
}

/// Shape of the stamped elevation-step profile
#[derive(Debug, Clone, Copy)]
pub struct InfluenceProfile {
    pub upscale_factor: usize,
    pub cliff_width_percent: f64,
    pub side_percent: f64,
    pub smoothing_sigma: f64,
}

impl From<&CliffParams> for InfluenceProfile {
    fn from(params: &CliffParams) -> Self {
        Self {
            upscale_factor: params.upscale_factor,
            cliff_width_percent: params.cliff_width_percent,
            side_percent: params.side_percent,
            smoothing_sigma: params.smoothing_sigma,
        }
    }
}

impl InfluenceProfile {
    /// Stamp half-width in output pixels: `clamp(|difference|, 5, 30) * factor / 2`
    pub fn half_width(&self, difference: f64) -> isize {
        let d = difference.abs().clamp(MIN_HALF_WIDTH_DIFF, MAX_HALF_WIDTH_DIFF);
        (d * self.upscale_factor as f64 / 2.0) as isize
    }

    /// Share of the elevation difference applied at normalized offset `nd ∈ [-1, 1]`.
    ///
    /// Ramps 0 → 1 across the cliff face `|nd| < cliff_width_percent / 2`,
    /// then keeps the same sign of slope over the sides at `1 / side_percent`.
    pub fn ramp(&self, nd: f64) -> f64 {
        let half_face = self.cliff_width_percent / 2.0;
        if nd.abs() < half_face {
            (nd + half_face) / self.cliff_width_percent
        } else if nd < 0.0 {
            (nd + half_face) / self.side_percent
        } else {
            (nd - half_face) / self.side_percent + 1.0
        }
    }
}

/// Probe both sides of every transect.
///
/// A probe pair is kept when both cells are inside the grid and their
/// elevations differ by at least `min_difference`. Returns the kept samples
/// and the number of pairs rejected for leaving the grid.
pub fn sample_sides(
    elevation: &Array2<f64>,
    transects: &[Transect],
    sample_distance: f64,
    min_difference: f64,
) -> (Vec<SideSample>, usize) {
    let mut samples = Vec::new();
    let mut out_of_bounds = 0;

    for t in transects {
        let pos = sample_at(elevation, t.center + t.normal * sample_distance);
        let neg = sample_at(elevation, t.center - t.normal * sample_distance);
        let (positive, negative) = match (pos, neg) {
            (Ok(p), Ok(n)) => (p, n),
            _ => {
                out_of_bounds += 1;
                continue;
            }
        };

        let difference = positive - negative;
        if difference.abs() >= min_difference {
            samples.push(SideSample {
                anchor: t.center,
                normal: t.normal,
                positive,
                negative,
                difference,
            });
        }
    }

    (samples, out_of_bounds)
}

/// Round output-resolution curve points to cells, dropping those outside a
/// `rows x cols` grid
pub fn rasterize_curve(points: &[Point], rows: usize, cols: usize) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point::new(p.x.round(), p.y.round()))
        .filter(|p| p.x >= 0.0 && p.y >= 0.0 && p.x < cols as f64 && p.y < rows as f64)
        .collect()
}

/// Blurred influence of one line, held only over the window it touches.
///
/// The window is the bounding box of the stamped cells grown by the blur
/// radius and clipped to the grid. Everything outside it is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LineInfluence {
    pub row0: usize,
    pub col0: usize,
    pub data: Array2<f64>,
}

impl LineInfluence {
    fn empty() -> Self {
        Self {
            row0: 0,
            col0: 0,
            data: Array2::zeros((0, 0)),
        }
    }

    /// Influence at a grid cell
    pub fn value(&self, row: usize, col: usize) -> f64 {
        row.checked_sub(self.row0)
            .zip(col.checked_sub(self.col0))
            .and_then(|(r, c)| self.data.get((r, c)).copied())
            .unwrap_or(0.0)
    }

    /// Add the window into `grid` at its offset
    pub fn add_to(&self, grid: &mut Array2<f64>) {
        let (h, w) = self.data.dim();
        let mut target = grid.slice_mut(s![self.row0..self.row0 + h, self.col0..self.col0 + w]);
        target += &self.data;
    }
}

/// Influence of one line on a grid of `shape`.
///
/// `index` holds the anchors of `samples` in input-pixel coordinates.
pub fn line_influence(
    shape: (usize, usize),
    curve_cells: &[Point],
    samples: &[SideSample],
    index: &KdTree,
    profile: &InfluenceProfile,
) -> Result<LineInfluence> {
    let (rows, cols) = shape;
    let f = profile.upscale_factor as f64;
    let mut stamps: Vec<(usize, usize, f64)> = Vec::new();

    for &p in curve_cells {
        let Some(hit) = index.nearest(p.x / f, p.y / f) else {
            continue;
        };
        let sample = &samples[hit.index];
        let half = profile.half_width(sample.difference);
        if half <= 0 {
            continue;
        }

        for dist in -half..=half {
            let d = dist as f64;
            let Some((r, c)) = (p + sample.normal * d).cell(rows, cols) else {
                continue;
            };
            let nd = d / half as f64;
            let weight = (1.0 - nd.abs()).powi(2);
            stamps.push((r, c, sample.difference * profile.ramp(nd) * weight));
        }
    }

    let Some(&(r, c, _)) = stamps.first() else {
        return Ok(LineInfluence::empty());
    };
    let (mut r_min, mut r_max, mut c_min, mut c_max) = (r, r, c, c);
    for &(r, c, _) in &stamps {
        r_min = r_min.min(r);
        r_max = r_max.max(r);
        c_min = c_min.min(c);
        c_max = c_max.max(c);
    }

    let margin = gaussian_radius(profile.smoothing_sigma);
    let row0 = r_min.saturating_sub(margin);
    let col0 = c_min.saturating_sub(margin);
    let row1 = (r_max + margin + 1).min(rows);
    let col1 = (c_max + margin + 1).min(cols);

    let mut window = Array2::zeros((row1 - row0, col1 - col0));
    for (r, c, v) in stamps {
        window[[r - row0, c - col0]] += v;
    }

    Ok(LineInfluence {
        row0,
        col0,
        data: gaussian_blur(&window, profile.smoothing_sigma)?,
    })
}

/// Per-line probe results
struct LineProbe {
    line: usize,
    cells: Vec<Point>,
    transects: Vec<Transect>,
    samples: Vec<SideSample>,
    out_of_bounds: usize,
}

pub(crate) fn inject(ctx: &InjectionContext<'_>) -> std::result::Result<Injection, PipelineError> {
    let params = ctx.params;
    let (rows, cols) = ctx.baseline.shape();
    let f = params.upscale_factor as f64;

    let probes: Vec<LineProbe> = (0..ctx.fitted.len())
        .into_par_iter()
        .map(|k| {
            let fitted = &ctx.fitted[k];
            let line = &ctx.lines[fitted.line];
            let cells = rasterize_curve(&dense_curve(&fitted.curve, line.len(), params), rows, cols);
            let transects = build_transects(&line.points, params.segment_length / f, 1);
            let (samples, out_of_bounds) = sample_sides(
                ctx.working,
                &transects,
                params.sample_distance,
                0.5 * params.cliff_threshold,
            );
            LineProbe {
                line: fitted.line,
                cells,
                transects,
                samples,
                out_of_bounds,
            }
        })
        .collect();

    let mut injection = Injection::baseline_only(ctx.baseline, ctx.lines.len());
    for probe in &probes {
        injection.transects[probe.line] = probe.transects.clone();
        injection.out_of_bounds += probe.out_of_bounds;
    }

    // Lines whose curve falls off the grid or that recorded no probe add nothing
    let active: Vec<&LineProbe> = probes
        .iter()
        .filter(|p| p.cells.len() >= 2 && !p.samples.is_empty())
        .collect();
    let samples: Vec<SideSample> = active.iter().flat_map(|p| p.samples.iter().copied()).collect();
    debug!(lines = active.len(), samples = samples.len(), "additive side samples");
    if samples.is_empty() {
        return Ok(injection);
    }

    let index = KdTree::build(samples.iter().map(|s| (s.anchor.x, s.anchor.y)));
    let profile = InfluenceProfile::from(params);

    // Influences are folded in line order, a chunk at a time
    let mut grid = ctx.baseline.data().clone();
    for chunk in active.chunks(LINE_CHUNK) {
        let influences: Vec<LineInfluence> = (0..chunk.len())
            .into_par_iter()
            .map(|k| line_influence((rows, cols), &chunk[k].cells, &samples, &index, &profile))
            .collect::<Result<Vec<_>>>()?;
        for influence in &influences {
            influence.add_to(&mut grid);
        }
    }
    injection.grid = ctx.baseline.with_data(grid);
    injection.side_samples = samples;
    Ok(injection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn profile(factor: usize, sigma: f64) -> InfluenceProfile {
        InfluenceProfile {
            upscale_factor: factor,
            cliff_width_percent: 0.2,
            side_percent: 0.4,
            smoothing_sigma: sigma,
        }
    }

    #[test]
    fn test_ramp_profile() {
        let p = profile(8, 1.0);
        assert_relative_eq!(p.ramp(-0.1), 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.ramp(0.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(p.ramp(0.1), 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.ramp(-1.0), -2.25, epsilon = 1e-12);
        assert_relative_eq!(p.ramp(1.0), 3.25, epsilon = 1e-12);
    }

    #[test]
    fn test_half_width_clamped() {
        let p = profile(8, 1.0);
        assert_eq!(p.half_width(3.0), 20);
        assert_eq!(p.half_width(-100.0), 120);
        assert_eq!(p.half_width(12.5), 50);
    }

    #[test]
    fn test_sample_sides_on_step() {
        let elevation = Array2::from_shape_fn((20, 20), |(_, c)| if c >= 10 { 20.0 } else { 0.0 });
        let line: Vec<Point> = (2..18).map(|r| Point::new(9.0, r as f64)).collect();
        let transects = build_transects(&line, 5.0, 1);
        let (samples, oob) = sample_sides(&elevation, &transects, 5.0, 6.0);

        assert_eq!(oob, 0);
        assert_eq!(samples.len(), line.len());
        // Walking down the column the normal points to -x, onto the low side
        assert_relative_eq!(samples[0].difference, -20.0);
        assert_relative_eq!(samples[0].positive, 0.0);

        // A weak step is filtered out
        let (weak, _) = sample_sides(&(elevation.clone() * 0.1), &transects, 5.0, 6.0);
        assert!(weak.is_empty());

        // Probes off the grid are counted, not recorded
        let edge: Vec<Point> = (2..18).map(|r| Point::new(1.0, r as f64)).collect();
        let (none, oob) = sample_sides(&elevation, &build_transects(&edge, 5.0, 1), 5.0, 6.0);
        assert!(none.is_empty());
        assert_eq!(oob, edge.len());
    }

    #[test]
    fn test_rasterize_curve_drops_outside() {
        let pts = vec![Point::new(-0.6, 0.0), Point::new(0.4, 1.6), Point::new(9.5, 2.0), Point::new(3.0, 4.49)];
        let cells = rasterize_curve(&pts, 5, 10);
        assert_eq!(cells, vec![Point::new(0.0, 2.0), Point::new(3.0, 4.0)]);
    }

    #[test]
    fn test_line_influence_profile_values() {
        let sample = SideSample {
            anchor: Point::new(10.0, 0.0),
            normal: Point::new(1.0, 0.0),
            positive: 10.0,
            negative: 0.0,
            difference: 10.0,
        };
        let index = KdTree::build(vec![(10.0, 0.0)]);
        let map = line_influence((1, 41), &[Point::new(20.0, 0.0)], &[sample], &index, &profile(2, 0.0)).unwrap();

        assert_relative_eq!(map.value(0, 20), 5.0, epsilon = 1e-12);
        assert_relative_eq!(map.value(0, 25), 5.0, epsilon = 1e-12);
        assert_relative_eq!(map.value(0, 15), -2.5, epsilon = 1e-12);
        assert_relative_eq!(map.value(0, 30), 0.0, epsilon = 1e-12);
        assert_eq!(map.value(0, 35), 0.0);
        assert_eq!(map.value(0, 5), 0.0);
    }

    #[test]
    fn test_line_influence_blur_spreads() {
        let sample = SideSample {
            anchor: Point::new(5.0, 5.0),
            normal: Point::new(0.0, 1.0),
            positive: 20.0,
            negative: 0.0,
            difference: 20.0,
        };
        let index = KdTree::build(vec![(5.0, 5.0)]);
        let sharp = line_influence((30, 30), &[Point::new(15.0, 15.0)], &[sample], &index, &profile(1, 0.0)).unwrap();
        let blurred = line_influence((30, 30), &[Point::new(15.0, 15.0)], &[sample], &index, &profile(1, 1.0)).unwrap();

        assert_eq!(sharp.value(15, 17), 0.0);
        assert!(blurred.value(15, 17).abs() > 0.0);
        assert_relative_eq!(sharp.data.sum(), blurred.data.sum(), epsilon = 1e-9);
    }

    #[test]
    fn test_windowed_influence_matches_full_grid_blur() {
        let sample = SideSample {
            anchor: Point::new(10.0, 2.0),
            normal: Point::new(0.0, 1.0),
            positive: 20.0,
            negative: 0.0,
            difference: 20.0,
        };
        let index = KdTree::build(vec![(10.0, 2.0)]);
        let curve: Vec<Point> = (5..15).map(|x| Point::new(x as f64, 2.0)).collect();
        let shape = (24, 40);

        let windowed = line_influence(shape, &curve, &[sample], &index, &profile(1, 1.0)).unwrap();
        assert_eq!(windowed.row0, 0);
        assert_eq!(windowed.col0, 1);
        assert_eq!(windowed.data.dim(), (17, 18));

        let sharp = line_influence(shape, &curve, &[sample], &index, &profile(1, 0.0)).unwrap();
        let mut stamped = Array2::zeros(shape);
        sharp.add_to(&mut stamped);
        let reference = gaussian_blur(&stamped, 1.0).unwrap();

        let mut grid = Array2::zeros(shape);
        windowed.add_to(&mut grid);
        for ((r, c), &v) in reference.indexed_iter() {
            assert_relative_eq!(grid[[r, c]], v, epsilon = 1e-12);
            assert_relative_eq!(windowed.value(r, c), v, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_no_stamps_gives_empty_window() {
        let sample = SideSample {
            anchor: Point::new(0.0, 0.0),
            normal: Point::new(1.0, 0.0),
            positive: 1.0,
            negative: 0.0,
            difference: 1.0,
        };
        let index = KdTree::build(vec![(0.0, 0.0)]);
        let influence = line_influence((10, 10), &[], &[sample], &index, &profile(2, 1.0)).unwrap();
        assert!(influence.data.is_empty());

        let mut grid = Array2::from_elem((10, 10), 3.0);
        influence.add_to(&mut grid);
        assert!(grid.iter().all(|&v| v == 3.0));
        assert_eq!(influence.value(4, 4), 0.0);
    }
}
