//! Subtractive discontinuity injection
//!
//! Transects are rasterized into a band around each dense curve. Band pixels
//! off the curve itself are assigned to their nearest transect, split by side,
//! and the part of each side closest to the transect centre is excised to
//! no-data. How much is excised depends on the transect's band index, so
//! the gap narrows toward the tips of a line.

use super::pipeline::{dense_curve, Injection, InjectionContext};
use super::region::{assign_regions, RegionAssignment};
use super::transect::{build_transects, Transect};
use super::{PipelineError, Point};
use crate::maybe_rayon::*;
use crate::morphology::{dilate_mask, StructuringElement};
use escarp_core::{Raster, Result};
use ndarray::Array2;
use tracing::debug;

/// Share of each side kept, by band index: 0.95 at the tips, 0.1 less per
/// band, never below 0.5
pub fn transform_percentage(band_index: usize) -> f64 {
    if band_index >= 5 {
        0.5
    } else {
        0.95 - 0.1 * band_index as f64
    }
}

/// Output of [`excise_bands`]
#[derive(Debug, Clone)]
pub struct ExcisionResult {
    /// Baseline with excised cells set to the no-data value
    pub grid: Raster<f64>,
    pub excised: usize,
    pub regions: RegionAssignment,
}

/// Cells `(row, col)` stepped from `a` to `b` (endpoints rounded, both included)
pub fn segment_cells(a: Point, b: Point) -> Vec<(isize, isize)> {
    let (r0, c0) = (a.y.round() as isize, a.x.round() as isize);
    let (r1, c1) = (b.y.round() as isize, b.x.round() as isize);
    let dr = r1 - r0;
    let dc = c1 - c0;
    let steps = dr.unsigned_abs().max(dc.unsigned_abs());
    if steps == 0 {
        return vec![(r0, c0)];
    }

    let step_r = dr as f64 / steps as f64;
    let step_c = dc as f64 / steps as f64;
    (0..=steps)
        .map(|s| {
            let s = s as f64;
            (
                (r0 as f64 + step_r * s).round() as isize,
                (c0 as f64 + step_c * s).round() as isize,
            )
        })
        .collect()
}

fn mark(mask: &mut Array2<bool>, cells: impl IntoIterator<Item = (isize, isize)>) {
    let (rows, cols) = mask.dim();
    for (r, c) in cells {
        if r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols {
            mask[[r as usize, c as usize]] = true;
        }
    }
}

/// Excise the near-line part of every transect's region from `baseline`.
///
/// `curves` are the dense output-resolution curves; `transects[line]` are
/// the transects built along `curves`' line of the same index (possibly
/// empty). Excised cells take `nodata`, which also becomes the grid's
/// no-data value when anything was excised.
pub fn excise_bands(
    baseline: &Raster<f64>,
    curves: &[Vec<Point>],
    transects: &[Vec<Transect>],
    nodata: f64,
) -> Result<ExcisionResult> {
    let shape = baseline.shape();

    let mut band = Array2::from_elem(shape, false);
    for t in transects.iter().flatten() {
        mark(&mut band, segment_cells(t.left, t.right));
    }
    let band = dilate_mask(&band, &StructuringElement::Square(1))?;

    let mut line = Array2::from_elem(shape, false);
    for curve in curves {
        if let [only] = curve.as_slice() {
            mark(&mut line, segment_cells(*only, *only));
        }
        for pair in curve.windows(2) {
            mark(&mut line, segment_cells(pair[0], pair[1]));
        }
    }

    let candidates: Vec<(usize, usize)> = band
        .indexed_iter()
        .filter(|&(idx, &in_band)| in_band && !line[idx])
        .map(|(idx, _)| idx)
        .collect();
    let regions = assign_regions(&candidates, transects, shape);

    let mut members: Vec<Vec<Point>> = vec![Vec::new(); regions.region_count()];
    for &((r, c), id) in regions.iter() {
        members[regions.region_of(id)].push(Point::new(c as f64, r as f64));
    }

    let mut excise = Array2::from_elem(shape, false);
    for (t, pixels) in transects.iter().flatten().zip(&members) {
        let keep = transform_percentage(t.band_index);
        for positive in [true, false] {
            let side: Vec<(Point, f64)> = pixels
                .iter()
                .filter(|&&p| ((p - t.center).dot(t.normal) >= 0.0) == positive)
                .map(|&p| (p, p.distance(t.center)))
                .collect();
            let max_distance = side.iter().map(|&(_, d)| d).fold(0.0, f64::max);
            let cutoff = (1.0 - keep) * max_distance;
            for (p, d) in side {
                if d <= cutoff {
                    excise[[p.y as usize, p.x as usize]] = true;
                }
            }
        }
    }

    let mut data = baseline.data().clone();
    let mut excised = 0;
    for (value, &cut) in data.iter_mut().zip(excise.iter()) {
        if cut {
            *value = nodata;
            excised += 1;
        }
    }

    debug!(
        band_pixels = band.iter().filter(|&&b| b).count(),
        candidates = candidates.len(),
        excised,
        "subtractive excision"
    );

    let mut grid = baseline.with_data(data);
    if excised > 0 {
        grid.set_nodata(Some(nodata));
    }
    Ok(ExcisionResult { grid, excised, regions })
}

pub(crate) fn inject(ctx: &InjectionContext<'_>) -> std::result::Result<Injection, PipelineError> {
    let params = ctx.params;

    let per_line: Vec<(usize, Vec<Point>, Vec<Transect>)> = (0..ctx.fitted.len())
        .into_par_iter()
        .map(|k| {
            let fitted = &ctx.fitted[k];
            let dense = dense_curve(&fitted.curve, ctx.lines[fitted.line].len(), params);
            let transects = build_transects(&dense, params.segment_length, params.sample_interval);
            (fitted.line, dense, transects)
        })
        .collect();

    let mut injection = Injection::baseline_only(ctx.baseline, ctx.lines.len());
    let mut curves = Vec::with_capacity(per_line.len());
    for (line, dense, transects) in per_line {
        injection.transects[line] = transects;
        curves.push(dense);
    }

    let result = excise_bands(ctx.baseline, &curves, &injection.transects, params.nodata_value)?;
    injection.grid = result.grid;
    injection.excised = result.excised;
    injection.regions = Some(result.regions);
    Ok(injection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_percentage_schedule() {
        let expected = [0.95, 0.85, 0.75, 0.65, 0.55, 0.5, 0.5, 0.5];
        for (band, want) in expected.iter().enumerate() {
            assert!((transform_percentage(band) - want).abs() < 1e-12, "band {band}");
        }
        assert_eq!(transform_percentage(100), 0.5);
    }

    #[test]
    fn test_segment_cells() {
        let cells = segment_cells(Point::new(0.0, 0.0), Point::new(3.0, 1.0));
        assert_eq!(cells, vec![(0, 0), (0, 1), (1, 2), (1, 3)]);

        let back = segment_cells(Point::new(2.2, 4.0), Point::new(1.9, 1.0));
        assert_eq!(back, vec![(4, 2), (3, 2), (2, 2), (1, 2)]);

        assert_eq!(segment_cells(Point::new(1.4, 1.6), Point::new(1.4, 1.6)), vec![(2, 1)]);
    }

    fn vertical_case() -> (Raster<f64>, Vec<Vec<Point>>, Vec<Vec<Transect>>) {
        let baseline = Raster::filled(60, 60, 1.0);
        let curve: Vec<Point> = (5..=55).map(|r| Point::new(30.0, r as f64)).collect();
        let transects = build_transects(&curve, 20.0, 4);
        (baseline, vec![curve], vec![transects])
    }

    #[test]
    fn test_excision_near_mid_transect() {
        let (baseline, curves, transects) = vertical_case();
        assert_eq!(transects[0].len(), 13);
        assert_eq!(transects[0][6].band_index, 6);

        let result = excise_bands(&baseline, &curves, &transects, f64::NAN).unwrap();
        let g = result.grid.data();

        // The curve itself is never a candidate
        assert_eq!(g[[29, 30]], 1.0);
        // Half of each side of the middle transect is cut
        assert!(g[[29, 29]].is_nan());
        assert!(g[[29, 25]].is_nan());
        assert_eq!(g[[29, 24]], 1.0);
        assert!(g[[29, 35]].is_nan());
        // Outside the band
        assert_eq!(g[[29, 50]], 1.0);
        assert_eq!(g[[29, 5]], 1.0);

        assert!(result.excised > 0);
        assert_eq!(result.excised, result.grid.nodata_count());
        assert!(result.grid.nodata().is_some_and(f64::is_nan));
        assert!(!result.regions.is_empty());
    }

    #[test]
    fn test_nothing_to_excise_keeps_baseline() {
        let baseline = Raster::filled(10, 10, 3.0);
        let result = excise_bands(&baseline, &[], &[], f64::NAN).unwrap();
        assert_eq!(result.excised, 0);
        assert!(result.grid.nodata().is_none());
        assert_eq!(result.grid.data(), baseline.data());
    }

    #[test]
    fn test_custom_nodata_value() {
        let (baseline, curves, transects) = vertical_case();
        let result = excise_bands(&baseline, &curves, &transects, -9999.0).unwrap();
        assert_eq!(result.grid.data()[[29, 29]], -9999.0);
        assert_eq!(result.grid.nodata(), Some(-9999.0));
    }
}
