//! Cliff-aware upsampling entry point
//!
//! Input preparation errors (bad parameters, empty or non-finite grid) are
//! returned to the caller. Anything that goes wrong after that yields the
//! bicubic baseline, with the reason recorded in [`Diagnostics::fallback`].

use super::additive::{self, SideSample};
use super::curve::{fit_parametric_curve, ParametricCurve};
use super::diagnostics::{Diagnostics, FallbackReason};
use super::gradient::GradientField;
use super::lines::{extract_cliff_lines, refine_subpixel, CliffLine, CliffMask};
use super::params::{CliffParams, InjectionStrategy};
use super::region::RegionAssignment;
use super::subtractive;
use super::transect::Transect;
use super::{PipelineError, Point};
use crate::interpolation::bicubic_upsample;
use crate::maybe_rayon::*;
use crate::terrain::gaussian_smooth;
use escarp_core::raster::Raster;
use escarp_core::{Algorithm, Error, Result};
use ndarray::Array2;
use tracing::{debug, warn};

/// Upsampled grid plus the artifacts that produced it
#[derive(Debug, Clone)]
pub struct CliffAwareOutput {
    pub grid: Raster<f64>,
    pub diagnostics: Diagnostics,
}

/// Cliff-aware DEM upsampling
#[derive(Debug, Clone, Default)]
pub struct CliffAwareUpsample;

impl Algorithm for CliffAwareUpsample {
    type Input = Raster<f64>;
    type Output = CliffAwareOutput;
    type Params = CliffParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "CliffAwareUpsample"
    }

    fn description(&self) -> &'static str {
        "Bicubic upsampling that keeps detected cliff edges sharp"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        cliff_aware_upsample(&input, &params)
    }
}

/// A cliff line that survived curve fitting; `line` indexes the extracted lines
pub(crate) struct FittedLine {
    pub line: usize,
    pub curve: ParametricCurve,
}

/// Read-only inputs shared by both injection strategies
pub(crate) struct InjectionContext<'a> {
    /// Grid the lines were detected on (input resolution)
    pub working: &'a Array2<f64>,
    pub baseline: &'a Raster<f64>,
    pub lines: &'a [CliffLine],
    pub fitted: &'a [FittedLine],
    pub params: &'a CliffParams,
}

/// Result of a strategy run
pub(crate) struct Injection {
    pub grid: Raster<f64>,
    /// Indexed like the extracted lines
    pub transects: Vec<Vec<Transect>>,
    pub side_samples: Vec<SideSample>,
    pub regions: Option<RegionAssignment>,
    pub out_of_bounds: usize,
    pub excised: usize,
}

impl Injection {
    pub fn baseline_only(baseline: &Raster<f64>, lines: usize) -> Self {
        Self {
            grid: baseline.clone(),
            transects: vec![Vec::new(); lines],
            side_samples: Vec::new(),
            regions: None,
            out_of_bounds: 0,
            excised: 0,
        }
    }
}

/// Fitted curve resampled at `max(raw_len * factor, min_curve_samples)`
/// points and scaled to output pixels
pub(crate) fn dense_curve(curve: &ParametricCurve, raw_len: usize, params: &CliffParams) -> Vec<Point> {
    let n = (raw_len * params.upscale_factor).max(params.min_curve_samples);
    let f = params.upscale_factor as f64;
    curve.resample(n).into_iter().map(|p| p * f).collect()
}

/// Upsample `dem` by `params.upscale_factor`, keeping cliffs sharp.
///
/// The output is `rows * factor` x `cols * factor` and carries the input
/// transform scaled to the finer cells.
pub fn cliff_aware_upsample(dem: &Raster<f64>, params: &CliffParams) -> Result<CliffAwareOutput> {
    params.validate()?;
    if dem.is_empty() {
        return Err(Error::InvalidDimensions {
            width: dem.cols(),
            height: dem.rows(),
        });
    }
    dem.ensure_finite()?;

    let working = if params.pre_smooth {
        gaussian_smooth(dem, params.smoothing_sigma)?
    } else {
        dem.clone()
    };
    let baseline = bicubic_upsample(&working, params.upscale_factor)?;

    let mut diagnostics = Diagnostics::default();
    let grid = match run_cliff_stages(&working, &baseline, params, &mut diagnostics) {
        Ok(grid) => grid,
        Err(err) => {
            match &err {
                PipelineError::EmptyCliffSet => debug!("no cliff lines, using the bicubic baseline"),
                other => warn!(error = %other, "cliff stages failed, using the bicubic baseline"),
            }
            diagnostics.fallback = Some(FallbackReason::from(&err));
            baseline
        }
    };

    Ok(CliffAwareOutput { grid, diagnostics })
}

fn run_cliff_stages(
    working: &Raster<f64>,
    baseline: &Raster<f64>,
    params: &CliffParams,
    diagnostics: &mut Diagnostics,
) -> std::result::Result<Raster<f64>, PipelineError> {
    let ratio_alpha = params.subpixel_refine.then_some(params.ratio_alpha);
    let gradient = GradientField::compute(working, ratio_alpha)?;
    let mask = CliffMask::from_gradient(&gradient.magnitude, params.cliff_threshold);
    debug!(cliff_pixels = mask.count(), "cliff mask");

    let mut lines = extract_cliff_lines(
        working.data(),
        &mask,
        params.min_length,
        params.similarity_threshold,
    );
    if let Some(ratios) = &gradient.ratios {
        refine_subpixel(&mut lines, ratios);
    }
    diagnostics.gradient = Some(gradient);
    diagnostics.mask = Some(mask);

    let fits: Vec<_> = (0..lines.len())
        .into_par_iter()
        .map(|i| fit_parametric_curve(&lines[i].points, params.curve_smoothness))
        .collect();

    let mut fitted = Vec::with_capacity(fits.len());
    for (line, fit) in fits.into_iter().enumerate() {
        match fit {
            Ok(curve) => fitted.push(FittedLine { line, curve }),
            Err(err) => {
                debug!(line, error = %err, "dropping cliff line");
                diagnostics.dropped.record(&err);
            }
        }
    }
    debug!(
        lines = lines.len(),
        fitted = fitted.len(),
        dropped = diagnostics.dropped.total(),
        "fitted cliff curves"
    );

    if fitted.is_empty() {
        diagnostics.lines = lines;
        return Err(PipelineError::EmptyCliffSet);
    }

    let ctx = InjectionContext {
        working: working.data(),
        baseline,
        lines: &lines,
        fitted: &fitted,
        params,
    };
    let injection = match params.injection_strategy {
        InjectionStrategy::Additive => additive::inject(&ctx),
        InjectionStrategy::Subtractive => subtractive::inject(&ctx),
    };
    diagnostics.lines = lines;
    let injection = injection?;

    debug!(
        strategy = %params.injection_strategy,
        transects = injection.transects.iter().map(Vec::len).sum::<usize>(),
        side_samples = injection.side_samples.len(),
        excised = injection.excised,
        "injected cliff discontinuities"
    );

    diagnostics.transects = injection.transects;
    diagnostics.side_samples = injection.side_samples;
    diagnostics.regions = injection.regions;
    diagnostics.out_of_bounds_samples = injection.out_of_bounds;
    diagnostics.excised_pixels = injection.excised;
    Ok(injection.grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn step_dem(rows: usize, cols: usize, step_col: usize, high: f64) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        for r in 0..rows {
            for c in step_col..cols {
                dem.set(r, c, high).unwrap();
            }
        }
        dem
    }

    fn params(strategy: InjectionStrategy) -> CliffParams {
        CliffParams {
            upscale_factor: 4,
            pre_smooth: false,
            injection_strategy: strategy,
            ..Default::default()
        }
    }

    #[test]
    fn test_constant_grid_falls_back() {
        let dem = Raster::filled(12, 10, 250.0);
        let out = cliff_aware_upsample(&dem, &CliffParams::default()).unwrap();

        assert_eq!(out.grid.shape(), (96, 80));
        for &v in out.grid.data().iter() {
            assert_relative_eq!(v, 250.0, epsilon = 1e-9);
        }
        assert_eq!(out.diagnostics.fallback, Some(FallbackReason::EmptyCliffSet));
        assert!(out.diagnostics.lines.is_empty());
        assert_eq!(out.diagnostics.mask.as_ref().map(CliffMask::count), Some(0));
    }

    #[test]
    fn test_step_runs_both_strategies() {
        let dem = step_dem(30, 30, 15, 60.0);
        for strategy in [InjectionStrategy::Additive, InjectionStrategy::Subtractive] {
            let out = cliff_aware_upsample(&dem, &params(strategy)).unwrap();
            assert_eq!(out.grid.shape(), (120, 120));
            assert!(out.diagnostics.fallback.is_none(), "{strategy}");
            assert!(!out.diagnostics.lines.is_empty());
            assert!(out.diagnostics.transect_count() > 0);
            assert_eq!(out.diagnostics.transects.len(), out.diagnostics.lines.len());
        }
    }

    #[test]
    fn test_additive_records_side_samples() {
        let dem = step_dem(30, 30, 15, 60.0);
        let out = cliff_aware_upsample(&dem, &params(InjectionStrategy::Additive)).unwrap();
        assert!(!out.diagnostics.side_samples.is_empty());
        assert!(out.diagnostics.regions.is_none());
        assert!(out.grid.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_subtractive_excises_pixels() {
        let dem = step_dem(30, 30, 15, 60.0);
        let out = cliff_aware_upsample(&dem, &params(InjectionStrategy::Subtractive)).unwrap();
        assert!(out.diagnostics.excised_pixels > 0);
        assert_eq!(out.grid.nodata_count(), out.diagnostics.excised_pixels);
        assert!(out.diagnostics.regions.as_ref().is_some_and(|r| !r.is_empty()));
    }

    #[test]
    fn test_rejects_bad_input() {
        let dem = Raster::filled(5, 5, 1.0);
        let bad = CliffParams {
            upscale_factor: 0,
            ..Default::default()
        };
        assert!(matches!(
            cliff_aware_upsample(&dem, &bad),
            Err(Error::InvalidParameter { .. })
        ));

        let mut nan = dem.clone();
        nan.set(2, 2, f64::NAN).unwrap();
        assert!(matches!(
            cliff_aware_upsample(&nan, &CliffParams::default()),
            Err(Error::NonFiniteValue { .. })
        ));

        let empty: Raster<f64> = Raster::new(0, 0);
        assert!(cliff_aware_upsample(&empty, &CliffParams::default()).is_err());
    }

    #[test]
    fn test_algorithm_trait() {
        let algo = CliffAwareUpsample;
        assert_eq!(algo.name(), "CliffAwareUpsample");
        let out = algo.execute_default(Raster::filled(4, 4, 1.0)).unwrap();
        assert_eq!(out.grid.shape(), (32, 32));
    }

    #[test]
    fn test_dense_curve_scales_and_counts() {
        let pts: Vec<Point> = (0..6).map(|i| Point::new(i as f64, 2.0)).collect();
        let curve = fit_parametric_curve(&pts, 0.0).unwrap();
        let p = CliffParams {
            upscale_factor: 2,
            min_curve_samples: 100,
            ..Default::default()
        };
        let dense = dense_curve(&curve, pts.len(), &p);
        assert_eq!(dense.len(), 100);
        assert_relative_eq!(dense[0].x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(dense[99].x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(dense[50].y, 4.0, epsilon = 1e-9);

        let p = CliffParams {
            upscale_factor: 40,
            ..p
        };
        assert_eq!(dense_curve(&curve, pts.len(), &p).len(), 240);
    }
}
