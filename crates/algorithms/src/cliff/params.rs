//! Pipeline configuration

use escarp_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted `upscale_factor`
pub const MAX_UPSCALE_FACTOR: usize = 64;
/// Largest accepted `segment_length` (output pixels)
pub const MAX_SEGMENT_LENGTH: f64 = 4096.0;

/// How cliff geometry is imposed on the bicubic baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionStrategy {
    /// Add a smoothed elevation-step profile across every cliff line
    #[default]
    Additive,
    /// Excise a band of pixels on both sides of every cliff line (set to no-data)
    Subtractive,
}

impl fmt::Display for InjectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionStrategy::Additive => write!(f, "additive"),
            InjectionStrategy::Subtractive => write!(f, "subtractive"),
        }
    }
}

impl FromStr for InjectionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "additive" => Ok(InjectionStrategy::Additive),
            "subtractive" => Ok(InjectionStrategy::Subtractive),
            other => Err(Error::invalid_param(
                "injection_strategy",
                other,
                "expected 'additive' or 'subtractive'",
            )),
        }
    }
}

/// Parameters for cliff-aware upsampling.
///
/// Lengths are in input pixels unless noted. Missing fields take their
/// default when deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliffParams {
    /// Output cells per input cell along each axis (default 8)
    pub upscale_factor: usize,
    /// Gradient above which a cell is a cliff cell (default 12.0)
    pub cliff_threshold: f64,
    /// Minimum number of points in an emitted cliff line (default 5)
    pub min_length: usize,
    /// Largest elevation jump between consecutive line points (default 10.0)
    pub similarity_threshold: f64,
    /// Gaussian sigma for the pre-blur and the additive influence blur (default 1.0)
    pub smoothing_sigma: f64,
    /// Blur the input before detection (default true)
    pub pre_smooth: bool,
    /// Share of the additive half-width taken by the cliff face (default 0.2)
    pub cliff_width_percent: f64,
    /// Share of the additive half-width ramped on each side (default 0.4)
    pub side_percent: f64,
    /// Distance of the additive side probes from the line (default 5.0)
    pub sample_distance: f64,
    /// Smoothing-spline residual budget (default 0.8)
    pub curve_smoothness: f64,
    /// Minimum number of dense curve evaluations per line (default 100)
    pub min_curve_samples: usize,
    /// Full transect length in output pixels (default 40.0)
    pub segment_length: f64,
    /// Stride between transects along the dense curve (default 4)
    pub sample_interval: usize,
    /// Discontinuity injection strategy (default additive)
    pub injection_strategy: InjectionStrategy,
    /// Nudge line points by the directional gradient ratios (default false)
    pub subpixel_refine: bool,
    /// Diagonal damping in the directional ratios (default 0.5)
    pub ratio_alpha: f64,
    /// Value written into excised cells (default NaN)
    #[serde(skip_serializing_if = "is_nan")]
    pub nodata_value: f64,
}

impl Default for CliffParams {
    fn default() -> Self {
        Self {
            upscale_factor: 8,
            cliff_threshold: 12.0,
            min_length: 5,
            similarity_threshold: 10.0,
            smoothing_sigma: 1.0,
            pre_smooth: true,
            cliff_width_percent: 0.2,
            side_percent: 0.4,
            sample_distance: 5.0,
            curve_smoothness: 0.8,
            min_curve_samples: 100,
            segment_length: 40.0,
            sample_interval: 4,
            injection_strategy: InjectionStrategy::Additive,
            subpixel_refine: false,
            ratio_alpha: 0.5,
            nodata_value: f64::NAN,
        }
    }
}

impl CliffParams {
    /// Reject out-of-range values with [`Error::InvalidParameter`]
    pub fn validate(&self) -> Result<()> {
        if self.upscale_factor == 0 {
            return Err(Error::invalid_param("upscale_factor", 0, "must be at least 1"));
        }
        if self.upscale_factor > MAX_UPSCALE_FACTOR {
            return Err(Error::invalid_param(
                "upscale_factor",
                self.upscale_factor,
                format!("must be at most {MAX_UPSCALE_FACTOR}"),
            ));
        }
        if self.min_length == 0 {
            return Err(Error::invalid_param("min_length", 0, "must be at least 1"));
        }
        if self.sample_interval == 0 {
            return Err(Error::invalid_param("sample_interval", 0, "must be at least 1"));
        }
        if self.min_curve_samples < 2 {
            return Err(Error::invalid_param(
                "min_curve_samples",
                self.min_curve_samples,
                "must be at least 2",
            ));
        }

        non_negative("cliff_threshold", self.cliff_threshold)?;
        non_negative("similarity_threshold", self.similarity_threshold)?;
        non_negative("smoothing_sigma", self.smoothing_sigma)?;
        non_negative("curve_smoothness", self.curve_smoothness)?;
        non_negative("ratio_alpha", self.ratio_alpha)?;
        positive("sample_distance", self.sample_distance)?;
        positive("segment_length", self.segment_length)?;
        if self.segment_length > MAX_SEGMENT_LENGTH {
            return Err(Error::invalid_param(
                "segment_length",
                self.segment_length,
                format!("must be at most {MAX_SEGMENT_LENGTH}"),
            ));
        }
        open_unit("cliff_width_percent", self.cliff_width_percent)?;
        open_unit("side_percent", self.side_percent)?;

        Ok(())
    }
}

fn is_nan(value: &f64) -> bool {
    value.is_nan()
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_param(name, value, "must be finite and >= 0"))
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_param(name, value, "must be finite and > 0"))
    }
}

fn open_unit(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(Error::invalid_param(name, value, "must lie in (0, 1)"))
    }
}
