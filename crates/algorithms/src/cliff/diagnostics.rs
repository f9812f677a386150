//! Intermediate artifacts returned next to the upsampled grid

use super::additive::SideSample;
use super::gradient::GradientField;
use super::lines::{CliffLine, CliffMask};
use super::region::RegionAssignment;
use super::transect::Transect;
use super::{CurveError, PipelineError};
use std::fmt;

/// Lines dropped by the curve fit, by failure kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedLines {
    pub insufficient_points: usize,
    pub degenerate_curve: usize,
    pub singular_fit: usize,
}

impl DroppedLines {
    pub fn record(&mut self, error: &CurveError) {
        match error {
            CurveError::InsufficientPoints { .. } => self.insufficient_points += 1,
            CurveError::DegenerateCurve => self.degenerate_curve += 1,
            CurveError::SingularFit { .. } => self.singular_fit += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.insufficient_points + self.degenerate_curve + self.singular_fit
    }
}

/// Why the output is the plain bicubic baseline
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Nothing survived detection and fitting
    EmptyCliffSet,
    /// A cliff stage failed; carries the error message
    Failed(String),
}

impl From<&PipelineError> for FallbackReason {
    fn from(error: &PipelineError) -> Self {
        match error {
            PipelineError::EmptyCliffSet => FallbackReason::EmptyCliffSet,
            other => FallbackReason::Failed(other.to_string()),
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::EmptyCliffSet => write!(f, "no cliff lines"),
            FallbackReason::Failed(msg) => write!(f, "cliff stage failed: {}", msg),
        }
    }
}

/// Everything the pipeline computed on its way to the output grid.
///
/// Stages that never ran leave their fields empty. `transects` is indexed
/// like `lines`; lines dropped by the curve fit have no transects.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Gradient of the (pre-smoothed) working grid
    pub gradient: Option<GradientField>,
    pub mask: Option<CliffMask>,
    pub lines: Vec<CliffLine>,
    pub transects: Vec<Vec<Transect>>,
    /// Additive strategy only
    pub side_samples: Vec<SideSample>,
    /// Subtractive strategy only
    pub regions: Option<RegionAssignment>,
    pub dropped: DroppedLines,
    /// Side probes that left the grid
    pub out_of_bounds_samples: usize,
    pub excised_pixels: usize,
    pub fallback: Option<FallbackReason>,
}

impl Diagnostics {
    pub fn transect_count(&self) -> usize {
        self.transects.iter().map(Vec::len).sum()
    }
}
