//! # escarp algorithms
//!
//! Cliff-aware upsampling of elevation grids.
//!
//! ## Modules
//!
//! - **cliff**: gradient field, cliff mask and line extraction, parametric
//!   curve fitting, transects, the two discontinuity-injection strategies and
//!   the end-to-end pipeline
//! - **interpolation**: bicubic baseline surface, threshold-switched fast
//!   resampler, 2D k-d tree
//! - **morphology**: structuring elements and binary dilation
//! - **terrain**: Gaussian pre-smoothing

pub mod cliff;
pub mod interpolation;
pub(crate) mod maybe_rayon;
pub mod morphology;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cliff::{
        cliff_aware_upsample, CliffAwareOutput, CliffAwareUpsample, CliffLine, CliffMask,
        CliffParams, CurveError, Diagnostics, FallbackReason, GradientField, InjectionStrategy,
        ParametricCurve, PipelineError, Point, RegionAssignment, Transect,
    };
    pub use crate::interpolation::{bicubic_upsample, threshold_resample, KdTree};
    pub use crate::terrain::gaussian_smooth;
    pub use escarp_core::prelude::*;
}
