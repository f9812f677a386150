//! Resampling and spatial search
//!
//! - Bicubic baseline: separable not-a-knot cubic splines through every cell
//! - Threshold resampler: bilinear, switching to nearest across steep cells
//! - KdTree: nearest-neighbour queries for the cliff stages

mod bicubic;
pub mod kdtree;
mod threshold;

pub use bicubic::{bicubic_upsample, upsample_positions, BicubicUpsample};
pub use kdtree::{KdTree, NearestResult};
pub use threshold::{threshold_resample, ThresholdResample, ThresholdResampleParams};
