//! Terrain pre-processing
//!
//! - Gaussian smoothing: separable blur with mirrored borders, used before
//!   cliff detection and on per-line influence rasters

mod smoothing;

pub use smoothing::{gaussian_blur, gaussian_kernel, gaussian_radius, gaussian_smooth, GaussianSmooth, GaussianSmoothParams};
