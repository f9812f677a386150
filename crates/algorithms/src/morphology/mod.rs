//! Binary morphology on cell masks
//!
//! - Structuring elements: square windows
//! - Dilation: grows set cells by one element sweep

mod dilate;
mod element;

pub use dilate::dilate_mask;
pub use element::StructuringElement;
