//! Structuring elements for binary morphology

use escarp_core::raster::Neighborhood;
use escarp_core::{Error, Result};

/// Neighbourhood shape swept over a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuringElement {
    /// Square of side `2 * radius + 1`
    Square(usize),
}

impl Default for StructuringElement {
    fn default() -> Self {
        StructuringElement::Square(1)
    }
}

impl StructuringElement {
    pub fn validate(&self) -> Result<()> {
        if self.radius() == 0 {
            return Err(Error::invalid_param(
                "radius",
                0,
                "structuring element radius must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn radius(&self) -> usize {
        match *self {
            StructuringElement::Square(r) => r,
        }
    }

    /// `(dr, dc)` offsets of the active cells, centre included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        match *self {
            StructuringElement::Square(r) => Neighborhood::Square(r).offsets(),
        }
    }
}
