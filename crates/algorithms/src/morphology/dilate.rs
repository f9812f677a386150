//! Binary dilation
//!
//! A cell is set in the output when any cell under the structuring element
//! centred on it is set in the input. Offsets falling outside the grid are
//! ignored, so the border is dilated like the interior.

use super::element::StructuringElement;
use crate::maybe_rayon::*;
use escarp_core::{Error, Result};
use ndarray::Array2;

/// Dilate a boolean mask with `element`
pub fn dilate_mask(mask: &Array2<bool>, element: &StructuringElement) -> Result<Array2<bool>> {
    element.validate()?;

    let (rows, cols) = mask.dim();
    let offsets = element.offsets();

    let output: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    offsets.iter().any(|&(dr, dc)| {
                        let r = row as isize + dr;
                        let c = col as isize + dc;
                        r >= 0
                            && c >= 0
                            && (r as usize) < rows
                            && (c as usize) < cols
                            && mask[[r as usize, c as usize]]
                    })
                })
                .collect::<Vec<bool>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cell_grows_to_square() {
        let mut mask = Array2::from_elem((5, 5), false);
        mask[[2, 2]] = true;
        let out = dilate_mask(&mask, &StructuringElement::Square(1)).unwrap();
        assert_eq!(out.iter().filter(|&&v| v).count(), 9);
        assert!(out[[1, 1]] && out[[3, 3]]);
        assert!(!out[[0, 0]] && !out[[4, 2]]);
    }

    #[test]
    fn test_border_cells_dilate() {
        let mut mask = Array2::from_elem((3, 4), false);
        mask[[0, 0]] = true;
        let out = dilate_mask(&mask, &StructuringElement::Square(1)).unwrap();
        assert!(out[[0, 1]] && out[[1, 0]] && out[[1, 1]]);
        assert_eq!(out.iter().filter(|&&v| v).count(), 4);
    }

    #[test]
    fn test_dilation_is_superset() {
        let mask = Array2::from_shape_fn((6, 7), |(r, c)| (r * 3 + c * 5) % 7 == 0);
        let out = dilate_mask(&mask, &StructuringElement::Square(1)).unwrap();
        for (a, b) in mask.iter().zip(out.iter()) {
            assert!(!a || *b);
        }
    }

    #[test]
    fn test_rejects_zero_radius() {
        let mask = Array2::from_elem((2, 2), true);
        assert!(dilate_mask(&mask, &StructuringElement::Square(0)).is_err());
    }
}
