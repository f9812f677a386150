//! Nearest-transect region assignment
//!
//! Every candidate pixel goes to one transect in two steps: first the line
//! owning the nearest transect centre, then the transect of that line whose
//! segment passes closest. Ties resolve to the lowest line, then the lowest
//! transect, matching a first-encountered scan.

use super::transect::Transect;
use super::Point;
use crate::interpolation::KdTree;
use crate::maybe_rayon::*;
use escarp_core::Raster;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A transect addressed by its line and its position along that line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransectId {
    pub line: usize,
    pub index: usize,
}

/// Pixels of the output grid assigned to transects, in raster order
#[derive(Debug, Clone, Default)]
pub struct RegionAssignment {
    shape: (usize, usize),
    /// Cumulative transect count before each line
    offsets: Vec<usize>,
    cells: Vec<((usize, usize), TransectId)>,
}

impl RegionAssignment {
    /// Grid shape the cells refer to
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// `((row, col), transect)` pairs in raster order
    pub fn iter(&self) -> impl Iterator<Item = &((usize, usize), TransectId)> {
        self.cells.iter()
    }

    /// Total number of transects that pixels could be assigned to
    pub fn region_count(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Sequential region number of a transect, counting lines in order
    pub fn region_of(&self, id: TransectId) -> usize {
        self.offsets[id.line] + id.index
    }

    /// Region numbers as a raster; unassigned cells hold -1
    pub fn label_grid(&self, like: &Raster<f64>) -> Raster<i32> {
        let (rows, cols) = self.shape;
        let mut labels: Raster<i32> = like.with_same_meta(rows, cols);
        labels.data_mut().fill(-1);
        labels.set_nodata(Some(-1));
        for &((r, c), id) in &self.cells {
            labels.data_mut()[[r, c]] = self.region_of(id) as i32;
        }
        labels
    }

    /// Interleaved RGB pixels with one colour per region and black elsewhere
    pub fn render_rgb(&self, palette: &[[u8; 3]]) -> Vec<u8> {
        let (rows, cols) = self.shape;
        let mut pixels = vec![0u8; rows * cols * 3];
        if palette.is_empty() {
            return pixels;
        }
        for &((r, c), id) in &self.cells {
            let color = palette[self.region_of(id) % palette.len()];
            let at = (r * cols + c) * 3;
            pixels[at..at + 3].copy_from_slice(&color);
        }
        pixels
    }
}

/// Assign each of `cells` (`(row, col)` in a grid of `shape`) to its nearest transect.
///
/// Lines without transects never receive pixels. With no transects at all
/// the assignment is empty.
pub fn assign_regions(
    cells: &[(usize, usize)],
    transects: &[Vec<Transect>],
    shape: (usize, usize),
) -> RegionAssignment {
    let mut offsets = Vec::with_capacity(transects.len() + 1);
    let mut total = 0;
    offsets.push(0);
    for line in transects {
        total += line.len();
        offsets.push(total);
    }

    let owners: Vec<usize> = transects
        .iter()
        .enumerate()
        .flat_map(|(line, ts)| std::iter::repeat(line).take(ts.len()))
        .collect();
    let centers = KdTree::build(transects.iter().flatten().map(|t| (t.center.x, t.center.y)));

    let assigned: Vec<Option<((usize, usize), TransectId)>> = cells
        .to_vec()
        .into_par_iter()
        .map(|(r, c)| {
            let p = Point::new(c as f64, r as f64);
            let line = owners[centers.nearest(p.x, p.y)?.index];
            let index = nearest_in_line(&transects[line], p)?;
            Some(((r, c), TransectId { line, index }))
        })
        .collect();

    RegionAssignment {
        shape,
        offsets,
        cells: assigned.into_iter().flatten().collect(),
    }
}

fn nearest_in_line(transects: &[Transect], p: Point) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, t) in transects.iter().enumerate() {
        let d = t.distance_to(p);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// `count` random colours drawn from `rng`, none of them black
pub fn region_palette<R: Rng>(count: usize, rng: &mut R) -> Vec<[u8; 3]> {
    (0..count)
        .map(|_| [rng.gen_range(40..=255), rng.gen_range(40..=255), rng.gen_range(40..=255)])
        .collect()
}
