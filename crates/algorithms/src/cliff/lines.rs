//! Cliff mask and cliff-line extraction
//!
//! The mask is `gradient > threshold`. Its outer borders are traced with
//! Suzuki-Abe border following (8-connected foreground, borders of holes and
//! anything nested inside holes are skipped), then each border is split
//! wherever the elevation under consecutive points jumps by more than the
//! similarity threshold.

use super::gradient::DirectionalRatios;
use super::Point;
use escarp_core::raster::Raster;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Neighbour steps `(dr, dc)` in counter-clockwise order starting east
const DIRS: [(isize, isize); 8] = [
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
];
const WEST: usize = 4;

/// Binary cliff mask
#[derive(Debug, Clone, PartialEq)]
pub struct CliffMask {
    cells: Array2<bool>,
}

impl CliffMask {
    /// Cells whose gradient strictly exceeds `threshold`
    pub fn from_gradient(gradient: &Raster<f64>, threshold: f64) -> Self {
        Self {
            cells: gradient.data().mapv(|g| g > threshold),
        }
    }

    pub fn from_array(cells: Array2<bool>) -> Self {
        Self { cells }
    }

    pub fn is_cliff(&self, row: usize, col: usize) -> bool {
        self.cells.get((row, col)).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn cells(&self) -> &Array2<bool> {
        &self.cells
    }

    /// 0/1 raster sharing `like`'s transform
    pub fn to_raster(&self, like: &Raster<f64>) -> Raster<u8> {
        let (rows, cols) = self.shape();
        let mut out = like.with_same_meta::<u8>(rows, cols);
        *out.data_mut() = self.cells.mapv(u8::from);
        out
    }

    fn at(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && self.is_cliff(row as usize, col as usize)
    }
}

/// An ordered run of traced points belonging to one physical edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliffLine {
    pub points: Vec<Point>,
}

impl CliffLine {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Trace the outer border of every outermost 8-connected component.
///
/// Contours come out in raster order of their topmost-leftmost cell. Each
/// contour is the closed border path as `(x = col, y = row)` points, with
/// cells of one-pixel-wide parts visited once per pass.
pub fn trace_external_contours(mask: &CliffMask) -> Vec<Vec<Point>> {
    let (rows, cols) = mask.shape();
    let outside = outer_background(mask);
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut contours = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            if !mask.is_cliff(r, c) || visited[[r, c]] {
                continue;
            }

            // Flood the component (8-connected) and check whether it touches
            // the outer background
            let mut external = false;
            let mut stack = vec![(r, c)];
            visited[[r, c]] = true;
            while let Some((cr, cc)) = stack.pop() {
                for &(dr, dc) in &DIRS {
                    let nr = cr as isize + dr;
                    let nc = cc as isize + dc;
                    let inside = nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols;
                    if !inside {
                        external = true;
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if mask.is_cliff(nr, nc) {
                        if !visited[[nr, nc]] {
                            visited[[nr, nc]] = true;
                            stack.push((nr, nc));
                        }
                    } else if dr == 0 || dc == 0 {
                        external |= outside[[nr, nc]];
                    }
                }
            }

            if external {
                contours.push(follow_border(mask, r, c));
            }
        }
    }

    contours
}

/// Background cells 4-connected to the grid frame
fn outer_background(mask: &CliffMask) -> Array2<bool> {
    let (rows, cols) = mask.shape();
    let mut outside = Array2::from_elem((rows, cols), false);
    let mut stack = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            let on_frame = r == 0 || c == 0 || r + 1 == rows || c + 1 == cols;
            if on_frame && !mask.is_cliff(r, c) {
                outside[[r, c]] = true;
                stack.push((r, c));
            }
        }
    }

    while let Some((r, c)) = stack.pop() {
        for &(dr, dc) in &[(-1_isize, 0_isize), (1, 0), (0, -1), (0, 1)] {
            let nr = r as isize + dr;
            let nc = c as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if !outside[[nr, nc]] && !mask.is_cliff(nr, nc) {
                outside[[nr, nc]] = true;
                stack.push((nr, nc));
            }
        }
    }

    outside
}

/// Follow the outer border starting at a cell whose west neighbour is background
fn follow_border(mask: &CliffMask, row: usize, col: usize) -> Vec<Point> {
    let start = (row as isize, col as isize);
    let step = |(r, c): (isize, isize), d: usize| (r + DIRS[d].0, c + DIRS[d].1);

    // Clockwise from west for the last cell of the loop
    let first = (1..8)
        .map(|k| step(start, (WEST + 8 - k) % 8))
        .find(|&(r, c)| mask.at(r, c));

    let Some(last) = first else {
        return vec![Point::new(col as f64, row as f64)];
    };

    let (rows, cols) = mask.shape();
    let max_steps = 4 * rows * cols + 8;
    let mut contour = Vec::new();
    let mut prev = last;
    let mut cur = start;

    while contour.len() < max_steps {
        let back = (0..8)
            .find(|&d| step(cur, d) == prev)
            .unwrap_or(WEST);
        let next = (1..=8)
            .map(|k| step(cur, (back + k) % 8))
            .find(|&(r, c)| mask.at(r, c))
            .unwrap_or(cur);

        contour.push(Point::new(cur.1 as f64, cur.0 as f64));
        if next == start && cur == last {
            break;
        }
        prev = cur;
        cur = next;
    }

    contour
}

/// Trace the mask and split its contours into elevation-coherent lines.
///
/// Contours shorter than `min_length` are skipped. Walking a contour, a new
/// segment starts whenever the elevation under a point differs from the one
/// under the previous point by more than `similarity_threshold`; segments
/// shorter than `min_length` are discarded.
pub fn extract_cliff_lines(
    elevation: &Array2<f64>,
    mask: &CliffMask,
    min_length: usize,
    similarity_threshold: f64,
) -> Vec<CliffLine> {
    let contours = trace_external_contours(mask);
    let elev = |p: &Point| elevation[[p.y as usize, p.x as usize]];

    let mut lines = Vec::new();
    let mut short_segments = 0usize;

    for contour in contours.iter().filter(|c| c.len() >= min_length) {
        let mut current = vec![contour[0]];
        let mut last = elev(&contour[0]);

        for p in &contour[1..] {
            let z = elev(p);
            if (z - last).abs() > similarity_threshold {
                if current.len() >= min_length {
                    lines.push(CliffLine::new(std::mem::take(&mut current)));
                } else {
                    short_segments += 1;
                    current.clear();
                }
            }
            current.push(*p);
            last = z;
        }

        if current.len() >= min_length {
            lines.push(CliffLine::new(current));
        } else {
            short_segments += 1;
        }
    }

    debug!(
        contours = contours.len(),
        lines = lines.len(),
        short_segments,
        "extracted cliff lines"
    );
    lines
}

/// Shift every point by the ratio fields sampled at its clamped cell.
///
/// Ratios lie in `[0, 1)`, so points keep their order along each axis.
pub fn refine_subpixel(lines: &mut [CliffLine], ratios: &DirectionalRatios) {
    let (rows, cols) = ratios.horizontal.dim();
    if rows == 0 || cols == 0 {
        return;
    }
    for p in lines.iter_mut().flat_map(|l| l.points.iter_mut()) {
        let row = (p.y as isize).clamp(0, rows as isize - 1) as usize;
        let col = (p.x as isize).clamp(0, cols as isize - 1) as usize;
        p.x += ratios.horizontal[[row, col]];
        p.y += ratios.vertical[[row, col]];
    }
}
