//! Offset patterns around a cell

/// Window shape around a centre cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// All cells within Chebyshev distance `r`
    Square(usize),
}

impl Neighborhood {
    pub fn radius(&self) -> usize {
        match *self {
            Neighborhood::Square(r) => r,
        }
    }

    /// Relative `(row, col)` positions inside the window, row-major, centre included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        (-r..=r).flat_map(|dr| (-r..=r).map(move |dc| (dr, dc))).collect()
    }
}

/// The eight neighbours of a cell as `(row_offset, col_offset, distance)`,
/// clockwise from north. Diagonals are `sqrt(2)` away.
pub const QUEEN_STEPS: [(isize, isize, f64); 8] = [
    (-1, 0, 1.0),
    (-1, 1, std::f64::consts::SQRT_2),
    (0, 1, 1.0),
    (1, 1, std::f64::consts::SQRT_2),
    (1, 0, 1.0),
    (1, -1, std::f64::consts::SQRT_2),
    (0, -1, 1.0),
    (-1, -1, std::f64::consts::SQRT_2),
];
