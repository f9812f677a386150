//! Perpendicular transects along a smoothed cliff curve

use super::Point;
use serde::{Deserialize, Serialize};

/// Floor for finite-difference lengths before normalizing
const TANGENT_EPSILON: f64 = 1e-9;

/// A segment crossing the curve at right angles.
///
/// `left` and `right` sit at `∓ segment_length / 2` along `normal`, so
/// `right - left` points the same way as `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transect {
    pub center: Point,
    pub left: Point,
    pub right: Point,
    /// Unit normal to the curve at `center`
    pub normal: Point,
    /// Position weight in the chain, 0 at both ends
    pub band_index: usize,
}

impl Transect {
    /// Distance from `p` to the segment `left..right`
    pub fn distance_to(&self, p: Point) -> f64 {
        let seg = self.right - self.left;
        let len_sq = seg.dot(seg);
        if len_sq <= 0.0 {
            return p.distance(self.center);
        }
        let s = ((p - self.left).dot(seg) / len_sq).clamp(0.0, 1.0);
        p.distance(self.left + seg * s)
    }
}

/// Tent-shaped position weight: `min(i, n - 1 - i)`
pub fn band_index(i: usize, n: usize) -> usize {
    i.min(n.saturating_sub(1).saturating_sub(i))
}

/// Unit tangents of a point chain.
///
/// Interior points average their two adjacent finite-difference directions;
/// endpoints use their single neighbour. A one-point chain gets `(1, 0)`.
pub fn unit_tangents(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 2 {
        return vec![Point::new(1.0, 0.0); n];
    }

    let unit = |d: Point| d * (1.0 / d.length().max(TANGENT_EPSILON));
    let diffs: Vec<Point> = points.windows(2).map(|w| unit(w[1] - w[0])).collect();

    (0..n)
        .map(|i| {
            if i == 0 {
                diffs[0]
            } else if i == n - 1 {
                diffs[n - 2]
            } else {
                unit(diffs[i - 1] + diffs[i])
            }
        })
        .collect()
}

/// Transects at every `sample_interval`-th point of `samples`
pub fn build_transects(samples: &[Point], segment_length: f64, sample_interval: usize) -> Vec<Transect> {
    let anchors: Vec<Point> = samples.iter().copied().step_by(sample_interval.max(1)).collect();
    let tangents = unit_tangents(&anchors);
    let half = segment_length / 2.0;
    let n = anchors.len();

    anchors
        .iter()
        .zip(&tangents)
        .enumerate()
        .map(|(i, (&center, tangent))| {
            let normal = tangent.perpendicular();
            Transect {
                center,
                left: center - normal * half,
                right: center + normal * half,
                normal,
                band_index: band_index(i, n),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_band_index_tent() {
        for n in 1..12 {
            let bands: Vec<usize> = (0..n).map(|i| band_index(i, n)).collect();
            assert_eq!(bands[0], 0);
            assert_eq!(bands[n - 1], 0);
            for i in 0..n {
                assert_eq!(bands[i], bands[n - 1 - i]);
            }
            assert_eq!(*bands.iter().max().unwrap(), (n - 1) / 2);
        }
    }

    #[test]
    fn test_tangents_of_straight_chain() {
        let pts: Vec<Point> = (0..5).map(|i| Point::new(i as f64, i as f64)).collect();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        for t in unit_tangents(&pts) {
            assert_relative_eq!(t.x, s, epsilon = 1e-12);
            assert_relative_eq!(t.y, s, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_corner_tangent_is_bisector() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)];
        let t = unit_tangents(&pts);
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(t[1].x, s, epsilon = 1e-12);
        assert_relative_eq!(t[1].y, s, epsilon = 1e-12);
        assert_eq!(t[0], Point::new(1.0, 0.0));
        assert_eq!(t[2], Point::new(0.0, 1.0));
    }

    #[test]
    fn test_repeated_points_do_not_produce_nan() {
        let pts = vec![Point::new(2.0, 2.0); 3];
        assert!(unit_tangents(&pts).iter().all(|t| t.x.is_finite() && t.y.is_finite()));
    }

    #[test]
    fn test_transect_geometry() {
        let samples: Vec<Point> = (0..9).map(|i| Point::new(5.0, i as f64)).collect();
        let transects = build_transects(&samples, 10.0, 2);
        assert_eq!(transects.len(), 5);

        let bands: Vec<usize> = transects.iter().map(|t| t.band_index).collect();
        assert_eq!(bands, vec![0, 1, 2, 1, 0]);

        let t = &transects[2];
        assert_eq!(t.center, Point::new(5.0, 4.0));
        // Tangent points down the column, normal along -x
        assert_relative_eq!(t.normal.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(t.left.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(t.right.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(t.left.distance(t.right), 10.0, epsilon = 1e-12);
        assert_relative_eq!((t.right - t.left).dot(t.normal), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_to_segment() {
        let t = build_transects(&[Point::new(0.0, 0.0), Point::new(0.0, 1.0)], 4.0, 1)[0];
        // Segment runs along x from 2 to -2 at y = 0
        assert_relative_eq!(t.distance_to(Point::new(1.0, 3.0)), 3.0, epsilon = 1e-12);
        assert_relative_eq!(t.distance_to(Point::new(5.0, 0.0)), 3.0, epsilon = 1e-12);
    }
}
