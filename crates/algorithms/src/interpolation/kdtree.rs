//! 2D k-d tree for nearest-neighbour queries
//!
//! Used by the cliff stages to find the nearest side sample for each curve
//! point and the nearest transect centre for each band pixel.
//!
//! Ties are resolved toward the lowest insertion index, so a query returns
//! exactly what a first-encountered-wins linear scan over the input would.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

/// A static 2D k-d tree over `(x, y)` points
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// Result of a nearest-neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestResult {
    /// Insertion index of the point
    pub index: usize,
    pub distance_sq: f64,
}

impl KdTree {
    /// Build from points in insertion order. O(n log² n).
    pub fn build<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let points: Vec<(f64, f64)> = points.into_iter().collect();
        let mut nodes = Vec::with_capacity(points.len());
        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            build_recursive(&points, &mut indices, 0, &mut nodes);
        }
        Self { nodes, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest point to `(qx, qy)`, lowest index among equals.
    ///
    /// Returns `None` if the tree is empty.
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<NearestResult> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = NearestResult {
            index: usize::MAX,
            distance_sq: f64::INFINITY,
        };
        self.nearest_recursive(0, qx, qy, &mut best);
        (best.index != usize::MAX).then_some(best)
    }

    fn nearest_recursive(&self, node_idx: usize, qx: f64, qy: f64, best: &mut NearestResult) {
        let node = &self.nodes[node_idx];
        let (px, py) = self.points[node.point_idx];

        let dx = qx - px;
        let dy = qy - py;
        let dist_sq = dx * dx + dy * dy;

        if dist_sq < best.distance_sq
            || (dist_sq == best.distance_sq && node.point_idx < best.index)
        {
            best.distance_sq = dist_sq;
            best.index = node.point_idx;
        }

        let diff = if node.split_dim == 0 { dx } else { dy };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.nearest_recursive(child, qx, qy, best);
        }

        // `<=` so equidistant points across the plane still compete on index
        if diff * diff <= best.distance_sq {
            if let Some(child) = second {
                self.nearest_recursive(child, qx, qy, best);
            }
        }
    }
}

fn build_recursive(
    points: &[(f64, f64)],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = (depth % 2) as u8;
    let coord = |i: usize| if split_dim == 0 { points[i].0 } else { points[i].1 };

    indices.sort_by(|&a, &b| coord(a).total_cmp(&coord(b)).then(a.cmp(&b)));

    let median = n / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    if median > 0 {
        let left = build_recursive(points, &mut indices[..median], depth + 1, nodes);
        nodes[node_idx].left = Some(left);
    }
    if median + 1 < n {
        let right = build_recursive(points, &mut indices[median + 1..], depth + 1, nodes);
        nodes[node_idx].right = Some(right);
    }

    node_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<(f64, f64)> {
        vec![
            (2.0, 3.0),
            (5.0, 4.0),
            (9.0, 6.0),
            (4.0, 7.0),
            (8.0, 1.0),
            (7.0, 2.0),
            (1.0, 8.0),
            (6.0, 5.0),
        ]
    }

    fn brute_force(points: &[(f64, f64)], qx: f64, qy: f64) -> NearestResult {
        let mut best = NearestResult {
            index: usize::MAX,
            distance_sq: f64::INFINITY,
        };
        for (i, &(x, y)) in points.iter().enumerate() {
            let d = (qx - x) * (qx - x) + (qy - y) * (qy - y);
            if d < best.distance_sq {
                best = NearestResult { index: i, distance_sq: d };
            }
        }
        best
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.nearest(0.0, 0.0).is_none());
    }

    #[test]
    fn test_nearest_exact() {
        let tree = KdTree::build(sample_points());
        assert_eq!(tree.len(), 8);
        let hit = tree.nearest(5.0, 4.0).unwrap();
        assert_eq!(hit.index, 1);
        assert_eq!(hit.distance_sq, 0.0);
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let pts = sample_points();
        let tree = KdTree::build(pts.clone());
        for qx in 0..20 {
            for qy in 0..20 {
                let (qx, qy) = (qx as f64 * 0.5, qy as f64 * 0.5);
                assert_eq!(tree.nearest(qx, qy).unwrap(), brute_force(&pts, qx, qy), "query ({}, {})", qx, qy);
            }
        }
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        // Four points equidistant from the origin, plus duplicates
        let pts = vec![(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0), (1.0, 0.0), (-1.0, 0.0)];
        let tree = KdTree::build(pts.clone());
        assert_eq!(tree.nearest(0.0, 0.0).unwrap().index, 0);
        assert_eq!(tree.nearest(-1.0, 0.0).unwrap().index, 2);

        // A grid full of ties
        let grid: Vec<(f64, f64)> = (0..10)
            .flat_map(|i| (0..10).map(move |j| ((i % 5) as f64, (j % 5) as f64)))
            .collect();
        let tree = KdTree::build(grid.clone());
        for q in 0..40 {
            let (qx, qy) = ((q % 8) as f64 * 0.5, (q / 8) as f64 * 0.5);
            assert_eq!(tree.nearest(qx, qy).unwrap(), brute_force(&grid, qx, qy));
        }
    }
}
