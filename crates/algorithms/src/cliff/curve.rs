//! Parametric smoothing curve through a cliff line
//!
//! Each coordinate is a natural cubic smoothing spline over the normalized
//! cumulative arc length `t ∈ [0, 1]`, both sharing one roughness weight α.
//! α is chosen so that the summed squared residuals of x and y match the
//! requested smoothness (never exceeding it), which makes `smoothness = 0`
//! an interpolating spline.
//!
//! The fit follows the Reinsch formulation: with knot spacings `h`, the
//! second-difference operator `Q` (n × n−2) and the band matrix `R`
//! (n−2 × n−2), solve `(R + α QᵀQ) γ = Qᵀ y` and take `g = y − α Q γ`.
//! `R + α QᵀQ` is symmetric pentadiagonal, factored as banded LDLᵀ.

use super::{CurveError, Point};
use std::collections::HashSet;

/// Fewest distinct points a curve can be fitted to
pub const MIN_CURVE_POINTS: usize = 4;

const LOG_ALPHA_MIN: f64 = -20.0;
const LOG_ALPHA_MAX: f64 = 10.0;
const BISECTION_STEPS: usize = 50;

/// A fitted smoothing curve, evaluated by parameter `t ∈ [0, 1]`
#[derive(Debug, Clone)]
pub struct ParametricCurve {
    t: Vec<f64>,
    x: SplineCoords,
    y: SplineCoords,
    alpha: f64,
    residual: f64,
}

/// Fitted knot values and second derivatives (zero at both ends)
#[derive(Debug, Clone)]
struct SplineCoords {
    values: Vec<f64>,
    second: Vec<f64>,
}

impl ParametricCurve {
    /// Knot parameters: non-decreasing, first 0, last 1
    pub fn parameters(&self) -> &[f64] {
        &self.t
    }

    /// Roughness weight the fit settled on
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Summed squared x and y residuals at the knots
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Curve position at `t` (clamped to `[0, 1]`)
    pub fn evaluate(&self, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        let last = self.t.len() - 2;
        let i = self.t.partition_point(|&k| k <= t).saturating_sub(1).min(last);

        let h = self.t[i + 1] - self.t[i];
        let a = t - self.t[i];
        let b = self.t[i + 1] - t;
        let eval = |s: &SplineCoords| {
            (a * s.values[i + 1] + b * s.values[i]) / h
                - a * b / 6.0 * ((1.0 + a / h) * s.second[i + 1] + (1.0 + b / h) * s.second[i])
        };
        Point::new(eval(&self.x), eval(&self.y))
    }

    /// `n` points at uniformly spaced parameters covering `[0, 1]`
    pub fn resample(&self, n: usize) -> Vec<Point> {
        match n {
            0 => Vec::new(),
            1 => vec![self.evaluate(0.0)],
            _ => (0..n)
                .map(|k| self.evaluate(k as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}

/// Fit a smoothing curve through `points`.
///
/// Repeated points are dropped, keeping the first occurrence so the traversal
/// order survives.
pub fn fit_parametric_curve(points: &[Point], smoothness: f64) -> Result<ParametricCurve, CurveError> {
    let mut seen = HashSet::with_capacity(points.len());
    let distinct: Vec<Point> = points
        .iter()
        .copied()
        .filter(|p| seen.insert((p.x.to_bits(), p.y.to_bits())))
        .collect();

    if distinct.len() < MIN_CURVE_POINTS {
        return Err(CurveError::InsufficientPoints {
            found: distinct.len(),
            required: MIN_CURVE_POINTS,
        });
    }

    let mut arc = Vec::with_capacity(distinct.len());
    let mut total = 0.0;
    arc.push(0.0);
    for w in distinct.windows(2) {
        total += w[0].distance(w[1]);
        arc.push(total);
    }
    if !(total > 0.0) || !total.is_finite() {
        return Err(CurveError::DegenerateCurve);
    }

    let n = distinct.len();
    let mut t: Vec<f64> = arc.iter().map(|s| s / total).collect();
    t[n - 1] = 1.0;

    let h: Vec<f64> = t.windows(2).map(|w| w[1] - w[0]).collect();
    if let Some(pivot) = h.iter().position(|&d| !(d > 0.0)) {
        return Err(CurveError::SingularFit { pivot });
    }

    let xs: Vec<f64> = distinct.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = distinct.iter().map(|p| p.y).collect();
    let system = SmoothingSystem::new(&h, &xs, &ys);

    let alpha = if smoothness <= 0.0 {
        0.0
    } else {
        system.choose_alpha(smoothness)
    };
    let fit = system.solve(alpha)?;

    Ok(ParametricCurve {
        t,
        x: fit.x,
        y: fit.y,
        alpha,
        residual: fit.residual,
    })
}

struct Fit {
    x: SplineCoords,
    y: SplineCoords,
    residual: f64,
}

/// Band storage of `R`, `QᵀQ` and the right-hand sides `Qᵀx`, `Qᵀy`
struct SmoothingSystem<'a> {
    h: &'a [f64],
    xs: &'a [f64],
    ys: &'a [f64],
    r0: Vec<f64>,
    r1: Vec<f64>,
    qq0: Vec<f64>,
    qq1: Vec<f64>,
    qq2: Vec<f64>,
    qtx: Vec<f64>,
    qty: Vec<f64>,
}

impl<'a> SmoothingSystem<'a> {
    fn new(h: &'a [f64], xs: &'a [f64], ys: &'a [f64]) -> Self {
        let m = h.len() - 1;
        let q = |a: usize| {
            (
                1.0 / h[a],
                -1.0 / h[a] - 1.0 / h[a + 1],
                1.0 / h[a + 1],
            )
        };

        let r0 = (0..m).map(|a| (h[a] + h[a + 1]) / 3.0).collect();
        let r1 = (0..m.saturating_sub(1)).map(|a| h[a + 1] / 6.0).collect();

        let qq0 = (0..m)
            .map(|a| {
                let (q0, q1, q2) = q(a);
                q0 * q0 + q1 * q1 + q2 * q2
            })
            .collect();
        let qq1 = (0..m.saturating_sub(1))
            .map(|a| {
                let (_, q1, q2) = q(a);
                let (n0, n1, _) = q(a + 1);
                q1 * n0 + q2 * n1
            })
            .collect();
        let qq2 = (0..m.saturating_sub(2))
            .map(|a| q(a).2 * q(a + 2).0)
            .collect();

        let qt = |v: &[f64]| -> Vec<f64> {
            (0..m)
                .map(|a| {
                    let (q0, q1, q2) = q(a);
                    q0 * v[a] + q1 * v[a + 1] + q2 * v[a + 2]
                })
                .collect()
        };

        Self {
            h,
            xs,
            ys,
            r0,
            r1,
            qq0,
            qq1,
            qq2,
            qtx: qt(xs),
            qty: qt(ys),
        }
    }

    /// Bisect on log α for the largest tested α whose residual stays within
    /// `smoothness`
    fn choose_alpha(&self, smoothness: f64) -> f64 {
        let within = |log_alpha: f64| {
            self.solve(10f64.powf(log_alpha))
                .map(|fit| fit.residual <= smoothness)
                .unwrap_or(false)
        };

        if within(LOG_ALPHA_MAX) {
            return 10f64.powf(LOG_ALPHA_MAX);
        }
        let (mut lo, mut hi) = (LOG_ALPHA_MIN, LOG_ALPHA_MAX);
        for _ in 0..BISECTION_STEPS {
            let mid = 0.5 * (lo + hi);
            if within(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        10f64.powf(lo)
    }

    fn solve(&self, alpha: f64) -> Result<Fit, CurveError> {
        let m = self.r0.len();
        let b0: Vec<f64> = (0..m).map(|a| self.r0[a] + alpha * self.qq0[a]).collect();
        let b1: Vec<f64> = (0..m.saturating_sub(1))
            .map(|a| self.r1[a] + alpha * self.qq1[a])
            .collect();
        let b2: Vec<f64> = self.qq2.iter().map(|v| alpha * v).collect();

        let ldl = BandedLdl::factor(&b0, &b1, &b2)?;
        let x = self.coords(alpha, self.xs, ldl.solve(&self.qtx));
        let y = self.coords(alpha, self.ys, ldl.solve(&self.qty));

        let residual = self
            .xs
            .iter()
            .zip(&x.values)
            .chain(self.ys.iter().zip(&y.values))
            .map(|(v, g)| (v - g) * (v - g))
            .sum();

        Ok(Fit { x, y, residual })
    }

    /// `g = v − α Q γ`, with γ padded by the natural end conditions
    fn coords(&self, alpha: f64, v: &[f64], gamma: Vec<f64>) -> SplineCoords {
        let h = self.h;
        let mut values = v.to_vec();
        for (a, &g) in gamma.iter().enumerate() {
            let q0 = 1.0 / h[a];
            let q2 = 1.0 / h[a + 1];
            values[a] -= alpha * q0 * g;
            values[a + 1] -= alpha * (-q0 - q2) * g;
            values[a + 2] -= alpha * q2 * g;
        }

        let mut second = Vec::with_capacity(gamma.len() + 2);
        second.push(0.0);
        second.extend(gamma);
        second.push(0.0);
        SplineCoords { values, second }
    }
}

/// LDLᵀ factorization of a symmetric pentadiagonal matrix given by its main,
/// first and second diagonals
struct BandedLdl {
    d: Vec<f64>,
    l1: Vec<f64>,
    l2: Vec<f64>,
}

impl BandedLdl {
    fn factor(b0: &[f64], b1: &[f64], b2: &[f64]) -> Result<Self, CurveError> {
        let m = b0.len();
        let mut d = vec![0.0; m];
        let mut l1 = vec![0.0; m.saturating_sub(1)];
        let mut l2 = vec![0.0; m.saturating_sub(2)];

        for i in 0..m {
            let mut di = b0[i];
            if i >= 1 {
                di -= l1[i - 1] * l1[i - 1] * d[i - 1];
            }
            if i >= 2 {
                di -= l2[i - 2] * l2[i - 2] * d[i - 2];
            }
            if !(di > 0.0) || !di.is_finite() {
                return Err(CurveError::SingularFit { pivot: i });
            }
            d[i] = di;

            if i + 1 < m {
                let mut v = b1[i];
                if i >= 1 {
                    v -= l2[i - 1] * l1[i - 1] * d[i - 1];
                }
                l1[i] = v / di;
            }
            if i + 2 < m {
                l2[i] = b2[i] / di;
            }
        }

        Ok(Self { d, l1, l2 })
    }

    fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let m = self.d.len();
        let mut z = rhs.to_vec();
        for i in 0..m {
            if i >= 1 {
                z[i] -= self.l1[i - 1] * z[i - 1];
            }
            if i >= 2 {
                z[i] -= self.l2[i - 2] * z[i - 2];
            }
        }
        for (zi, di) in z.iter_mut().zip(&self.d) {
            *zi /= di;
        }
        for i in (0..m).rev() {
            if i + 1 < m {
                z[i] -= self.l1[i] * z[i + 1];
            }
            if i + 2 < m {
                z[i] -= self.l2[i] * z[i + 2];
            }
        }
        z
    }
}
