//! Nonuniform frequency grids.
//!
//! A grid is uniform in an auxiliary coordinate `t ∈ (−1, 1)` and maps onto
//! physical frequencies `w` through a monotone transform that concentrates
//! points around `|w| ≲ W`, where `W` is the scale of the grid.  All grids
//! are symmetric around zero and have an odd number of points, so that
//! `w = 0` is a grid point and the index `i` mirrors onto `N − 1 − i`.

use std::f64;
use super::utils::{cast, sgn, Toler};

quick_error! {
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Error {
        OutOfRange(w: f64, lower: f64, upper: f64) {
            display("frequency {} outside of grid range [{}, {}]",
                    w, lower, upper)
        }
        NotInvertible(w: f64, w_back: f64) {
            display("grid transform is not invertible: {} -> {}", w, w_back)
        }
    }
}

/// Whether a grid carries bosonic (transfer) or fermionic frequencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    Bosonic,
    Fermionic,
}

/// Coordinate transform `t(w)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// ```text
    /// t = w / √(W² + w²)
    /// w = W t / √(1 − t²)
    /// ```
    Algebraic,
    /// ```text
    /// t = 2w / (W + √(4w² + W²))
    /// w = W t / (1 − t²)
    /// ```
    Rational,
    /// ```text
    /// t = sgn(w) √(|w| / (|w| + W))
    /// w = W sgn(t) t² / (1 − t²)
    /// ```
    Sqrt,
    /// ```text
    /// t = sgn(w) √((√(w⁴ + 4w²W²) − w²) / 2) / W
    /// w = W t |t| / √(1 − t²)
    /// ```
    Quartic,
}

impl Default for Transform {
    fn default() -> Self {
        Transform::Sqrt
    }
}

impl Transform {
    pub fn to_grid(self, w: f64, scale: f64) -> f64 {
        match self {
            Transform::Algebraic => w / (scale * scale + w * w).sqrt(),
            Transform::Rational => {
                2.0 * w / (scale + (4.0 * w * w + scale * scale).sqrt())
            }
            Transform::Sqrt => sgn(w) * (w.abs() / (w.abs() + scale)).sqrt(),
            Transform::Quartic => {
                let w2 = w * w;
                // √(w⁴ + 4w²W²) − w² without cancellation
                let r = 4.0 * w2 * scale * scale
                    / ((w2 * w2 + 4.0 * w2 * scale * scale).sqrt() + w2);
                if w2 == 0.0 {
                    0.0
                } else {
                    sgn(w) * (r / 2.0).sqrt() / scale
                }
            }
        }
    }

    pub fn from_grid(self, t: f64, scale: f64) -> f64 {
        match self {
            Transform::Algebraic => scale * t / (1.0 - t * t).sqrt(),
            Transform::Rational => scale * t / (1.0 - t * t),
            Transform::Sqrt => scale * sgn(t) * t * t / (1.0 - t * t),
            Transform::Quartic => scale * t * t.abs() / (1.0 - t * t).sqrt(),
        }
    }
}

/// Parameters from which grids are re-derived at each flow parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConf {
    /// Number of points (odd, at least 5).
    pub n: usize,
    /// Scale `W` in units of the characteristic energy of the model.
    pub scale_factor: f64,
    /// Upper bound in units of `W`.
    pub upper_factor: f64,
}

/// `{ n: 31, scale_factor: 1.0, upper_factor: 50.0 }`
impl Default for GridConf {
    fn default() -> Self {
        Self {
            n: 31,
            scale_factor: 1.0,
            upper_factor: 50.0,
        }
    }
}

impl GridConf {
    pub fn with_n(n: usize) -> Self {
        Self { n, ..Default::default() }
    }

    pub fn is_valid(&self) -> bool {
        self.n >= 5 && self.n % 2 == 1
            && self.scale_factor > 0.0
            && self.upper_factor > 1.0
    }

    /// Guess grid parameters from the characteristic energy scale of the
    /// model at the current flow parameter.
    pub fn guess_essential_parameters(
        &self,
        kind: GridKind,
        transform: Transform,
        characteristic_scale: f64,
    ) -> FrequencyGrid {
        let scale = self.scale_factor * characteristic_scale;
        FrequencyGrid::new(kind, transform, self.n,
                           self.upper_factor * scale, scale)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGrid {
    kind: GridKind,
    transform: Transform,
    scale: f64,
    w_upper: f64,
    t_upper: f64,
    spacing: f64,
    ws: Vec<f64>,
    ts: Vec<f64>,
}

impl FrequencyGrid {
    /// Symmetric grid on `[−w_upper, w_upper]` with `n` points.
    pub fn new(
        kind: GridKind,
        transform: Transform,
        n: usize,
        w_upper: f64,
        scale: f64,
    ) -> Self {
        assert!(n >= 3 && n % 2 == 1, "grid size must be odd: {}", n);
        assert!(w_upper > 0.0 && scale > 0.0);
        let mid = n / 2;
        let t_upper = transform.to_grid(w_upper, scale);
        let spacing = t_upper / mid as f64;
        let mut ts = vec![0.0; n];
        let mut ws = vec![0.0; n];
        for i in 1..mid + 1 {
            let t = if i == mid { t_upper } else { i as f64 * spacing };
            let w = if i == mid { w_upper } else { transform.from_grid(t, scale) };
            ts[mid + i] = t;
            ts[mid - i] = -t;
            ws[mid + i] = w;
            ws[mid - i] = -w;
        }
        Self { kind, transform, scale, w_upper, t_upper, spacing, ws, ts }
    }

    pub fn kind(&self) -> GridKind {
        self.kind
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn len(&self) -> usize {
        self.ws.len()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn w_lower(&self) -> f64 {
        -self.w_upper
    }

    pub fn w_upper(&self) -> f64 {
        self.w_upper
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Physical frequencies of all grid points.
    pub fn frequencies(&self) -> &[f64] {
        &self.ws
    }

    /// Auxiliary coordinates of all grid points.
    pub fn coordinates(&self) -> &[f64] {
        &self.ts
    }

    pub fn frequency(&self, i: usize) -> f64 {
        self.ws[i]
    }

    /// Index of the point mirrored at zero frequency.
    pub fn mirror(&self, i: usize) -> usize {
        self.len() - 1 - i
    }

    pub fn to_grid(&self, w: f64) -> f64 {
        self.transform.to_grid(w, self.scale)
    }

    pub fn from_grid(&self, t: f64) -> f64 {
        self.transform.from_grid(t, self.scale)
    }

    pub fn contains(&self, w: f64) -> bool {
        w.abs() <= self.w_upper * (1.0 + 1e-12)
    }

    /// Index of the grid point closest to `w` (measured in `t`).
    pub fn nearest_index(&self, w: f64) -> Result<usize, Error> {
        if !self.contains(w) {
            return Err(Error::OutOfRange(w, self.w_lower(), self.w_upper));
        }
        let x = self.fractional_index(w).round();
        Ok(self.clamp_index(x as isize, self.len() - 1))
    }

    /// Lower index of the interval containing `w`, clamped to `[0, N − 2]`.
    pub fn get_grid_index(&self, w: f64) -> usize {
        let x = self.fractional_index(w);
        let r = x.round();
        // grid points must land on their own index despite rounding
        let x = if (x - r).abs() < 1e-9 { r } else { x.floor() };
        self.clamp_index(x as isize, self.len() - 2)
    }

    fn fractional_index(&self, w: f64) -> f64 {
        (self.to_grid(w) + self.t_upper) / self.spacing
    }

    fn clamp_index(&self, i: isize, max: usize) -> usize {
        if i < 0 {
            0
        } else {
            usize::min(cast(i), max)
        }
    }

    /// Same grid with a different scale `W` (and proportional bounds).
    pub fn with_scale(&self, scale: f64) -> Self {
        let upper_factor = self.w_upper / self.scale;
        Self::new(self.kind, self.transform, self.len(),
                  upper_factor * scale, scale)
    }

    /// Check that `w → t → w` reproduces every grid point and every
    /// interval midpoint.
    pub fn check_invertibility(&self) -> Result<(), Error> {
        let toler = Toler { relerr: 1e-10, abserr: 1e-14 * self.scale };
        let n = self.len();
        for i in 0..n {
            let mut ws = vec![self.ws[i]];
            if i + 1 < n {
                ws.push(0.5 * (self.ws[i] + self.ws[i + 1]));
            }
            for w in ws {
                let w_back = self.from_grid(self.to_grid(w));
                if !toler.is_eq(w, w_back) {
                    return Err(Error::NotInvertible(w, w_back));
                }
            }
        }
        Ok(())
    }

    /// Choose the scale `W` in `[lower, upper]` that minimizes `cost` by
    /// golden-section search.
    pub fn optimize_scale<F>(
        &self,
        lower: f64,
        upper: f64,
        iterations: usize,
        mut cost: F,
    ) -> Self
        where F: FnMut(&FrequencyGrid) -> f64
    {
        let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
        let (mut a, mut b) = (lower, upper);
        let mut c = b - ratio * (b - a);
        let mut d = a + ratio * (b - a);
        let mut fc = cost(&self.with_scale(c));
        let mut fd = cost(&self.with_scale(d));
        for _ in 0..iterations {
            if fc < fd {
                b = d;
                d = c;
                fd = fc;
                c = b - ratio * (b - a);
                fc = cost(&self.with_scale(c));
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + ratio * (b - a);
                fd = cost(&self.with_scale(d));
            }
        }
        self.with_scale(0.5 * (a + b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSFORMS: [Transform; 4] = [
        Transform::Algebraic,
        Transform::Rational,
        Transform::Sqrt,
        Transform::Quartic,
    ];

    #[test]
    fn test_invertibility() {
        let toler = Toler { relerr: 1e-10, abserr: 0.0 };
        for &transform in &TRANSFORMS {
            let grid = FrequencyGrid::new(
                GridKind::Fermionic, transform, 51, 300.0, 3.0);
            grid.check_invertibility().unwrap();
            let n = 2000;
            for k in 0..n + 1 {
                let w = grid.w_lower()
                    + (grid.w_upper() - grid.w_lower()) * k as f64 / n as f64;
                let w_back = grid.from_grid(grid.to_grid(w));
                if w == 0.0 {
                    assert_eq!(w_back, 0.0);
                } else {
                    toler_assert_eq!(toler, w_back, w);
                }
            }
        }
    }

    #[test]
    fn test_symmetric_and_monotone() {
        for &transform in &TRANSFORMS {
            let grid = FrequencyGrid::new(
                GridKind::Bosonic, transform, 21, 40.0, 0.5);
            let ws = grid.frequencies();
            assert_eq!(ws[10], 0.0);
            assert_eq!(ws[0], -40.0);
            assert_eq!(ws[20], 40.0);
            for i in 0..ws.len() {
                assert_eq!(ws[i], -ws[grid.mirror(i)]);
                if i > 0 {
                    assert!(ws[i] > ws[i - 1]);
                }
            }
        }
    }

    #[test]
    fn test_indices() {
        let grid = FrequencyGrid::new(
            GridKind::Fermionic, Transform::Rational, 11, 10.0, 1.0);
        for i in 0..grid.len() {
            let w = grid.frequency(i);
            assert_eq!(grid.nearest_index(w).unwrap(), i);
            assert_eq!(grid.get_grid_index(w), usize::min(i, grid.len() - 2));
        }
        let mid = 0.5 * (grid.frequency(3) + grid.frequency(4));
        assert_eq!(grid.get_grid_index(mid), 3);
        assert_eq!(grid.nearest_index(11.0),
                   Err(Error::OutOfRange(11.0, -10.0, 10.0)));
        assert_eq!(grid.get_grid_index(-1e3), 0);
    }

    #[test]
    fn test_guess_essential_parameters() {
        let conf = GridConf { n: 15, scale_factor: 2.0, upper_factor: 40.0 };
        let grid = conf.guess_essential_parameters(
            GridKind::Bosonic, Transform::Sqrt, 1.5);
        assert_eq!(grid.len(), 15);
        assert_eq!(grid.scale(), 3.0);
        assert_eq!(grid.w_upper(), 120.0);
        let rescaled = grid.with_scale(1.0);
        assert_eq!(rescaled.w_upper(), 40.0);
    }

    #[test]
    fn test_optimize_scale() {
        let grid = FrequencyGrid::new(
            GridKind::Fermionic, Transform::Rational, 11, 10.0, 1.0);
        let best = grid.optimize_scale(0.1, 10.0, 60, |g| {
            (g.scale() - 2.5).powi(2)
        });
        toler_assert_eq!(Toler { relerr: 1e-6, abserr: 0.0 },
                         best.scale(), 2.5);
    }
}
