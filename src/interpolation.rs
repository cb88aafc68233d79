//! Natural cubic splines on frequency grids.
//!
//! Tabulated data live in a [`DataContainer`](../data/struct.DataContainer.html)
//! with the layout `[spin, frequency axes …, internal]`.  The number of
//! frequency axes is the [`Rank`](enum.Rank.html) of the spline.  All ranks
//! share one contract: `value` reproduces the table at grid points and
//! `derivative` returns partial derivatives up to second order with respect
//! to the grid coordinates `t`.
//!
//! Higher ranks are tensor products of the one-dimensional natural spline.
//! Besides the data `f`, a rank-`d` spline stores the `2^d − 1` arrays of
//! mixed second derivatives (`∂²f/∂x²`, `∂²f/∂y²`, `∂⁴f/∂x²∂y²`, …) obtained
//! by solving the spline equations successively along each axis.

use num::Zero;
use super::data::{Complex64, DataContainer};
use super::frequency_grid::FrequencyGrid;

/// Number of frequency arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    One,
    Two,
    Three,
}

impl Rank {
    pub fn from_count(n: usize) -> Option<Rank> {
        match n {
            1 => Some(Rank::One),
            2 => Some(Rank::Two),
            3 => Some(Rank::Three),
            _ => None,
        }
    }

    pub fn count(self) -> usize {
        match self {
            Rank::One => 1,
            Rank::Two => 2,
            Rank::Three => 3,
        }
    }
}

/// Replace `values` by the second derivatives of the natural cubic spline
/// through `(knots[i], values[i])`.
///
/// ```text
/// h[i−1]/6 M[i−1] + (h[i−1] + h[i])/3 M[i] + h[i]/6 M[i+1]
///     = (f[i+1] − f[i])/h[i] − (f[i] − f[i−1])/h[i−1]
/// M[0] = M[n−1] = 0
/// ```
pub fn natural_second_derivatives(knots: &[f64], values: &mut [Complex64]) {
    let n = knots.len();
    assert_eq!(n, values.len());
    if n < 3 {
        for v in values.iter_mut() {
            *v = Complex64::zero();
        }
        return;
    }
    // Thomas algorithm on the interior unknowns M[1] … M[n−2]
    let mut diag = vec![0.0; n];
    let mut rhs = vec![Complex64::zero(); n];
    let mut upper = vec![0.0; n];
    for i in 1..n - 1 {
        let h0 = knots[i] - knots[i - 1];
        let h1 = knots[i + 1] - knots[i];
        let lower = h0 / 6.0;
        let mut d = (h0 + h1) / 3.0;
        let mut r = (values[i + 1] - values[i]) / h1
            - (values[i] - values[i - 1]) / h0;
        if i > 1 {
            let m = lower / diag[i - 1];
            d -= m * upper[i - 1];
            r -= rhs[i - 1] * m;
        }
        diag[i] = d;
        upper[i] = h1 / 6.0;
        rhs[i] = r;
    }
    values[n - 1] = Complex64::zero();
    for i in (1..n - 1).rev() {
        values[i] = (rhs[i] - values[i + 1] * upper[i]) / diag[i];
    }
    values[0] = Complex64::zero();
}

fn second_derivatives_along(
    data: &DataContainer,
    axis: usize,
    knots: &[f64],
) -> DataContainer {
    let mut out = data.clone();
    out.map_lines(axis, |line| natural_second_derivatives(knots, line));
    out
}

fn fit_1d(data: &DataContainer, knots: &[&[f64]]) -> Vec<DataContainer> {
    let mx = second_derivatives_along(data, 1, knots[0]);
    vec![data.clone(), mx]
}

fn fit_2d(data: &DataContainer, knots: &[&[f64]]) -> Vec<DataContainer> {
    let mx = second_derivatives_along(data, 1, knots[0]);
    let my = second_derivatives_along(data, 2, knots[1]);
    let mxy = second_derivatives_along(&mx, 2, knots[1]);
    vec![data.clone(), mx, my, mxy]
}

fn fit_3d(data: &DataContainer, knots: &[&[f64]]) -> Vec<DataContainer> {
    let mx = second_derivatives_along(data, 1, knots[0]);
    let my = second_derivatives_along(data, 2, knots[1]);
    let mz = second_derivatives_along(data, 3, knots[2]);
    let mxy = second_derivatives_along(&mx, 2, knots[1]);
    let mxz = second_derivatives_along(&mx, 3, knots[2]);
    let myz = second_derivatives_along(&my, 3, knots[2]);
    let mxyz = second_derivatives_along(&mxy, 3, knots[2]);
    // bit k of the position selects the second derivative along axis k
    vec![data.clone(), mx, my, mxy, mz, mxz, myz, mxyz]
}

/// Weights of the four cubic basis functions on one interval:
/// `[value at j, value at j+1, M at j, M at j+1]`.
fn basis_weights(t: f64, t0: f64, t1: f64, order: u8) -> [f64; 4] {
    let h = t1 - t0;
    let a = (t1 - t) / h;
    let b = 1.0 - a;
    match order {
        0 => [a, b,
              (a * a * a - a) * h * h / 6.0,
              (b * b * b - b) * h * h / 6.0],
        1 => [-1.0 / h, 1.0 / h,
              -(3.0 * a * a - 1.0) * h / 6.0,
              (3.0 * b * b - 1.0) * h / 6.0],
        2 => [0.0, 0.0, a, b],
        _ => panic!("derivatives above second order are not supported"),
    }
}

/// Tensor-product natural cubic spline over the frequency axes of a data
/// container.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Spline {
    rank: Rank,
    grids: Vec<FrequencyGrid>,
    coeffs: Vec<DataContainer>,
    strides: Vec<usize>,
    n_in: usize,
}

/// Splines are equal if they interpolate the same data on the same grids.
/// The derived coefficients may differ by rounding.
impl PartialEq for Spline {
    fn eq(&self, other: &Self) -> bool {
        self.grids == other.grids && self.data() == other.data()
    }
}

impl Spline {
    /// Fit the spline once; the result stays valid until `data` changes.
    pub fn fit(data: &DataContainer, grids: &[FrequencyGrid]) -> Self {
        let rank = Rank::from_count(grids.len())
            .expect("spline rank must be 1, 2 or 3");
        assert_eq!(data.rank(), grids.len() + 2, "unexpected data layout");
        for (k, grid) in grids.iter().enumerate() {
            assert_eq!(data.dims()[k + 1], grid.len(), "grid size mismatch");
        }
        let knots: Vec<&[f64]> = grids.iter().map(|g| g.coordinates()).collect();
        let coeffs = match rank {
            Rank::One => fit_1d(data, &knots),
            Rank::Two => fit_2d(data, &knots),
            Rank::Three => fit_3d(data, &knots),
        };
        let strides = (0..data.rank()).map(|axis| data.stride(axis)).collect();
        Self {
            rank,
            grids: grids.to_vec(),
            coeffs,
            strides,
            n_in: data.dims()[data.rank() - 1],
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn grids(&self) -> &[FrequencyGrid] {
        &self.grids
    }

    /// Tabulated data the spline was fitted to.
    pub fn data(&self) -> &DataContainer {
        &self.coeffs[0]
    }

    /// `self ← self + α other` on the data and all coefficients, which
    /// depend linearly on the data.  Both splines must share their grids.
    pub fn add_scaled(&mut self, alpha: f64, other: &Self) {
        assert!(self.grids == other.grids, "grid mismatch");
        for (c, o) in self.coeffs.iter_mut().zip(&other.coeffs) {
            c.add_scaled(alpha, o);
        }
    }

    /// `self ← α self`
    pub fn scale(&mut self, alpha: f64) {
        for c in &mut self.coeffs {
            c.scale(alpha);
        }
    }

    /// Whether all frequencies lie within the grids.
    pub fn contains(&self, freqs: &[f64]) -> bool {
        self.grids.iter().zip(freqs).all(|(g, &w)| g.contains(w))
    }

    pub fn value(&self, spin: usize, i_in: usize, freqs: &[f64]) -> Complex64 {
        match self.rank {
            Rank::One => self.eval(spin, i_in, freqs, &[0]),
            Rank::Two => self.eval(spin, i_in, freqs, &[0, 0]),
            Rank::Three => self.eval(spin, i_in, freqs, &[0, 0, 0]),
        }
    }

    /// Partial derivative with respect to the grid coordinates, `orders[k]`
    /// being the order (0, 1 or 2) along frequency axis `k`.
    pub fn derivative(
        &self,
        spin: usize,
        i_in: usize,
        freqs: &[f64],
        orders: &[u8],
    ) -> Complex64 {
        assert_eq!(orders.len(), self.rank.count());
        self.eval(spin, i_in, freqs, orders)
    }

    fn eval(
        &self,
        spin: usize,
        i_in: usize,
        freqs: &[f64],
        orders: &[u8],
    ) -> Complex64 {
        let d = self.rank.count();
        debug_assert_eq!(freqs.len(), d);
        let mut base = spin * self.strides[0] + i_in;
        let mut weights = [[0.0; 4]; 3];
        for k in 0..d {
            let grid = &self.grids[k];
            let j = grid.get_grid_index(freqs[k]);
            let ts = grid.coordinates();
            weights[k] = basis_weights(grid.to_grid(freqs[k]),
                                       ts[j], ts[j + 1], orders[k]);
            base += j * self.strides[k + 1];
        }
        debug_assert!(i_in < self.n_in);
        let mut result = Complex64::zero();
        for (mask, coeff) in self.coeffs.iter().enumerate() {
            let data = coeff.as_slice();
            for corner in 0..(1 << d) {
                let mut w = 1.0;
                let mut offset = base;
                for k in 0..d {
                    let is_m = (mask >> k) & 1;
                    let c = (corner >> k) & 1;
                    w *= weights[k][2 * is_m + c];
                    offset += c * self.strides[k + 1];
                }
                if w != 0.0 {
                    result += data[offset] * w;
                }
            }
        }
        result
    }

    /// Sum of squared second derivatives in `t` at the interval midpoints
    /// along frequency axis `axis`, for all spins and internal indices.
    pub fn curvature(&self, axis: usize) -> f64 {
        let d = self.rank.count();
        let data = self.data();
        let n_spin = data.dims()[0];
        let mut orders = vec![0u8; d];
        orders[axis] = 2;
        let mut points: Vec<Vec<f64>> = Vec::new();
        for k in 0..d {
            let ws = self.grids[k].frequencies();
            points.push(if k == axis {
                (0..ws.len() - 1).map(|i| {
                    let ts = self.grids[k].coordinates();
                    self.grids[k].from_grid(0.5 * (ts[i] + ts[i + 1]))
                }).collect()
            } else {
                ws.to_vec()
            });
        }
        let mut total = 0.0;
        let mut freqs = vec![0.0; d];
        let sizes: Vec<usize> = points.iter().map(|p| p.len()).collect();
        let count: usize = sizes.iter().product();
        for spin in 0..n_spin {
            for i_in in 0..self.n_in {
                for flat in 0..count {
                    let mut rest = flat;
                    for k in (0..d).rev() {
                        freqs[k] = points[k][rest % sizes[k]];
                        rest /= sizes[k];
                    }
                    total += self.derivative(spin, i_in, &freqs, &orders)
                        .norm_sqr();
                }
            }
        }
        total
    }
}
