//! Self-energy `Σ(iv)` tabulated on a fermionic grid.

use std::convert::TryFrom;
use num::Zero;
use super::data::{Complex64, DataContainer};
use super::frequency_grid::FrequencyGrid;
use super::interpolation::Spline;
use super::utils::{is_finite, sgn, Toler};

quick_error! {
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Error {
        Causality(v: f64, value: Complex64) {
            display("self-energy violates causality at v = {}: {}", v, value)
        }
        NonFinite(v: f64) {
            display("self-energy is not finite at v = {}", v)
        }
    }
}

/// Tabulated self-energy plus its value beyond the grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSelfEnergy", into = "RawSelfEnergy")]
pub struct SelfEnergy {
    asymptotic: Complex64,
    spline: Spline,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawSelfEnergy {
    asymptotic: Complex64,
    grid: FrequencyGrid,
    data: DataContainer,
}

impl TryFrom<RawSelfEnergy> for SelfEnergy {
    type Error = String;
    fn try_from(raw: RawSelfEnergy) -> Result<Self, Self::Error> {
        if raw.data.rank() != 3 || raw.data.dims()[1] != raw.grid.len() {
            return Err(format!("inconsistent self-energy shape {:?}",
                               raw.data.dims()));
        }
        Ok(SelfEnergy {
            asymptotic: raw.asymptotic,
            spline: Spline::fit(&raw.data, &[raw.grid]),
        })
    }
}

impl From<SelfEnergy> for RawSelfEnergy {
    fn from(s: SelfEnergy) -> Self {
        RawSelfEnergy {
            asymptotic: s.asymptotic,
            grid: s.grid().clone(),
            data: s.data().clone(),
        }
    }
}

impl SelfEnergy {
    /// Frequency-independent self-energy.
    pub fn constant(grid: &FrequencyGrid, n_in: usize, value: Complex64) -> Self {
        Self::from_fn(grid, n_in, value, |_, _| value)
    }

    pub fn from_fn<F>(grid: &FrequencyGrid, n_in: usize, asymptotic: Complex64,
                      mut f: F) -> Self
        where F: FnMut(usize, f64) -> Complex64
    {
        let data = DataContainer::from_fn(&[1, grid.len(), n_in], |i| {
            f(i[2], grid.frequency(i[1]))
        });
        Self {
            asymptotic,
            spline: Spline::fit(&data, &[grid.clone()]),
        }
    }

    pub fn grid(&self) -> &FrequencyGrid {
        &self.spline.grids()[0]
    }

    pub fn data(&self) -> &DataContainer {
        self.spline.data()
    }

    pub fn n_in(&self) -> usize {
        self.data().dims()[2]
    }

    pub fn asymptotic(&self) -> Complex64 {
        self.asymptotic
    }

    pub fn set_asymptotic(&mut self, value: Complex64) {
        self.asymptotic = value;
    }

    /// Replace the tabulated data; the spline is refitted.
    pub fn set_data(&mut self, data: DataContainer) {
        let grid = self.grid().clone();
        self.spline = Spline::fit(&data, &[grid]);
    }

    pub fn value(&self, i_in: usize, v: f64) -> Complex64 {
        if self.grid().contains(v) {
            self.spline.value(0, i_in, &[v])
        } else {
            self.asymptotic
        }
    }

    /// `self ← self + α other` without refitting.  The grids must agree.
    pub fn add_scaled(&mut self, alpha: f64, other: &Self) {
        self.asymptotic += other.asymptotic * alpha;
        self.spline.add_scaled(alpha, &other.spline);
    }

    /// `self ← α self`
    pub fn scale(&mut self, alpha: f64) {
        self.asymptotic *= alpha;
        self.spline.scale(alpha);
    }

    pub fn max_norm(&self) -> f64 {
        f64::max(self.asymptotic.norm(), self.data().max_norm())
    }

    pub fn max_distance(&self, other: &Self) -> f64 {
        f64::max((self.asymptotic - other.asymptotic).norm(),
                 self.data().max_distance(other.data()))
    }

    pub fn all_finite(&self) -> bool {
        is_finite(self.asymptotic) && self.data().all_finite()
    }

    /// Check `sgn(v) Im Σ(iv) ≤ 0` at every grid point, up to
    /// `abserr + relerr ‖Σ‖`.
    pub fn check_causality(&self, toler: Toler) -> Result<(), Error> {
        let margin = toler.abserr + toler.relerr * self.max_norm();
        let grid = self.grid();
        for i in 0..grid.len() {
            let v = grid.frequency(i);
            for i_in in 0..self.n_in() {
                let value = self.data().at(&[0, i, i_in]);
                if !is_finite(value) {
                    return Err(Error::NonFinite(v));
                }
                if sgn(v) * value.im > margin {
                    return Err(Error::Causality(v, value));
                }
            }
        }
        if !is_finite(self.asymptotic) {
            return Err(Error::NonFinite(f64::INFINITY));
        }
        Ok(())
    }

    /// Same function on another grid.
    pub fn retabulate(&self, grid: &FrequencyGrid) -> Self {
        Self::from_fn(grid, self.n_in(), self.asymptotic, |i_in, v| self.value(i_in, v))
    }

    /// Same grid, all zero.
    pub fn zeros_like(&self) -> Self {
        Self::constant(self.grid(), self.n_in(), Complex64::zero())
    }

    /// Summed squared second derivative in the grid coordinate.
    pub fn curvature(&self) -> f64 {
        self.spline.curvature(0)
    }
}

#[cfg(test)]
mod tests {
    use num::Complex;
    use super::*;
    use super::super::frequency_grid::{GridKind, Transform};

    fn grid() -> FrequencyGrid {
        FrequencyGrid::new(GridKind::Fermionic, Transform::Sqrt, 21, 100.0, 1.0)
    }

    #[test]
    fn test_asymptotic() {
        let sigma = SelfEnergy::constant(&grid(), 1, Complex::new(0.5, 0.0));
        assert_eq!(sigma.value(0, 1e3), Complex::new(0.5, 0.0));
        assert!((sigma.value(0, 3.3) - Complex::new(0.5, 0.0)).norm() < 1e-14);
    }

    #[test]
    fn test_causality() {
        let causal = SelfEnergy::from_fn(&grid(), 1, Complex::zero(), |_, v| {
            Complex::new(0.5, -v / (1.0 + v * v))
        });
        let strict = Toler { relerr: 1e-12, abserr: 0.0 };
        causal.check_causality(strict).unwrap();
        let mut acausal = causal.clone();
        acausal.scale(-1.0);
        match acausal.check_causality(strict) {
            Err(Error::Causality(v, _)) => assert!(v != 0.0),
            r => panic!("unexpected: {:?}", r),
        }
        let mut broken = causal.clone();
        let mut data = broken.data().clone();
        data.set(&[0, 3, 0], Complex::new(f64::NAN, 0.0));
        broken.set_data(data);
        assert!(!broken.all_finite());
        match broken.check_causality(strict) {
            Err(Error::NonFinite(_)) => {}
            r => panic!("unexpected: {:?}", r),
        }
    }

    #[test]
    fn test_causality_margin() {
        // wrong sign far out, at the level of the integration error
        let sigma = SelfEnergy::from_fn(&grid(), 1, Complex::zero(), |_, v| {
            Complex::new(0.5, -v / (1.0 + v * v) + 0.02 * v.signum())
        });
        match sigma.check_causality(Toler { relerr: 1e-6, abserr: 1e-8 }) {
            Err(Error::Causality(v, _)) => assert!(v.abs() > 10.0),
            r => panic!("unexpected: {:?}", r),
        }
        sigma.check_causality(Toler { relerr: 0.1, abserr: 0.0 }).unwrap();
    }

    #[test]
    fn test_arithmetic() {
        let a = SelfEnergy::constant(&grid(), 1, Complex::new(1.0, -1.0));
        let mut b = a.clone();
        b.add_scaled(-2.0, &a);
        assert_eq!(b.asymptotic(), Complex::new(-1.0, 1.0));
        assert_eq!(b.max_distance(&a), Complex::new(2.0, -2.0).norm());
        let c = a.retabulate(&FrequencyGrid::new(
            GridKind::Fermionic, Transform::Sqrt, 11, 50.0, 2.0));
        assert_eq!(c.grid().len(), 11);
        assert!((c.value(0, 0.7) - a.value(0, 0.7)).norm() < 1e-12);
    }
}
