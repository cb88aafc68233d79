//! Self-consistent Hartree self-energy `Σ_H = U n`.

use std::f64::consts::PI;
use num::Complex;
use super::frequency_grid::FrequencyGrid;
use super::propagator::{Model, Propagator, PropagatorKind, Regulator};
use super::quadrature;
use super::self_energy::SelfEnergy;
use super::utils::{Convergence, Toler};

quick_error! {
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Error {
        Quadrature(err: quadrature::Error) {
            from()
            source(err)
            display("filling integral failed: {}", err)
        }
    }
}

/// Filling per spin, `n = 1/2 + 1/π ∫[0, ∞) Re G(iv) dv`.
pub fn filling(
    g: &Propagator,
    quadrature: &quadrature::Conf,
    scale: f64,
) -> Result<f64, quadrature::Error> {
    let integral = quadrature.integrate_upper(
        |v| Complex::new(g.value(v, 0).re, 0.0),
        0.0,
        &[scale],
        scale,
    )?;
    if !integral.converged {
        warn!("filling integral not converged: {:?}", integral);
    }
    Ok(0.5 + integral.value.re / PI)
}

/// Hartree iteration with linear mixing.
#[derive(Clone, Copy, Debug)]
pub struct Conf {
    pub toler: Toler,
    pub max_iter: usize,
    pub mix: f64,
    pub quadrature: quadrature::Conf,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            toler: Toler { relerr: 1e-10, abserr: 1e-12 },
            max_iter: 200,
            mix: 1.0,
            quadrature: quadrature::Conf {
                relerr: 1e-11,
                abserr: 1e-14,
                max_subdivisions: 500,
            },
        }
    }
}

impl Conf {
    pub fn make_run(
        self,
        model: Model,
        regulator: Regulator,
        lambda: f64,
        grid: FrequencyGrid,
    ) -> Run {
        Run {
            conf: self,
            model,
            regulator,
            lambda,
            grid,
            hartree: 0.5 * model.u,
            filling: 0.5,
            change: f64::INFINITY,
        }
    }
}

pub struct Run {
    pub conf: Conf,
    pub model: Model,
    pub regulator: Regulator,
    pub lambda: f64,
    pub grid: FrequencyGrid,
    pub hartree: f64,
    pub filling: f64,
    pub change: f64,
}

impl Run {
    /// Constant self-energy at the current Hartree value.
    pub fn self_energy(&self) -> SelfEnergy {
        SelfEnergy::constant(&self.grid, 1, Complex::new(self.hartree, 0.0))
    }

    pub fn step(&mut self) -> Result<bool, Error> {
        let sigma = self.self_energy();
        let g = Propagator::new(PropagatorKind::Full, self.lambda, self.model,
                                self.regulator, &sigma);
        let scale = self.regulator.characteristic_scale(&self.model, self.lambda);
        self.filling = filling(&g, &self.conf.quadrature, scale)?;
        let new = self.model.u * self.filling;
        let old = self.hartree;
        self.hartree = (1.0 - self.conf.mix) * old + self.conf.mix * new;
        self.change = (new - old).abs();
        Ok(self.conf.toler.is_eq(new, old))
    }

    /// Iterates until the convergence criterion has been met.
    pub fn do_run(&mut self) -> Result<Convergence, Error> {
        for i in 0..self.conf.max_iter {
            if self.step()? {
                debug!("hartree converged: {{iter: {}, hartree: {}, filling: {}}}",
                       i, self.hartree, self.filling);
                return Ok(Convergence::new(true, i + 1, self.change));
            }
            debug!("hartree: {{iter: {}, hartree: {}, filling: {}}}",
                   i, self.hartree, self.filling);
        }
        warn!("hartree iteration not converged after {} iterations",
              self.conf.max_iter);
        Ok(Convergence::new(false, self.conf.max_iter, self.change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::frequency_grid::{GridKind, Transform};

    fn grid() -> FrequencyGrid {
        FrequencyGrid::new(GridKind::Fermionic, Transform::Sqrt, 11, 0.5, 1.0)
    }

    #[test]
    fn test_half_filling() {
        let model = Model { u: 2.0, gamma: 1.0, gate_voltage: 0.0 };
        let mut run = Conf::default().make_run(
            model, Regulator::Hybridization, 0.0, grid());
        let c = run.do_run().unwrap();
        assert!(c.is_converged());
        assert!((run.filling - 0.5).abs() < 1e-12);
        assert!((run.hartree - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_away_from_half_filling() {
        let model = Model { u: 1.0, gamma: 1.0, gate_voltage: 0.3 };
        let lambda = 0.0;
        let mut run = Conf::default().make_run(
            model, Regulator::Hybridization, lambda, grid());
        assert!(run.do_run().unwrap().is_converged());
        // n = 1/2 − sgn(a)/π (π/2 − atan(Δ/|a|)),  a = ε + U n
        let delta = 0.5 * (model.gamma + lambda);
        let a = model.epsilon() + model.u * run.filling;
        let exact = 0.5 - a.signum() / PI * (0.5 * PI - (delta / a.abs()).atan());
        assert!(run.filling < 0.5);
        assert!((run.filling - exact).abs() < 1e-8, "{} vs {}", run.filling, exact);
    }
}
