//! The unit advanced by the flow: vertex, self-energy and `Λ`.

use std::fmt;
use num::Complex;
use super::config::FrgConf;
use super::data::Complex64;
use super::frequencies::Channel;
use super::frequency_grid::{FrequencyGrid, GridKind};
use super::hartree;
use super::ode::OdeVector;
use super::self_energy::{self, SelfEnergy};
use super::symmetry::Class;
use super::utils::Toler;
use super::frequencies::Bosonic;
use super::vertex::{Vertex, VertexGrids};

quick_error! {
    #[derive(Clone, Debug, PartialEq)]
    pub enum Error {
        NonFinite(lambda: f64) {
            display("state at lambda = {} is not finite", lambda)
        }
        SelfEnergy(err: self_energy::Error) {
            from()
            source(err)
            display("{}", err)
        }
    }
}

/// Grids adapted to the characteristic scale at `Λ`.
pub fn guess_grids(conf: &FrgConf, lambda: f64) -> (VertexGrids, FrequencyGrid) {
    let scale = conf.characteristic_scale(lambda);
    let g = &conf.grids;
    let vertex = VertexGrids::guess(g.transform, &g.k1, &g.k2, &g.k3, scale);
    let sigma = g.self_energy.guess_essential_parameters(
        GridKind::Fermionic, g.transform, scale);
    (vertex, sigma)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub lambda: f64,
    pub vertex: Vertex,
    pub self_energy: SelfEnergy,
    pub conf: FrgConf,
}

impl State {
    /// Bare vertex and Hartree self-energy.
    pub fn bare(conf: &FrgConf, lambda: f64) -> Result<Self, hartree::Error> {
        let (grids, sigma_grid) = guess_grids(conf, lambda);
        let model = conf.model();
        let self_energy = if conf.particle_hole_symmetric {
            SelfEnergy::constant(&sigma_grid, conf.n_in,
                                 Complex::new(0.5 * model.u, 0.0))
        } else {
            let mut run = hartree::Conf::default()
                .make_run(model, conf.regulator, lambda, sigma_grid.clone());
            run.do_run()?;
            SelfEnergy::constant(&sigma_grid, conf.n_in,
                                 Complex::new(run.hartree, 0.0))
        };
        Ok(Self {
            lambda,
            vertex: Vertex::bare(model.u, &grids, conf.max_class, conf.n_in),
            self_energy,
            conf: conf.clone(),
        })
    }

    /// Same shapes, all zero, at the same `Λ`.
    pub fn zeros_like(&self) -> Self {
        Self {
            lambda: self.lambda,
            vertex: self.vertex.zeros_like(),
            self_energy: self.self_energy.zeros_like(),
            conf: self.conf.clone(),
        }
    }

    pub fn all_finite(&self) -> bool {
        self.lambda.is_finite() && self.vertex.all_finite()
            && self.self_energy.all_finite()
    }

    /// Finiteness and causality.  Causality is only resolved to the accuracy
    /// of the integrator.
    pub fn check(&self) -> Result<(), Error> {
        if !self.all_finite() {
            return Err(Error::NonFinite(self.lambda));
        }
        let ode = &self.conf.ode;
        self.self_energy.check_causality(Toler {
            relerr: ode.relerr,
            abserr: ode.abserr,
        })?;
        Ok(())
    }

    /// Re-tabulate on grids guessed for the current `Λ`.  Shapes are kept.
    pub fn update_grids(&mut self) {
        let (grids, sigma_grid) = guess_grids(&self.conf, self.lambda);
        self.vertex = self.vertex.retabulate(&grids);
        self.self_energy = self.self_energy.retabulate(&sigma_grid);
    }

    /// Choose the self-energy grid scale that minimizes the curvature of the
    /// interpolant in the grid coordinate.
    pub fn optimize_self_energy_grid(&mut self) {
        let grid = self.self_energy.grid().clone();
        let w = grid.scale();
        let sigma = &self.self_energy;
        let best = grid.optimize_scale(0.5 * w, 2.0 * w, 20, |trial| {
            sigma.retabulate(trial).curvature()
        });
        debug!("self-energy grid scale: {} -> {}", w, best.scale());
        self.self_energy = self.self_energy.retabulate(&best);
    }

    pub fn summary(&self) -> Summary {
        let grid = self.self_energy.grid();
        let v0 = grid.frequency(grid.len() / 2 + 1);
        let mut k1 = [Complex64::new(0.0, 0.0); 3];
        for &r in &Channel::ALL {
            k1[r.index()] = self.vertex.channel(r)
                .value(Class::K1, 0, Bosonic::new(0.0, 0.0, 0.0));
        }
        Summary {
            lambda: self.lambda,
            v0,
            sigma: self.self_energy.value(0, v0),
            k1,
        }
    }
}

impl OdeVector for State {
    fn axpy(&mut self, alpha: f64, x: &Self) {
        self.vertex.add_scaled(alpha, &x.vertex);
        self.self_energy.add_scaled(alpha, &x.self_energy);
    }

    fn scale(&mut self, alpha: f64) {
        self.vertex.scale(alpha);
        self.self_energy.scale(alpha);
    }

    fn max_norm(&self) -> f64 {
        f64::max(self.vertex.max_norm(), self.self_energy.max_norm())
    }
}

/// Observables printed along the flow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub lambda: f64,
    /// Smallest positive frequency of the self-energy grid.
    pub v0: f64,
    pub sigma: Complex64,
    /// `K1_r(0)` for `a`, `p`, `t`.
    pub k1: [Complex64; 3],
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{lambda: {}, v0: {}, sigma_re: {}, sigma_im: {}, \
                   k1a: {}, k1p: {}, k1t: {}}}",
               self.lambda, self.v0, self.sigma.re, self.sigma.im,
               self.k1[0].re, self.k1[1].re, self.k1[2].re)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::frequency_grid::GridConf;

    fn conf() -> FrgConf {
        let mut conf = FrgConf::default();
        conf.grids.k1 = GridConf::with_n(9);
        conf.grids.self_energy = GridConf::with_n(11);
        conf
    }

    #[test]
    fn test_bare() {
        let state = State::bare(&conf(), 4.0).unwrap();
        state.check().unwrap();
        assert_eq!(state.self_energy.asymptotic(), Complex::new(0.5, 0.0));
        assert_eq!(state.vertex.max_class(), 1);
        // Δ = (Γ + Λ)/2 sets the grid scale
        assert_eq!(state.self_energy.grid().scale(), 2.5);
        let s = state.summary();
        assert_eq!(s.k1, [Complex::new(0.0, 0.0); 3]);
        assert!(s.v0 > 0.0);
    }

    #[test]
    fn test_away_from_half_filling() {
        let mut conf = conf();
        conf.particle_hole_symmetric = false;
        conf.gate_voltage = 0.5;
        let state = State::bare(&conf, 1.0).unwrap();
        let hartree = state.self_energy.asymptotic().re;
        assert!(hartree > 0.0 && hartree < 0.5, "{}", hartree);
    }

    #[test]
    fn test_vector_operations() {
        let a = State::bare(&conf(), 4.0).unwrap();
        let mut b = a.clone();
        b.axpy(-1.0, &a);
        assert_eq!(b.max_norm(), 0.0);
        b.axpy(2.0, &a);
        b.scale(0.5);
        assert_eq!(b.max_norm(), a.max_norm());
    }

    #[test]
    fn test_update_grids() {
        let mut state = State::bare(&conf(), 4.0).unwrap();
        state.lambda = 1.0;
        state.update_grids();
        assert_eq!(state.self_energy.grid().scale(), 1.0);
        assert_eq!(state.self_energy.grid().len(), 11);
        assert!((state.self_energy.value(0, 0.3).re - 0.5).abs() < 1e-12);
        state.optimize_self_energy_grid();
        state.check().unwrap();
    }
}
