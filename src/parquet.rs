//! Self-consistent parquet equations.
//!
//! ```text
//! γ_r = I_r Π_r Γ,      I_r = Γ − γ_r
//! Σ   = Σ_H − 1/(2π) ∫ (Γ Π_a Γ0)_V G
//! ```
//!
//! iterated with linear mixing at fixed `Λ`.

use super::bubble::{self, Bubble, BubbleFunctionCalculator, Stats};
use super::hartree;
use super::loops::{self, sde_self_energy};
use super::propagator::{Propagator, PropagatorKind};
use super::self_energy;
use super::state::State;
use super::symmetry::Spin;
use super::utils::{Convergence, Toler};
use super::vertex::{Halves, Restriction, Vertex, VertexView};

quick_error! {
    #[derive(Clone, Debug, PartialEq)]
    pub enum Error {
        Bubble(err: bubble::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Loop(err: loops::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Hartree(err: hartree::Error) {
            from()
            source(err)
            display("{}", err)
        }
        SelfEnergy(err: self_energy::Error) {
            from()
            source(err)
            display("{}", err)
        }
        NonFinite(iteration: usize) {
            display("parquet iterate {} is not finite", iteration)
        }
    }
}

/// Iteration settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    /// Relative change below which the iteration stops.
    pub toler: f64,
    pub max_iter: usize,
    /// Weight of the new iterate.
    pub mix: f64,
}

/// `{ toler: 1e-6, max_iter: 50, mix: 1.0 }`
impl Default for Conf {
    fn default() -> Self {
        Self {
            toler: 1e-6,
            max_iter: 50,
            mix: 1.0,
        }
    }
}

impl Conf {
    pub fn make_run(self, state: State) -> Run {
        Run {
            conf: self,
            state,
            iteration: 0,
            vertex_change: f64::INFINITY,
            self_energy_change: f64::INFINITY,
            stats: Stats::default(),
        }
    }
}

fn relative_change(new: &Vertex, old: &Vertex) -> f64 {
    let mut diff = new.clone();
    diff.add_scaled(-1.0, old);
    diff.max_norm() / f64::max(new.max_norm(), f64::MIN_POSITIVE)
}

pub struct Run {
    pub conf: Conf,
    pub state: State,
    pub iteration: usize,
    pub vertex_change: f64,
    pub self_energy_change: f64,
    pub stats: Stats,
}

impl Run {
    fn hartree(&self, g: &Propagator) -> Result<f64, Error> {
        let frg = &self.state.conf;
        if frg.particle_hole_symmetric {
            return Ok(0.5 * frg.u);
        }
        let scale = frg.characteristic_scale(self.state.lambda);
        Ok(frg.u * hartree::filling(g, &frg.quadrature, scale)
           .map_err(hartree::Error::from)?)
    }

    /// Right-hand sides of the Bethe–Salpeter equations of all active
    /// channels, with the bare part of the current vertex.
    pub fn bethe_salpeter(&self, g: Propagator) -> Result<(Vertex, Stats), Error> {
        let frg = &self.state.conf;
        let vertex = &self.state.vertex;
        let tail_scale = frg.characteristic_scale(self.state.lambda);
        let mut result = vertex.zeros_like();
        result.set_bare(vertex.bare_value(Spin::V));
        let mut stats = Stats::default();
        for &r in &frg.channels {
            let irreducible = VertexView::new(Halves::Symmetric(vertex),
                                              Restriction::Irreducible(r));
            let calc = BubbleFunctionCalculator::new(
                r, irreducible, vertex.view(), Bubble::new(g), frg.quadrature,
                tail_scale, true);
            stats.merge(&calc.perform_computation(result.channel_mut(r))?);
        }
        debug!("parquet bubbles: {} computed, {} copied",
               stats.computed, stats.copied);
        Ok((result, stats))
    }

    /// One mixed update of vertex and self-energy.  Returns whether both
    /// changed by less than the tolerance.
    pub fn step(&mut self) -> Result<bool, Error> {
        self.iteration += 1;
        let frg = self.state.conf.clone();
        let lambda = self.state.lambda;
        let (vertex, stats, sigma) = {
            let g = Propagator::new(PropagatorKind::Full, lambda, frg.model(),
                                    frg.regulator, &self.state.self_energy);
            let (vertex, stats) = self.bethe_salpeter(g)?;
            let sigma = if frg.static_feedback {
                None
            } else {
                let tail_scale = frg.characteristic_scale(lambda);
                Some(sde_self_energy(&self.state.vertex, &g, self.hartree(&g)?,
                                     &self.state.self_energy, &frg.quadrature,
                                     tail_scale)?)
            };
            (vertex, stats, sigma)
        };
        self.stats.merge(&stats);
        let mix = self.conf.mix;
        self.vertex_change = relative_change(&vertex, &self.state.vertex);
        let mut diff = vertex;
        diff.add_scaled(-1.0, &self.state.vertex);
        self.state.vertex.add_scaled(mix, &diff);
        self.self_energy_change = 0.0;
        if let Some(sigma) = sigma {
            let old = &self.state.self_energy;
            self.self_energy_change = sigma.max_distance(old)
                / f64::max(sigma.max_norm(), f64::MIN_POSITIVE);
            let mut diff = sigma;
            diff.add_scaled(-1.0, old);
            self.state.self_energy.add_scaled(mix, &diff);
        }
        if !self.state.all_finite() {
            return Err(Error::NonFinite(self.iteration));
        }
        let quad = &frg.quadrature;
        self.state.self_energy.check_causality(Toler {
            relerr: quad.relerr,
            abserr: quad.abserr,
        })?;
        Ok(self.vertex_change <= self.conf.toler
           && self.self_energy_change <= self.conf.toler)
    }

    /// Iterates until the convergence criterion has been met.
    pub fn do_run(&mut self) -> Result<Convergence, Error> {
        for _ in 0..self.conf.max_iter {
            let converged = self.step()?;
            debug!("parquet: {{iter: {}, vertex_change: {}, self_energy_change: {}}}",
                   self.iteration, self.vertex_change, self.self_energy_change);
            if converged {
                info!("parquet converged after {} iterations", self.iteration);
                return Ok(Convergence::new(true, self.iteration, self.residual()));
            }
        }
        warn!("parquet iteration not converged after {} iterations \
               (residual {})", self.iteration, self.residual());
        Ok(Convergence::new(false, self.iteration, self.residual()))
    }

    pub fn residual(&self) -> f64 {
        f64::max(self.vertex_change, self.self_energy_change)
    }

    pub fn into_state(self) -> State {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use num::Complex;
    use super::*;
    use super::super::config::FrgConf;
    use super::super::data::Complex64;
    use super::super::frequencies::{Bosonic, Channel};
    use super::super::frequency_grid::GridConf;
    use super::super::quadrature;
    use super::super::symmetry::Class;
    use super::super::utils::Toler;

    fn conf() -> FrgConf {
        let mut conf = FrgConf::default();
        conf.grids.k1 = GridConf::with_n(9);
        conf.grids.self_energy = GridConf::with_n(11);
        conf.quadrature = quadrature::Conf {
            relerr: 1e-9,
            abserr: 1e-14,
            max_subdivisions: 300,
        };
        conf
    }

    /// With only the `a` channel, `K1` and a static self-energy the parquet
    /// equations reduce to the geometric series
    /// `K1 = Γ0² B / (1 − Γ0 B)`,  `B(w) = 1/(2π) ∫ Π_a(w, ν) dν`.
    #[test]
    fn test_rpa_fixed_point() {
        let mut frg = conf();
        frg.channels = vec![Channel::A];
        frg.static_feedback = true;
        let lambda = 3.0;
        let state = State::bare(&frg, lambda).unwrap();
        let parquet = Conf { toler: 1e-10, max_iter: 100, mix: 1.0 };
        let mut run = parquet.make_run(state);
        let convergence = run.do_run().unwrap();
        assert!(convergence.is_converged());
        assert!(convergence.iterations() > 2);
        let state = run.into_state();

        // restarting from the fixed point stops after one iteration
        let mut again = Conf { toler: 1e-8, ..parquet }.make_run(state.clone());
        assert!(again.step().unwrap());
        assert_eq!(again.iteration, 1);

        // Σ = U/2 cancels ε at half filling: G(v) = −i/(v + Δ sgn v)
        let delta = 0.5 * (frg.gamma + lambda);
        let g = |v: f64| Complex::new(0.0, -1.0 / (v + delta * v.signum()));
        let gamma0 = -frg.u;
        let quad = frg.quadrature;
        let toler = Toler { relerr: 1e-6, abserr: 1e-10 };
        let grid = &state.vertex.channel(Channel::A)
            .component(Class::K1).unwrap().grids()[0];
        for &w in grid.frequencies() {
            let b = quad.integrate_real_line(|nu| g(nu - 0.5 * w) * g(nu + 0.5 * w),
                                             &[0.5 * w, -0.5 * w], delta)
                .unwrap().value / (2.0 * PI);
            let expected: Complex64 = b * gamma0 * gamma0 / (1.0 - b * gamma0);
            let k1 = state.vertex.channel(Channel::A)
                .value(Class::K1, 0, Bosonic::new(w, 0.0, 0.0));
            toler_assert_complex_eq!(toler, k1, expected);
        }
        // B(0) = −1/(πΔ)
        let b0 = -1.0 / (PI * delta);
        let k1 = state.vertex.channel(Channel::A)
            .value(Class::K1, 0, Bosonic::new(0.0, 0.0, 0.0));
        toler_assert_eq!(toler, k1.re, gamma0 * gamma0 * b0 / (1.0 - gamma0 * b0));
        for &r in &[Channel::P, Channel::T] {
            assert_eq!(state.vertex.channel(r).component(Class::K1)
                       .unwrap().data().max_norm(), 0.0);
        }
    }

    #[test]
    fn test_mixing_reaches_same_fixed_point() {
        let mut frg = conf();
        frg.channels = vec![Channel::A];
        frg.static_feedback = true;
        let solve = |mix: f64| {
            let state = State::bare(&frg, 3.0).unwrap();
            let mut run = Conf { toler: 1e-10, max_iter: 200, mix }.make_run(state);
            let c = run.do_run().unwrap();
            assert!(c.is_converged());
            (c.iterations(), run.into_state().vertex)
        };
        let (n_full, full) = solve(1.0);
        let (n_half, half) = solve(0.5);
        assert!(n_half > n_full);
        let mut diff = full.clone();
        diff.add_scaled(-1.0, &half);
        assert!(diff.max_norm() < 1e-8, "{}", diff.max_norm());
    }

    #[test]
    fn test_self_consistent_self_energy() {
        let mut frg = conf();
        frg.u = 0.5;
        let state = State::bare(&frg, 1.0).unwrap();
        let mut run = Conf { toler: 1e-6, max_iter: 3, mix: 1.0 }.make_run(state);
        run.do_run().unwrap();
        assert!(run.stats.computed > 0);
        let state = run.into_state();
        state.check().unwrap();
        // particle-hole symmetry: Re Σ = U/2, Im Σ odd and negative for v > 0
        for &v in &[0.3, 2.0] {
            let x = state.self_energy.value(0, v);
            let y = state.self_energy.value(0, -v);
            assert!((x.re - 0.25).abs() < 1e-5, "{}", x);
            assert!((x.im + y.im).abs() < 1e-6);
            assert!(x.im < 0.0);
        }
    }
}
