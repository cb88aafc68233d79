//! Self-energy loops and the multiloop vertex flow.
//!
//! ```text
//! Σ̇(v) = −1/(2π) ∫ dv' [2 Γ_V + Γ_V̂](v, v'; v, v') S(v')
//!
//! γ̇_r⁽¹⁾ = Γ Π̇_r Γ
//! γ̇_r⁽ℓ⁾ = L⁽ℓ⁾ + C⁽ℓ⁾ + R⁽ℓ⁾
//! L⁽ℓ⁾ = [γ̇⁽ℓ⁻¹⁾]_r̄ Π_r Γ
//! R⁽ℓ⁾ = Γ Π_r [γ̇⁽ℓ⁻¹⁾]_r̄
//! C⁽ℓ⁾ = ½ (Γ Π_r [L⁽ℓ⁻¹⁾]_r̄ + [R⁽ℓ⁻¹⁾]_r̄ Π_r Γ)      ℓ ≥ 3
//! ```
//!
//! where `[x]_r̄` keeps the channels other than `r` without the bare part.

use std::f64::consts::PI;
use num::Zero;
use rayon::prelude::*;
use super::bubble::{self, Bubble, BubbleFunctionCalculator, Stats};
use super::data::{Complex64, DataContainer};
use super::frequencies::{switch2bosonic, Channel, Natural};
use super::propagator::{Model, Propagator, PropagatorKind, Regulator};
use super::quadrature;
use super::self_energy::SelfEnergy;
use super::symmetry::{Class, Spin};
use super::utils::{is_finite, Convergence};
use super::vertex::{Halves, Restriction, Vertex, VertexView};

quick_error! {
    #[derive(Clone, Debug, PartialEq)]
    pub enum Error {
        Bubble(err: bubble::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Quadrature(v: f64, err: quadrature::Error) {
            display("self-energy loop failed at v = {}: {}", v, err)
        }
        NonFinite(v: f64) {
            display("self-energy loop is not finite at v = {}", v)
        }
    }
}

/// `−1/(2π) ∫ dv' [2 Γ_V + Γ_V̂](v, v'; v, v') G(v')` at one frequency.
pub fn loop_value(
    vertex: &VertexView,
    g: &Propagator,
    v: f64,
    i_in: usize,
    quadrature: &quadrature::Conf,
    tail_scale: f64,
) -> Result<quadrature::Integral, quadrature::Error> {
    let mut integral = quadrature.integrate_real_line(|vp| {
        let n = Natural { v1p: v, v2p: vp, v1: v };
        let weight = vertex.value_natural(Spin::V, n, i_in) * 2.0
            + vertex.value_natural(Spin::Vhat, n, i_in);
        weight * g.value(vp, i_in)
    }, &[0.0, v, -v], tail_scale)?;
    integral.value *= -1.0 / (2.0 * PI);
    integral.abserr /= 2.0 * PI;
    Ok(integral)
}

/// Loop with the bare part only, which is what remains beyond the grid.
/// The propagator must decay faster than `1/v`.
fn bare_loop(
    vertex: &VertexView,
    g: &Propagator,
    quadrature: &quadrature::Conf,
    tail_scale: f64,
) -> Result<Complex64, Error> {
    let weight = 2.0 * vertex.bare_value(Spin::V) + vertex.bare_value(Spin::Vhat);
    if weight == 0.0 {
        return Ok(Complex64::zero());
    }
    let integral = quadrature.integrate_real_line(|vp| g.value(vp, 0), &[0.0],
                                                  tail_scale)
        .map_err(|e| Error::Quadrature(f64::INFINITY, e))?;
    Ok(integral.value * (-weight / (2.0 * PI)))
}

/// Tabulate a self-energy on the grid of `template`, in parallel over the
/// external frequencies.
fn tabulate<F>(template: &SelfEnergy, asymptotic: Complex64, f: F)
               -> Result<SelfEnergy, Error>
    where F: Fn(f64, usize) -> Result<quadrature::Integral, Error> + Sync
{
    let grid = template.grid();
    let n_in = template.n_in();
    let results: Vec<_> = (0..grid.len() * n_in).into_par_iter()
        .map(|flat| {
            let v = grid.frequency(flat / n_in);
            let integral = f(v, flat % n_in)?;
            if !is_finite(integral.value) {
                return Err(Error::NonFinite(v));
            }
            Ok(integral)
        })
        .collect::<Result<_, _>>()?;
    let unconverged = results.iter().filter(|r| !r.converged).count();
    if unconverged > 0 {
        warn!("{} self-energy loop integrals did not reach the tolerance",
              unconverged);
    }
    let values = results.into_iter().map(|r| r.value).collect();
    let mut sigma = template.clone();
    sigma.set_asymptotic(asymptotic);
    sigma.set_data(DataContainer::from_vec(&[1, grid.len(), n_in], values));
    Ok(sigma)
}

/// Loop over the whole self-energy grid of `template`.
pub fn loop_self_energy(
    vertex: &VertexView,
    g: &Propagator,
    template: &SelfEnergy,
    quadrature: &quadrature::Conf,
    tail_scale: f64,
) -> Result<SelfEnergy, Error> {
    let asymptotic = bare_loop(vertex, g, quadrature, tail_scale)?;
    tabulate(template, asymptotic, |v, i_in| {
        loop_value(vertex, g, v, i_in, quadrature, tail_scale)
            .map_err(|e| Error::Quadrature(v, e))
    })
}

/// Schwinger–Dyson equation
///
/// ```text
/// Σ(v) = Σ_H − 1/(2π) ∫ dv' X_V(v, v'; v, v') G(v'),   X = Γ Π_a Γ0
/// ```
///
/// `X` has no `K2b` or `K3` part since its right operand is bare.
pub fn sde_self_energy(
    vertex: &Vertex,
    g: &Propagator,
    hartree: f64,
    template: &SelfEnergy,
    quadrature: &quadrature::Conf,
    tail_scale: f64,
) -> Result<SelfEnergy, Error> {
    let mut bare = vertex.zeros_like();
    bare.set_bare(vertex.bare_value(Spin::V));
    let max_class = usize::min(vertex.max_class(), 2);
    let mut x = vertex.channel(Channel::A).zeros_like(max_class);
    BubbleFunctionCalculator::new(Channel::A, vertex.view(), bare.view(),
                                  Bubble::new(*g), *quadrature, tail_scale, false)
        .perform_computation(&mut x)?;
    let x = &x;
    tabulate(template, Complex64::new(hartree, 0.0), |v, i_in| {
        let mut integral = quadrature.integrate_real_line(|vp| {
            let f = switch2bosonic(Channel::A, Natural { v1p: v, v2p: vp, v1: v });
            (x.value(Class::K1, i_in, f) + x.value(Class::K2, i_in, f))
                * g.value(vp, i_in)
        }, &[0.0, v, -v], tail_scale).map_err(|e| Error::Quadrature(v, e))?;
        integral.value = Complex64::new(hartree, 0.0)
            - integral.value / (2.0 * PI);
        Ok(integral)
    })
}

/// Relative change of the newest self-energy iterate.
pub fn self_energy_converged(
    new: &SelfEnergy,
    old: &SelfEnergy,
    toler: f64,
    iterations: usize,
) -> Convergence {
    let scale = f64::max(new.max_norm(), f64::MIN_POSITIVE);
    let residual = new.max_distance(old) / scale;
    Convergence::new(residual <= toler, iterations, residual)
}

/// Settings of the vertex and self-energy flow equations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    pub n_loops: usize,
    pub katanin: bool,
    pub self_energy_corrections: bool,
    pub max_self_energy_iterations: usize,
    pub self_energy_toler: f64,
    pub channels: Vec<Channel>,
}

/// `{ n_loops: 1, katanin: true, self_energy_corrections: false, .. }`
impl Default for Conf {
    fn default() -> Self {
        Self {
            n_loops: 1,
            katanin: true,
            self_energy_corrections: false,
            max_self_energy_iterations: 5,
            self_energy_toler: 1e-4,
            channels: Channel::ALL.to_vec(),
        }
    }
}

/// Flow derivatives at one `Λ`.
#[derive(Clone, Debug)]
pub struct Derivative {
    pub vertex: Vertex,
    pub self_energy: SelfEnergy,
    pub stats: Stats,
    /// Present if the self-energy corrections were iterated.
    pub self_energy_convergence: Option<Convergence>,
}

pub struct LoopCalculator<'a> {
    conf: &'a Conf,
    quadrature: quadrature::Conf,
    model: Model,
    regulator: Regulator,
    lambda: f64,
    tail_scale: f64,
}

impl<'a> LoopCalculator<'a> {
    pub fn new(
        conf: &'a Conf,
        quadrature: quadrature::Conf,
        model: Model,
        regulator: Regulator,
        lambda: f64,
    ) -> Self {
        Self {
            conf,
            quadrature,
            model,
            regulator,
            lambda,
            tail_scale: regulator.characteristic_scale(&model, lambda),
        }
    }

    fn propagator<'b>(&self, kind: PropagatorKind, sigma: &'b SelfEnergy)
                      -> Propagator<'b> {
        Propagator::new(kind, self.lambda, self.model, self.regulator, sigma)
    }

    /// One bubble per active channel, collected into a vertex without bare
    /// part.
    fn bubbles<'b, 'l, 'r, L, R>(
        &self,
        template: &Vertex,
        bubble: Bubble<'b>,
        symmetric: bool,
        left: L,
        right: R,
        stats: &mut Stats,
    ) -> Result<Vertex, Error>
        where L: Fn(Channel) -> VertexView<'l>,
              R: Fn(Channel) -> VertexView<'r>
    {
        let mut result = template.zeros_like();
        for &r in &self.conf.channels {
            let calc = BubbleFunctionCalculator::new(
                r, left(r), right(r), bubble, self.quadrature,
                self.tail_scale, symmetric);
            stats.merge(&calc.perform_computation(result.channel_mut(r))?);
        }
        Ok(result)
    }

    /// Multiloop vertex derivative.  Also returns the sum of the central
    /// parts `C⁽ℓ⁾`.
    pub fn vertex_derivative(
        &self,
        vertex: &Vertex,
        sigma: &SelfEnergy,
        sigma_dot: &SelfEnergy,
        stats: &mut Stats,
    ) -> Result<(Vertex, Vertex), Error> {
        let g = self.propagator(PropagatorKind::Full, sigma);
        let dg = if self.conf.katanin {
            Propagator::katanin(self.lambda, self.model, self.regulator,
                                sigma, sigma_dot)
        } else {
            self.propagator(PropagatorKind::SingleScale, sigma)
        };
        let full = |_| vertex.view();
        let mut total = self.bubbles(vertex, Bubble::differentiated(g, dg), true,
                                     full, full, stats)?;
        let mut central = vertex.zeros_like();
        let plain = Bubble::new(g);
        let mut previous = total.clone();
        let mut sides: Option<(Vertex, Vertex)> = None;
        for ell in 2..self.conf.n_loops + 1 {
            let left = self.bubbles(vertex, plain, false, |r| {
                VertexView::new(Halves::Symmetric(&previous), Restriction::Complement(r))
            }, full, stats)?;
            let right = self.bubbles(vertex, plain, false, full, |r| {
                VertexView::new(Halves::Symmetric(&previous), Restriction::Complement(r))
            }, stats)?;
            let mut sum = left.clone();
            sum.add_scaled(1.0, &right);
            if let Some((ref l, ref r)) = sides {
                let mut c = self.bubbles(vertex, plain, false, full, |s| {
                    VertexView::new(Halves::NonSymmetric(l, r), Restriction::Complement(s))
                }, stats)?;
                let c2 = self.bubbles(vertex, plain, false, |s| {
                    VertexView::new(Halves::NonSymmetric(r, l), Restriction::Complement(s))
                }, full, stats)?;
                c.add_scaled(1.0, &c2);
                c.scale(0.5);
                sum.add_scaled(1.0, &c);
                central.add_scaled(1.0, &c);
            }
            debug!("loop {}: |γ̇| = {}", ell, sum.max_norm());
            total.add_scaled(1.0, &sum);
            sides = Some((left, right));
            previous = sum;
        }
        Ok((total, central))
    }

    /// `Σ̇ = loop(Γ, S) + Σ̇_t̄ + loop(Γ, G Σ̇_t̄ G)` with
    /// `Σ̇_t̄ = loop(C^{a+p}, G)`.
    fn corrected_self_energy(
        &self,
        vertex: &Vertex,
        sigma: &SelfEnergy,
        one_loop: &SelfEnergy,
        central: &Vertex,
    ) -> Result<SelfEnergy, Error> {
        let mut central = central.clone();
        central.channel_mut(Channel::T).scale(0.0);
        let g = self.propagator(PropagatorKind::Full, sigma);
        let tbar = loop_self_energy(&central.view(), &g, sigma, &self.quadrature,
                                    self.tail_scale)?;
        let insertion = Propagator::insertion(self.lambda, self.model,
                                              self.regulator, sigma, &tbar);
        let inserted = loop_self_energy(&vertex.view(), &insertion, sigma,
                                        &self.quadrature, self.tail_scale)?;
        let mut result = one_loop.clone();
        result.add_scaled(1.0, &tbar);
        result.add_scaled(1.0, &inserted);
        Ok(result)
    }

    /// Vertex and self-energy derivatives.
    pub fn derivative(&self, vertex: &Vertex, sigma: &SelfEnergy)
                      -> Result<Derivative, Error> {
        let mut stats = Stats::default();
        let s = self.propagator(PropagatorKind::SingleScale, sigma);
        let one_loop = loop_self_energy(&vertex.view(), &s, sigma,
                                        &self.quadrature, self.tail_scale)?;
        let mut sigma_dot = one_loop.clone();
        let mut iterations = 0;
        loop {
            let (vertex_dot, central) =
                self.vertex_derivative(vertex, sigma, &sigma_dot, &mut stats)?;
            if !self.conf.self_energy_corrections || self.conf.n_loops < 3 {
                return Ok(Derivative {
                    vertex: vertex_dot,
                    self_energy: sigma_dot,
                    stats,
                    self_energy_convergence: None,
                });
            }
            iterations += 1;
            let corrected = self.corrected_self_energy(vertex, sigma, &one_loop,
                                                       &central)?;
            let convergence = self_energy_converged(
                &corrected, &sigma_dot, self.conf.self_energy_toler, iterations);
            debug!("self-energy correction {}: residual {}",
                   iterations, convergence.residual());
            sigma_dot = corrected;
            if convergence.is_converged()
                || iterations >= self.conf.max_self_energy_iterations
            {
                if !convergence.is_converged() {
                    warn!("self-energy corrections not converged after {} \
                           iterations", iterations);
                }
                return Ok(Derivative {
                    vertex: vertex_dot,
                    self_energy: sigma_dot,
                    stats,
                    self_energy_convergence: Some(convergence),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use num::Complex;
    use super::*;
    use super::super::frequency_grid::{FrequencyGrid, GridConf, GridKind, Transform};
    use super::super::utils::Toler;
    use super::super::vertex::VertexGrids;

    fn grids() -> VertexGrids {
        VertexGrids::guess(Transform::Sqrt, &GridConf::with_n(9),
                           &GridConf::with_n(5), &GridConf::with_n(5), 1.0)
    }

    fn sigma_grid() -> FrequencyGrid {
        FrequencyGrid::new(GridKind::Fermionic, Transform::Sqrt, 11, 30.0, 1.0)
    }

    fn quadrature() -> quadrature::Conf {
        quadrature::Conf { relerr: 1e-8, abserr: 0.0, max_subdivisions: 300 }
    }

    #[test]
    fn test_bare_loop_at_half_filling() {
        // S is odd in v and purely imaginary: the bare loop vanishes and the
        // remaining self-energy derivative is zero as well
        let model = Model { u: 1.0, gamma: 1.0, gate_voltage: 0.0 };
        let sigma = SelfEnergy::constant(&sigma_grid(), 1, Complex::new(0.5, 0.0));
        let vertex = Vertex::bare(model.u, &grids(), 1, 1);
        let s = Propagator::new(PropagatorKind::SingleScale, 2.0, model,
                                Regulator::Hybridization, &sigma);
        let dsigma = loop_self_energy(&vertex.view(), &s, &sigma,
                                      &quadrature(), 1.5).unwrap();
        assert!(dsigma.max_norm() < 1e-10, "{}", dsigma.max_norm());
    }

    #[test]
    fn test_bare_loop_away_from_half_filling() {
        let model = Model { u: 1.0, gamma: 1.0, gate_voltage: 0.4 };
        let lambda = 1.0;
        let sigma = SelfEnergy::constant(&sigma_grid(), 1, Complex::zero());
        let vertex = Vertex::bare(model.u, &grids(), 1, 1);
        let s = Propagator::new(PropagatorKind::SingleScale, lambda, model,
                                Regulator::Hybridization, &sigma);
        let dsigma = loop_self_energy(&vertex.view(), &s, &sigma,
                                      &quadrature(), 1.0).unwrap();
        // Σ̇ = U ∂Λ n with n = 1/2 − atan(ε/Δ)/π, Δ = (Γ + Λ)/2
        let eps = model.epsilon();
        let delta = 0.5 * (model.gamma + lambda);
        let dn = eps / (2.0 * PI * (eps * eps + delta * delta));
        let toler = Toler { relerr: 1e-6, abserr: 1e-10 };
        toler_assert_eq!(toler, dsigma.asymptotic().re, model.u * dn);
        toler_assert_eq!(toler, dsigma.value(0, 0.3).re, model.u * dn);
        assert!(dsigma.value(0, 0.3).im.abs() < 1e-10);
    }

    #[test]
    fn test_sde_second_order() {
        let model = Model { u: 1.0, gamma: 1.0, gate_voltage: 0.0 };
        let sigma = SelfEnergy::constant(&sigma_grid(), 1, Complex::new(0.5, 0.0));
        let vertex = Vertex::bare(model.u, &grids(), 1, 1);
        let g = Propagator::new(PropagatorKind::Full, 0.0, model,
                                Regulator::Hybridization, &sigma);
        let quad = quadrature::Conf { relerr: 1e-7, abserr: 1e-12,
                                      max_subdivisions: 300 };
        let sde = sde_self_energy(&vertex, &g, 0.5 * model.u, &sigma,
                                  &quad, 0.5).unwrap();
        sde.check_causality(Toler { relerr: 1e-7, abserr: 1e-12 }).unwrap();
        assert_eq!(sde.asymptotic(), Complex::new(0.5, 0.0));
        // particle-hole symmetry: Re Σ = U/2, Im Σ odd
        for &v in &[0.2, 1.0, 5.0] {
            let x = sde.value(0, v);
            let y = sde.value(0, -v);
            assert!((x.re - 0.5).abs() < 1e-6, "{}", x);
            assert!((x.im + y.im).abs() < 1e-6);
            assert!(x.im < 0.0);
        }
    }

    /// The two-loop correction is cubic in the bare vertex and only has
    /// `K2` and `K3` parts.
    #[test]
    fn test_two_loop_correction() {
        let sigma = SelfEnergy::constant(&sigma_grid(), 1, Complex::zero());
        let correction = |u: f64| {
            // ε = 0 so that the propagators do not depend on U
            let model = Model { u, gamma: 1.0, gate_voltage: 0.5 * u };
            let vertex = Vertex::bare(u, &grids(), 2, 1);
            let mut totals = Vec::new();
            for &n_loops in &[1, 2] {
                let conf = Conf { n_loops, katanin: false, ..Default::default() };
                let calc = LoopCalculator::new(&conf, quadrature(), model,
                                               Regulator::Hybridization, 1.0);
                let mut stats = Stats::default();
                let (total, central) = calc.vertex_derivative(
                    &vertex, &sigma, &sigma, &mut stats).unwrap();
                assert_eq!(central.max_norm(), 0.0);
                totals.push(total);
            }
            let mut diff = totals[1].clone();
            diff.add_scaled(-1.0, &totals[0]);
            diff
        };
        let small = correction(0.5);
        let large = correction(1.0);
        assert!(small.max_norm() > 1e-6);
        let toler = Toler { relerr: 1e-8, abserr: 1e-12 };
        for &r in &Channel::ALL {
            let k1 = small.channel(r).component(Class::K1).unwrap().data();
            assert!(k1.max_norm() < 1e-14);
            let x = small.channel(r).component(Class::K2).unwrap().data();
            let y = large.channel(r).component(Class::K2).unwrap().data();
            for (a, b) in x.as_slice().iter().zip(y.as_slice()) {
                toler_assert_complex_eq!(toler, *a * 8.0, *b);
            }
        }
    }

    /// The three-loop central part `C⁽³⁾ = Γ Π [L⁽²⁾]_r̄` is quartic in the
    /// bare vertex and lives in `K2`.
    #[test]
    fn test_central_part() {
        let sigma = SelfEnergy::constant(&sigma_grid(), 1, Complex::zero());
        let central = |u: f64| {
            let model = Model { u, gamma: 1.0, gate_voltage: 0.5 * u };
            let vertex = Vertex::bare(u, &grids(), 2, 1);
            let conf = Conf { n_loops: 3, katanin: false, ..Default::default() };
            let calc = LoopCalculator::new(&conf, quadrature(), model,
                                           Regulator::Hybridization, 1.0);
            let mut stats = Stats::default();
            let (_, central) = calc.vertex_derivative(
                &vertex, &sigma, &sigma, &mut stats).unwrap();
            central
        };
        let small = central(0.5);
        let large = central(1.0);
        assert!(small.max_norm() > 1e-10, "{}", small.max_norm());
        assert_eq!(small.bare_value(Spin::V), 0.0);
        let toler = Toler { relerr: 1e-8, abserr: 1e-14 };
        for &r in &Channel::ALL {
            let x = small.channel(r).component(Class::K2).unwrap().data();
            let y = large.channel(r).component(Class::K2).unwrap().data();
            for (a, b) in x.as_slice().iter().zip(y.as_slice()) {
                toler_assert_complex_eq!(toler, *a * 16.0, *b);
            }
        }
    }

    /// Without Katanin substitution the central part does not depend on
    /// `Σ̇`, so the corrections converge in the second iteration to
    /// `Σ̇ = loop(Γ, S) + Σ̇_t̄ + loop(Γ, G Σ̇_t̄ G)`.
    #[test]
    fn test_self_energy_corrections() {
        let model = Model { u: 1.0, gamma: 1.0, gate_voltage: 0.8 };
        let lambda = 1.0;
        let sigma = SelfEnergy::constant(&sigma_grid(), 1, Complex::zero());
        let vertex = Vertex::bare(model.u, &grids(), 2, 1);
        let derivative = |corrections: bool| {
            let conf = Conf {
                n_loops: 3,
                katanin: false,
                self_energy_corrections: corrections,
                self_energy_toler: 1e-12,
                ..Default::default()
            };
            let calc = LoopCalculator::new(&conf, quadrature(), model,
                                           Regulator::Hybridization, lambda);
            calc.derivative(&vertex, &sigma).unwrap()
        };
        let plain = derivative(false);
        let corrected = derivative(true);
        assert_eq!(plain.self_energy_convergence, None);
        let convergence = corrected.self_energy_convergence.unwrap();
        assert!(convergence.is_converged());
        assert!(convergence.iterations() <= 2);
        assert_eq!(corrected.vertex, plain.vertex);

        let conf = Conf { n_loops: 3, katanin: false, ..Default::default() };
        let calc = LoopCalculator::new(&conf, quadrature(), model,
                                       Regulator::Hybridization, lambda);
        let mut stats = Stats::default();
        let (_, mut central) = calc.vertex_derivative(&vertex, &sigma, &sigma,
                                                      &mut stats).unwrap();
        central.channel_mut(Channel::T).scale(0.0);
        let g = Propagator::new(PropagatorKind::Full, lambda, model,
                                Regulator::Hybridization, &sigma);
        let tbar = loop_self_energy(&central.view(), &g, &sigma, &quadrature(),
                                    calc.tail_scale).unwrap();
        let insertion = Propagator::insertion(lambda, model, Regulator::Hybridization,
                                              &sigma, &tbar);
        let inserted = loop_self_energy(&vertex.view(), &insertion, &sigma,
                                        &quadrature(), calc.tail_scale).unwrap();
        assert!(tbar.max_norm() > 1e-10, "{}", tbar.max_norm());
        let mut expected = plain.self_energy.clone();
        expected.add_scaled(1.0, &tbar);
        expected.add_scaled(1.0, &inserted);
        assert!(corrected.self_energy.max_distance(&expected) < 1e-14);
        assert!(corrected.self_energy.max_distance(&plain.self_energy) > 1e-10);
    }

    #[test]
    fn test_self_energy_converged() {
        let grid = sigma_grid();
        let a = SelfEnergy::constant(&grid, 1, Complex::new(1.0, 0.0));
        let b = SelfEnergy::constant(&grid, 1, Complex::new(1.0 + 1e-6, 0.0));
        assert!(self_energy_converged(&a, &b, 1e-4, 1).is_converged());
        let c = self_energy_converged(&a, &b, 1e-8, 2);
        assert!(!c.is_converged());
        assert_eq!(c.iterations(), 2);
    }
}
