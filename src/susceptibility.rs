//! Channel susceptibilities from the flowing vertex.
//!
//! ```text
//! χ_r(w) = ±1/(2π) ∫ dν Π_r(w, ν) + K1_r(w)
//! ```

use std::f64::consts::PI;
use std::fmt;
use super::data::Complex64;
use super::frequencies::{Bosonic, Channel};
use super::bubble::Bubble;
use super::propagator::{Propagator, PropagatorKind};
use super::quadrature;
use super::state::State;
use super::symmetry::Class;

quick_error! {
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Error {
        Quadrature(channel: Channel, w: f64, err: quadrature::Error) {
            display("bare bubble of channel {} failed at w = {}: {}",
                    channel, w, err)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Susceptibility {
    pub channel: Channel,
    pub frequencies: Vec<f64>,
    pub values: Vec<Complex64>,
}

impl fmt::Display for Susceptibility {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (w, chi) in self.frequencies.iter().zip(&self.values) {
            writeln!(f, "- {{channel: {}, w: {}, re: {}, im: {}}}",
                     self.channel, w, chi.re, chi.im)?;
        }
        Ok(())
    }
}

/// Susceptibilities of the active channels on the `K1` grid.
pub fn compute(state: &State) -> Result<Vec<Susceptibility>, Error> {
    let conf = &state.conf;
    let g = Propagator::new(PropagatorKind::Full, state.lambda, conf.model(),
                            conf.regulator, &state.self_energy);
    let bubble = Bubble::new(g);
    let tail_scale = conf.characteristic_scale(state.lambda);
    let mut result = Vec::with_capacity(conf.channels.len());
    for &r in &conf.channels {
        let rv = state.vertex.channel(r);
        let frequencies = match rv.component(Class::K1) {
            Some(k1) => k1.grids()[0].frequencies().to_vec(),
            None => continue,
        };
        let mut values = Vec::with_capacity(frequencies.len());
        for &w in &frequencies {
            let integral = conf.quadrature.integrate_real_line(
                |nu| bubble.value(r, w, nu, 0), &[0.0, 0.5 * w, -0.5 * w],
                tail_scale,
            ).map_err(|e| Error::Quadrature(r, w, e))?;
            let bare = integral.value * (r.sign() / (2.0 * PI));
            values.push(bare + rv.value(Class::K1, 0, Bosonic::new(w, 0.0, 0.0)));
        }
        result.push(Susceptibility { channel: r, frequencies, values });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::config::FrgConf;
    use super::super::frequency_grid::GridConf;
    use super::super::utils::Toler;

    #[test]
    fn test_bare_susceptibility() {
        let mut conf = FrgConf::default();
        conf.grids.k1 = GridConf::with_n(7);
        conf.grids.self_energy = GridConf::with_n(11);
        conf.channels = vec![Channel::A, Channel::P];
        let lambda = 1.0;
        let state = State::bare(&conf, lambda).unwrap();
        let chis = compute(&state).unwrap();
        assert_eq!(chis.len(), 2);
        let delta = 0.5 * (conf.gamma + lambda);
        let toler = Toler { relerr: 1e-5, abserr: 1e-10 };
        let a = &chis[0];
        let mid = a.frequencies.len() / 2;
        assert_eq!(a.frequencies[mid], 0.0);
        toler_assert_eq!(toler, a.values[mid].re, -1.0 / (PI * delta));
        toler_assert_eq!(toler, chis[1].values[mid].re, 1.0 / (PI * delta));
        // decays with |w|
        assert!(a.values[mid + 1].norm() < a.values[mid].norm());
        assert_eq!(format!("{}", a).lines().count(), 7);
    }
}
