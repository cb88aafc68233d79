//! Second-order perturbation theory.

use super::bubble::{self, Bubble, BubbleFunctionCalculator, Stats};
use super::config::FrgConf;
use super::hartree;
use super::loops::{self, sde_self_energy};
use super::propagator::{Propagator, PropagatorKind};
use super::state::State;

quick_error! {
    #[derive(Clone, Debug, PartialEq)]
    pub enum Error {
        Hartree(err: hartree::Error) {
            from()
            source(err)
            display("{}", err)
        }
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
    }
}

/// `γ_r = Γ0 Π_r Γ0` in every active channel and the second-order
/// self-energy, both with the Hartree propagator.
///
/// Only `K1` is generated since the bare vertex has no frequency
/// dependence.
pub fn sopt_state(conf: &FrgConf, lambda: f64) -> Result<State, Error> {
    let bare = State::bare(conf, lambda)?;
    let tail_scale = conf.characteristic_scale(lambda);
    let mut state = bare.clone();
    let mut stats = Stats::default();
    let hartree = bare.self_energy.asymptotic().re;
    {
        let g = Propagator::new(PropagatorKind::Full, lambda, conf.model(),
                                conf.regulator, &bare.self_energy);
        for &r in &conf.channels {
            let calc = BubbleFunctionCalculator::new(
                r, bare.vertex.view(), bare.vertex.view(), Bubble::new(g),
                conf.quadrature, tail_scale, true);
            stats.merge(&calc.perform_computation(state.vertex.channel_mut(r))?);
        }
        if !conf.static_feedback {
            state.self_energy = sde_self_energy(&bare.vertex, &g, hartree,
                                                &bare.self_energy,
                                                &conf.quadrature, tail_scale)?;
        }
    }
    debug!("sopt: {} bubbles computed, {} zero classes",
           stats.computed, stats.zero_classes);
    Ok(state)
}
