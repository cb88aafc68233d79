#[macro_use]
extern crate mfrg;

use std::f64::consts::PI;
use mfrg::bubble::{Bubble, BubbleFunctionCalculator};
use mfrg::config::FrgConf;
use mfrg::frequencies::{Bosonic, Channel};
use mfrg::frequency_grid::GridConf;
use mfrg::propagator::{Propagator, PropagatorKind};
use mfrg::quadrature;
use mfrg::state::State;
use mfrg::symmetry::Class;
use mfrg::utils::Toler;

const LAMBDA0: f64 = 10.0;

fn conf(u: f64, gate_voltage: f64) -> FrgConf {
    let mut conf = FrgConf::default();
    conf.u = u;
    conf.gate_voltage = gate_voltage;
    conf.particle_hole_symmetric = gate_voltage == 0.0;
    conf.lambda_ini = LAMBDA0;
    conf.grids.k1 = GridConf::with_n(9);
    conf.grids.self_energy = GridConf::with_n(11);
    conf.quadrature = quadrature::Conf {
        relerr: 1e-9,
        abserr: 1e-14,
        max_subdivisions: 300,
    };
    conf.validate().unwrap();
    conf
}

/// Bare vertex and free propagator: `K1_a(0) = −U² Δ / (π (ε² + Δ²))`.
fn check_bubble(u: f64, gate_voltage: f64) {
    let conf = conf(u, gate_voltage);
    let mut state = State::bare(&conf, LAMBDA0).unwrap();
    state.self_energy = state.self_energy.zeros_like();
    let g = Propagator::new(PropagatorKind::Full, LAMBDA0, conf.model(),
                            conf.regulator, &state.self_energy);
    let bare = state.vertex.clone();
    let calc = BubbleFunctionCalculator::new(
        Channel::A, bare.view(), bare.view(), Bubble::new(g),
        conf.quadrature, conf.characteristic_scale(LAMBDA0), true);
    let stats = calc.perform_computation(state.vertex.channel_mut(Channel::A))
        .unwrap();
    assert!(stats.computed > 0);

    let eps = conf.model().epsilon();
    let delta = 0.5 * (conf.gamma + LAMBDA0);
    let expected = -u * u * delta / (PI * (eps * eps + delta * delta));
    let k1 = state.vertex.channel(Channel::A)
        .value(Class::K1, 0, Bosonic::new(0.0, 0.0, 0.0));
    let toler = Toler { relerr: 1e-7, abserr: 1e-14 };
    toler_assert_eq!(toler, k1.re, expected);
    assert!(k1.im.abs() < 1e-12, "{}", k1);
}

#[test]
fn test_bubble_at_lambda0() {
    check_bubble(1.0, 0.0);
    check_bubble(2.0, 0.3);
    check_bubble(0.5, 1.5);
}
