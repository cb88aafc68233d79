//! Regulated single-particle propagators of the Anderson impurity.
//!
//! ```text
//! hybridization:  G⁻¹(iv) = iv − ε − Σ(iv) + i (Γ + Λ)/2 sgn(v)
//! frequency:      G⁻¹(iv) = (v² + Λ²)/v² G0⁻¹(iv) − Σ(iv)
//!                 G0⁻¹(iv) = iv − ε + i Γ/2 sgn(v)
//! ```
//!
//! with `ε = Vg − U/2`.  The single-scale propagator is
//! `S = −G² ∂Λ G0Λ⁻¹`.

use num::{Complex, Zero};
use super::data::Complex64;
use super::self_energy::SelfEnergy;
use super::utils::sgn;

/// Model parameters of the single-impurity Anderson model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub u: f64,
    pub gamma: f64,
    pub gate_voltage: f64,
}

impl Model {
    /// Level energy `ε = Vg − U/2`.
    pub fn epsilon(&self) -> f64 {
        self.gate_voltage - 0.5 * self.u
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regulator {
    /// Flow in an additional hybridization `Λ/2`.
    Hybridization,
    /// Sharp-ish frequency cutoff `v²/(v² + Λ²)`.
    Frequency,
}

impl Default for Regulator {
    fn default() -> Self {
        Regulator::Hybridization
    }
}

impl Regulator {
    /// Energy scale to which frequency grids are adapted.
    pub fn characteristic_scale(self, model: &Model, lambda: f64) -> f64 {
        match self {
            Regulator::Hybridization => 0.5 * (lambda + model.gamma),
            Regulator::Frequency => f64::max(model.u, 0.5 * model.gamma + lambda),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropagatorKind {
    /// `G`
    Full,
    /// `S`
    SingleScale,
    /// `S + G Σ̇ G`
    Katanin,
    /// `G Σ̇ G`
    Insertion,
}

/// Propagator at fixed `Λ`, evaluated on demand.
#[derive(Clone, Copy, Debug)]
pub struct Propagator<'a> {
    kind: PropagatorKind,
    lambda: f64,
    model: Model,
    regulator: Regulator,
    self_energy: &'a SelfEnergy,
    derivative: Option<&'a SelfEnergy>,
}

impl<'a> Propagator<'a> {
    pub fn new(
        kind: PropagatorKind,
        lambda: f64,
        model: Model,
        regulator: Regulator,
        self_energy: &'a SelfEnergy,
    ) -> Self {
        assert!(kind == PropagatorKind::Full || kind == PropagatorKind::SingleScale,
                "propagator needs the self-energy derivative");
        Self { kind, lambda, model, regulator, self_energy, derivative: None }
    }

    /// `S + G Σ̇ G`
    pub fn katanin(
        lambda: f64,
        model: Model,
        regulator: Regulator,
        self_energy: &'a SelfEnergy,
        derivative: &'a SelfEnergy,
    ) -> Self {
        Self {
            kind: PropagatorKind::Katanin,
            lambda,
            model,
            regulator,
            self_energy,
            derivative: Some(derivative),
        }
    }

    /// `G Σ̇ G`
    pub fn insertion(
        lambda: f64,
        model: Model,
        regulator: Regulator,
        self_energy: &'a SelfEnergy,
        derivative: &'a SelfEnergy,
    ) -> Self {
        Self {
            kind: PropagatorKind::Insertion,
            lambda,
            model,
            regulator,
            self_energy,
            derivative: Some(derivative),
        }
    }

    pub fn kind(&self) -> PropagatorKind {
        self.kind
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// The full propagator `G` with the same self-energy.
    pub fn full(&self) -> Self {
        Self { kind: PropagatorKind::Full, derivative: None, ..*self }
    }

    pub fn value(&self, v: f64, i_in: usize) -> Complex64 {
        match self.kind {
            PropagatorKind::Full => self.g(v, i_in),
            PropagatorKind::SingleScale => self.s(v, i_in),
            PropagatorKind::Katanin => self.s(v, i_in) + self.insertion_value(v, i_in),
            PropagatorKind::Insertion => self.insertion_value(v, i_in),
        }
    }

    fn insertion_value(&self, v: f64, i_in: usize) -> Complex64 {
        let g = self.g(v, i_in);
        let ds = match self.derivative {
            Some(d) => d.value(i_in, v),
            None => Complex64::zero(),
        };
        g * ds * g
    }

    fn g0_inv(&self, v: f64) -> Complex64 {
        Complex::new(-self.model.epsilon(), v + 0.5 * self.model.gamma * sgn(v))
    }

    fn g(&self, v: f64, i_in: usize) -> Complex64 {
        let sigma = self.self_energy.value(i_in, v);
        match self.regulator {
            Regulator::Hybridization => {
                let delta = 0.5 * (self.model.gamma + self.lambda);
                (Complex::new(-self.model.epsilon(), v + delta * sgn(v)) - sigma)
                    .inv()
            }
            Regulator::Frequency => {
                if v == 0.0 {
                    return Complex64::zero();
                }
                let v2 = v * v;
                let l2 = self.lambda * self.lambda;
                Complex64::new(v2, 0.0)
                    / (self.g0_inv(v) * (v2 + l2) - sigma * v2)
            }
        }
    }

    fn s(&self, v: f64, i_in: usize) -> Complex64 {
        match self.regulator {
            Regulator::Hybridization => {
                let g = self.g(v, i_in);
                -g * g * Complex::new(0.0, 0.5 * sgn(v))
            }
            Regulator::Frequency => {
                if v == 0.0 {
                    return Complex64::zero();
                }
                // −G² 2Λ/v² G0⁻¹ with one factor G/v² written out
                let sigma = self.self_energy.value(i_in, v);
                let v2 = v * v;
                let l2 = self.lambda * self.lambda;
                let g0_inv = self.g0_inv(v);
                let g_over_v2 = (g0_inv * (v2 + l2) - sigma * v2).inv();
                -self.g(v, i_in) * g_over_v2 * g0_inv * (2.0 * self.lambda)
            }
        }
    }
}
