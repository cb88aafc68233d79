//! Run configuration.
//!
//! Every field has a default, so a YAML file only needs to list what
//! differs:
//!
//! ```yaml
//! u: 1.5
//! n_loops: 3
//! grids:
//!   k1: {n: 41}
//! ```

use std::{fs, io};
use std::path::Path;
use super::frequencies::Channel;
use super::frequency_grid::{GridConf, Transform};
use super::loops;
use super::ode::{self, Parametrization};
use super::parquet;
use super::propagator::{Model, Regulator};
use super::quadrature;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        Invalid(msg: String) {
            display("invalid configuration: {}", msg)
        }
        Io(err: io::Error) {
            from()
            source(err)
            display("cannot read configuration: {}", err)
        }
        Yaml(err: serde_yaml::Error) {
            from()
            source(err)
            display("cannot parse configuration: {}", err)
        }
    }
}

/// Frequency grids of the vertex classes and the self-energy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridsConf {
    pub transform: Transform,
    pub k1: GridConf,
    pub k2: GridConf,
    pub k3: GridConf,
    pub self_energy: GridConf,
}

/// `{ k1: {n: 31}, k2: {n: 21}, k3: {n: 11}, self_energy: {n: 61}, .. }`
impl Default for GridsConf {
    fn default() -> Self {
        Self {
            transform: Transform::Sqrt,
            k1: GridConf::with_n(31),
            k2: GridConf::with_n(21),
            k3: GridConf::with_n(11),
            self_energy: GridConf::with_n(61),
        }
    }
}

/// How the flow or the parquet solver is started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    /// Bare vertex, Hartree self-energy.
    Bare,
    /// Second-order perturbation theory.
    Sopt,
    /// Converged parquet solution at the initial `Λ`.
    Parquet,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrgConf {
    pub u: f64,
    pub gamma: f64,
    pub gate_voltage: f64,
    pub regulator: Regulator,
    pub lambda_ini: f64,
    pub lambda_fin: f64,
    pub initial_step: f64,
    pub parametrization: Parametrization,
    pub checkpoints: Vec<f64>,
    pub ode: ode::Conf,
    pub n_loops: usize,
    pub katanin: bool,
    pub self_energy_corrections: bool,
    pub max_self_energy_iterations: usize,
    pub self_energy_toler: f64,
    pub channels: Vec<Channel>,
    pub max_class: usize,
    pub static_feedback: bool,
    pub particle_hole_symmetric: bool,
    pub n_in: usize,
    pub grids: GridsConf,
    pub update_grids: bool,
    pub quadrature: quadrature::Conf,
    pub parquet: parquet::Conf,
    pub initial_state: InitialState,
    pub check_symmetries: bool,
}

/// `{ u: 1.0, gamma: 1.0, lambda_ini: 20.0, lambda_fin: 0.0, n_loops: 1, .. }`
impl Default for FrgConf {
    fn default() -> Self {
        Self {
            u: 1.0,
            gamma: 1.0,
            gate_voltage: 0.0,
            regulator: Regulator::Hybridization,
            lambda_ini: 20.0,
            lambda_fin: 0.0,
            initial_step: -1.0,
            parametrization: Parametrization::Sqrt,
            checkpoints: Vec::new(),
            ode: Default::default(),
            n_loops: 1,
            katanin: true,
            self_energy_corrections: false,
            max_self_energy_iterations: 5,
            self_energy_toler: 1e-4,
            channels: Channel::ALL.to_vec(),
            max_class: 1,
            static_feedback: false,
            particle_hole_symmetric: true,
            n_in: 1,
            grids: Default::default(),
            update_grids: false,
            quadrature: Default::default(),
            parquet: Default::default(),
            initial_state: InitialState::Sopt,
            check_symmetries: true,
        }
    }
}

fn invalid<S: Into<String>>(msg: S) -> Result<(), Error> {
    Err(Error::Invalid(msg.into()))
}

impl FrgConf {
    pub fn from_yaml(s: &str) -> Result<Self, Error> {
        let conf: Self = serde_yaml::from_str(s)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn model(&self) -> Model {
        Model {
            u: self.u,
            gamma: self.gamma,
            gate_voltage: self.gate_voltage,
        }
    }

    pub fn loops(&self) -> loops::Conf {
        loops::Conf {
            n_loops: self.n_loops,
            katanin: self.katanin,
            self_energy_corrections: self.self_energy_corrections,
            max_self_energy_iterations: self.max_self_energy_iterations,
            self_energy_toler: self.self_energy_toler,
            channels: self.channels.clone(),
        }
    }

    /// Characteristic energy at `Λ` to which grids are adapted.
    pub fn characteristic_scale(&self, lambda: f64) -> f64 {
        self.regulator.characteristic_scale(&self.model(), lambda)
    }

    pub fn validate(&self) -> Result<(), Error> {
        for &(name, x) in &[("u", self.u), ("gamma", self.gamma),
                            ("gate_voltage", self.gate_voltage),
                            ("lambda_ini", self.lambda_ini),
                            ("lambda_fin", self.lambda_fin)] {
            if !x.is_finite() {
                return invalid(format!("{} must be finite", name));
            }
        }
        if self.u < 0.0 || self.gamma <= 0.0 {
            return invalid("u must be non-negative and gamma positive");
        }
        if self.n_loops < 1 {
            return invalid("n_loops must be at least 1");
        }
        if self.max_class < 1 || self.max_class > 3 {
            return invalid("max_class must be 1, 2 or 3");
        }
        if self.channels.is_empty() {
            return invalid("at least one channel must be active");
        }
        if self.n_in < 1 {
            return invalid("n_in must be at least 1");
        }
        let grids = &self.grids;
        for &(name, g) in &[("k1", grids.k1), ("k2", grids.k2), ("k3", grids.k3),
                            ("self_energy", grids.self_energy)] {
            if !g.is_valid() {
                return invalid(format!("grid {} must have an odd number of \
                                        at least 5 points and positive \
                                        factors", name));
            }
        }
        if self.lambda_ini == self.lambda_fin {
            return invalid("lambda_ini and lambda_fin must differ");
        }
        if self.regulator == Regulator::Hybridization
            && (self.lambda_ini < 0.0 || self.lambda_fin < 0.0)
        {
            return invalid("hybridization flow requires non-negative lambda");
        }
        if !self.parametrization.supports(self.lambda_ini)
            || !self.parametrization.supports(self.lambda_fin)
        {
            return invalid(format!("{:?} parametrization cannot represent the \
                                    flow range", self.parametrization));
        }
        if self.initial_step == 0.0
            || (self.lambda_fin - self.lambda_ini) * self.initial_step < 0.0
        {
            return invalid("initial_step must point from lambda_ini to lambda_fin");
        }
        let ode = &self.ode;
        if !(ode.relerr > 0.0 && ode.abserr > 0.0 && ode.min_step > 0.0
             && ode.max_step > ode.min_step && ode.max_steps > 0)
        {
            return invalid("ODE tolerances and step bounds must be positive");
        }
        let quad = &self.quadrature;
        if !(quad.relerr > 0.0 && quad.abserr >= 0.0 && quad.max_subdivisions > 0) {
            return invalid("quadrature tolerances must be positive");
        }
        if !(self.self_energy_toler > 0.0 && self.parquet.toler > 0.0) {
            return invalid("tolerances must be positive");
        }
        if !(self.parquet.mix > 0.0 && self.parquet.mix <= 1.0) {
            return invalid("parquet mixing must lie in (0, 1]");
        }
        if self.self_energy_corrections && self.n_loops < 3 {
            return invalid("self_energy_corrections require n_loops >= 3");
        }
        if self.particle_hole_symmetric && self.gate_voltage != 0.0 {
            return invalid("particle_hole_symmetric requires gate_voltage = 0");
        }
        if self.self_energy_corrections && self.static_feedback {
            return invalid("static_feedback excludes self_energy_corrections");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        FrgConf::default().validate().unwrap();
        let conf = FrgConf::from_yaml("u: 2.5\nn_loops: 3\ngrids:\n  k1: {n: 41}\n")
            .unwrap();
        assert_eq!(conf.u, 2.5);
        assert_eq!(conf.grids.k1.n, 41);
        assert_eq!(conf.grids.k2.n, 21);
        assert_eq!(conf.loops().n_loops, 3);
        let back = FrgConf::from_yaml(&conf.to_yaml().unwrap()).unwrap();
        assert_eq!(back, conf);
    }

    #[test]
    fn test_rejects() {
        let cases = [
            "n_loops: 0",
            "max_class: 4",
            "channels: []",
            "grids: {k2: {n: 20}}",
            "lambda_fin: 20.0",
            "lambda_fin: -1.0",
            "initial_step: 1.0",
            "parametrization: exp",
            "self_energy_corrections: true",
            "{n_loops: 3, self_energy_corrections: true, static_feedback: true}",
            "parquet: {mix: 0.0}",
            "ode: {relerr: 0.0}",
            "gate_voltage: 0.2",
        ];
        for case in &cases {
            match FrgConf::from_yaml(case) {
                Err(Error::Invalid(_)) => {}
                r => panic!("{}: unexpected {:?}", case, r),
            }
        }
        FrgConf::from_yaml("{gate_voltage: 0.2, particle_hole_symmetric: false}")
            .unwrap();
        match FrgConf::from_yaml("u: [1") {
            Err(Error::Yaml(_)) => {}
            r => panic!("unexpected {:?}", r),
        }
    }
}
