//! Integration of the flow equations in `Λ`.

use std::fmt;
use super::bubble::Stats;
use super::config::{FrgConf, InitialState};
use super::frequency_grid;
use super::hartree;
use super::loops::{self, LoopCalculator};
use super::ode::{self, OdeVector, Parametrization, Phase};
use super::parquet;
use super::perturbation;
use super::state::{self, State};
use super::symmetry;
use super::utils::Convergence;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        Rhs(lambda: f64, err: loops::Error) {
            source(err)
            display("right-hand side failed at lambda = {}: {}", lambda, err)
        }
        Ode(err: ode::Error) {
            from()
            source(err)
            display("{}", err)
        }
        State(err: state::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Grid(err: frequency_grid::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Symmetry(err: symmetry::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Hartree(err: hartree::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Perturbation(err: perturbation::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Parquet(err: parquet::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Observer(msg: String) {
            display("observer failed: {}", msg)
        }
    }
}

/// `dΓ/dΛ` and `dΣ/dΛ` at `lambda`.  The flow parameter stored in `state`
/// is ignored, since intermediate Runge–Kutta stages do not update it.
pub fn rhs(conf: &FrgConf, lambda: f64, state: &State, stats: &mut Stats)
           -> Result<State, Error> {
    let loops = conf.loops();
    let calc = LoopCalculator::new(&loops, conf.quadrature, conf.model(),
                                   conf.regulator, lambda);
    let derivative = calc.derivative(&state.vertex, &state.self_energy)
        .map_err(|e| Error::Rhs(lambda, e))?;
    stats.merge(&derivative.stats);
    let mut self_energy = derivative.self_energy;
    if conf.static_feedback {
        self_energy.scale(0.0);
    }
    let result = State {
        lambda,
        vertex: derivative.vertex,
        self_energy,
        conf: state.conf.clone(),
    };
    debug!("rhs: {{lambda: {}, vertex: {:e}, self_energy: {:e}}}",
           lambda, result.vertex.max_norm(), result.self_energy.max_norm());
    Ok(result)
}

/// State at `lambda_ini` as selected by `initial_state`.
pub fn initial_state(conf: &FrgConf) -> Result<State, Error> {
    let lambda = conf.lambda_ini;
    Ok(match conf.initial_state {
        InitialState::Bare => State::bare(conf, lambda)?,
        InitialState::Sopt => perturbation::sopt_state(conf, lambda)?,
        InitialState::Parquet => {
            let guess = perturbation::sopt_state(conf, lambda)?;
            let mut run = conf.parquet.make_run(guess);
            let convergence = run.do_run()?;
            if !convergence.is_converged() {
                warn!("starting the flow from an unconverged parquet solution");
            }
            run.into_state()
        }
    })
}

/// Results of a completed flow.
#[derive(Clone, Debug)]
pub struct Report {
    pub ode: ode::Report,
    pub stats: Stats,
    pub state: state::Summary,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "- {{final: {}}}", self.state)?;
        writeln!(f, "- {{ode: {}}}", self.ode)?;
        write!(f, "- {{bubbles: {{computed: {}, copied: {}, unconverged: {}}}}}",
               self.stats.computed, self.stats.copied, self.stats.unconverged)
    }
}

pub struct Run {
    conf: FrgConf,
    parametrization: Parametrization,
    solver: ode::Solver<State>,
    stats: Stats,
}

impl Run {
    pub fn new(state: State) -> Result<Self, Error> {
        let conf = state.conf.clone();
        let p = conf.parametrization;
        let t_ini = p.t_of(conf.lambda_ini);
        let t_fin = p.t_of(conf.lambda_fin);
        let first = conf.lambda_ini + conf.initial_step;
        let t_first = if p.supports(first)
            && (first - conf.lambda_fin) * (conf.lambda_ini - conf.lambda_fin) > 0.0
        {
            p.t_of(first)
        } else {
            t_fin
        };
        let checkpoints = conf.checkpoints.iter()
            .filter(|&&c| p.supports(c))
            .map(|&c| p.t_of(c))
            .collect();
        let solver = conf.ode.make_solver(t_ini, t_fin, t_first - t_ini, state)?
            .with_checkpoints(checkpoints);
        Ok(Self { conf, parametrization: p, solver, stats: Stats::default() })
    }

    pub fn conf(&self) -> &FrgConf {
        &self.conf
    }

    pub fn state(&self) -> &State {
        self.solver.y()
    }

    pub fn lambda(&self) -> f64 {
        self.parametrization.lambda_of(self.solver.x())
    }

    pub fn is_finished(&self) -> bool {
        self.solver.is_finished()
    }

    /// Attempt one step.  After an accepted step the state is checked and
    /// the grids are optionally re-fitted.  Returns the `Λ` of the
    /// checkpoints that were passed.
    pub fn step(&mut self) -> Result<(Phase, Vec<f64>), Error> {
        let (phase, passed) = {
            let conf = &self.conf;
            let p = self.parametrization;
            let stats = &mut self.stats;
            let mut f = |t: f64, y: &State| -> Result<State, Error> {
                let mut dy = rhs(conf, p.lambda_of(t), y, stats)?;
                dy.scale(p.dlambda_dt(t));
                Ok(dy)
            };
            let phase = self.solver.step(&mut f)?;
            (phase, self.solver.take_passed_checkpoints())
        };
        if phase == Phase::Rejected {
            debug!("step rejected at lambda = {}", self.lambda());
            return Ok((phase, Vec::new()));
        }
        let lambda = self.lambda();
        {
            let state = self.solver.y_mut();
            state.lambda = lambda;
            state.check()?;
            if state.conf.update_grids {
                state.update_grids();
                state.optimize_self_energy_grid();
            }
        }
        let report = *self.solver.report();
        info!("- {{lambda: {}, step: {:e}, error: {:e}, accepted: {}, rejected: {}}}",
              lambda, report.last_step, report.last_error, report.accepted,
              report.rejected);
        let passed = passed.into_iter()
            .map(|t| self.parametrization.lambda_of(t))
            .collect();
        Ok((phase, passed))
    }

    /// Integrate up to `lambda_fin`.  `observer` is called after every
    /// accepted step with the checkpoints it passed.
    pub fn do_run<O>(&mut self, mut observer: O) -> Result<Report, Error>
        where O: FnMut(&State, &[f64]) -> Result<(), Error>
    {
        loop {
            let (phase, passed) = self.step()?;
            if phase == Phase::Rejected {
                continue;
            }
            observer(self.state(), &passed)?;
            if phase == Phase::Finished {
                return Ok(self.report());
            }
        }
    }

    pub fn report(&self) -> Report {
        Report {
            ode: *self.solver.report(),
            stats: self.stats,
            state: self.state().summary(),
        }
    }

    pub fn into_state(self) -> State {
        self.solver.into_y()
    }
}

/// Solve the parquet equations at `lambda_ini`.
pub fn solve_parquet(conf: &FrgConf) -> Result<(State, Convergence), Error> {
    let guess = match conf.initial_state {
        InitialState::Bare => State::bare(conf, conf.lambda_ini)?,
        _ => perturbation::sopt_state(conf, conf.lambda_ini)?,
    };
    let mut run = conf.parquet.make_run(guess);
    let convergence = run.do_run()?;
    Ok((run.into_state(), convergence))
}

/// Invertibility of the initial grids and, if requested, a randomized
/// round-trip test of the symmetry tables.  Run once before any computation.
pub fn self_check(conf: &FrgConf) -> Result<(), Error> {
    let (vertex, sigma) = state::guess_grids(conf, conf.lambda_ini);
    for grid in &[&vertex.k1, &vertex.k2_bosonic, &vertex.k2_fermionic,
                  &vertex.k3_bosonic, &vertex.k3_fermionic, &sigma] {
        grid.check_invertibility()?;
    }
    if conf.check_symmetries {
        symmetry::self_check(1000, *b"mfrg-symmetries!")?;
        debug!("symmetry self-check passed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::frequency_grid::GridConf;

    fn conf() -> FrgConf {
        let mut conf = FrgConf::default();
        conf.u = 0.5;
        conf.lambda_ini = 4.0;
        conf.lambda_fin = 3.0;
        conf.initial_step = -0.5;
        conf.grids.k1 = GridConf::with_n(7);
        conf.grids.self_energy = GridConf::with_n(9);
        conf.ode.relerr = 1e-4;
        conf.ode.abserr = 1e-6;
        conf
    }

    #[test]
    fn test_static_feedback_keeps_self_energy() {
        let mut conf = conf();
        conf.static_feedback = true;
        conf.initial_state = InitialState::Bare;
        conf.validate().unwrap();
        let state = initial_state(&conf).unwrap();
        let mut stats = Stats::default();
        let dy = rhs(&conf, 3.5, &state, &mut stats).unwrap();
        assert_eq!(dy.self_energy.max_norm(), 0.0);
        assert!(dy.vertex.max_norm() > 0.0);
        assert!(stats.computed > 0);
    }

    #[test]
    fn test_checkpoints_are_reported() {
        let mut conf = conf();
        conf.initial_state = InitialState::Bare;
        conf.checkpoints = vec![3.5, 10.0];
        let mut run = Run::new(initial_state(&conf).unwrap()).unwrap();
        let mut seen = Vec::new();
        let report = run.do_run(|state, passed| {
            state.check()?;
            seen.extend_from_slice(passed);
            Ok(())
        }).unwrap();
        assert_eq!(seen.len(), 1);
        assert!((seen[0] - 3.5).abs() < 1e-12);
        assert!(report.ode.accepted >= 2);
        let state = run.into_state();
        assert!((state.lambda - 3.0).abs() < 1e-12);
        state.check().unwrap();
    }
}
