//! Embedded Runge–Kutta integration with adaptive step size.
//!
//! A [`Solver`](struct.Solver.html) advances `y` from `x0` to a target one
//! attempt at a time.  Each attempt goes through the phases
//!
//! ```text
//! Initialized → Trial → Evaluated → Accepted | Rejected → … → Finished
//! ```
//!
//! and ends in `Failed` if the step becomes too small or the step cap is
//! reached.  A failing right-hand side rejects the attempt like a large
//! error estimate; it is fatal in fixed-step mode or once the step would
//! drop below `min_step`.  The normalized error of an attempt is
//!
//! ```text
//! err = ‖y_high − y_low‖ / (abserr + relerr ‖y‖)
//! ```
//!
//! in the maximum norm; the attempt is accepted if `err ≤ 1`.

use std::fmt;

quick_error! {
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Error {
        InvalidStep(h: f64) {
            display("initial step {} does not point to the target", h)
        }
        StepUnderflow(x: f64, h: f64) {
            display("step size {} underflowed at {}", h, x)
        }
        TooManySteps(n: usize) {
            display("target not reached within {} steps", n)
        }
        Failed(x: f64) {
            display("solver already failed at {}", x)
        }
    }
}

/// Vector space operations needed by the integrator.
pub trait OdeVector: Clone {
    /// `self ← self + α x`
    fn axpy(&mut self, alpha: f64, x: &Self);

    /// `self ← α self`
    fn scale(&mut self, alpha: f64);

    fn max_norm(&self) -> f64;
}

impl OdeVector for f64 {
    fn axpy(&mut self, alpha: f64, x: &Self) {
        *self += alpha * x;
    }

    fn scale(&mut self, alpha: f64) {
        *self *= alpha;
    }

    fn max_norm(&self) -> f64 {
        self.abs()
    }
}

impl OdeVector for Vec<f64> {
    fn axpy(&mut self, alpha: f64, x: &Self) {
        assert_eq!(self.len(), x.len(), "length mismatch");
        for (y, x) in self.iter_mut().zip(x) {
            *y += alpha * x;
        }
    }

    fn scale(&mut self, alpha: f64) {
        for y in self {
            *y *= alpha;
        }
    }

    fn max_norm(&self) -> f64 {
        self.iter().fold(0.0, |m, y| f64::max(m, y.abs()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tableau {
    /// Cash–Karp 4(5), propagating the fifth-order solution.
    CashKarp,
    /// Bogacki–Shampine 2(3), propagating the third-order solution.
    BogackiShampine,
    /// Classic fourth-order Runge–Kutta without error estimate.
    Rk4,
}

struct Coefficients {
    c: &'static [f64],
    a: &'static [&'static [f64]],
    b: &'static [f64],
    /// Difference between the propagated and the embedded weights.
    e: Option<&'static [f64]>,
    /// Order of the embedded (lower-order) solution.
    order: i32,
}

static CASH_KARP: Coefficients = Coefficients {
    c: &[0.0, 0.2, 0.3, 0.6, 1.0, 0.875],
    a: &[
        &[],
        &[0.2],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[0.3, -0.9, 1.2],
        &[-11.0 / 54.0, 2.5, -70.0 / 27.0, 35.0 / 27.0],
        &[1631.0 / 55296.0, 175.0 / 512.0, 575.0 / 13824.0,
          44275.0 / 110592.0, 253.0 / 4096.0],
    ],
    b: &[37.0 / 378.0, 0.0, 250.0 / 621.0, 125.0 / 594.0, 0.0, 512.0 / 1771.0],
    e: Some(&[
        37.0 / 378.0 - 2825.0 / 27648.0,
        0.0,
        250.0 / 621.0 - 18575.0 / 48384.0,
        125.0 / 594.0 - 13525.0 / 55296.0,
        -277.0 / 14336.0,
        512.0 / 1771.0 - 0.25,
    ]),
    order: 4,
};

static BOGACKI_SHAMPINE: Coefficients = Coefficients {
    c: &[0.0, 0.5, 0.75, 1.0],
    a: &[
        &[],
        &[0.5],
        &[0.0, 0.75],
        &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
    ],
    b: &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0],
    e: Some(&[
        2.0 / 9.0 - 7.0 / 24.0,
        1.0 / 3.0 - 0.25,
        4.0 / 9.0 - 1.0 / 3.0,
        -0.125,
    ]),
    order: 2,
};

static RK4: Coefficients = Coefficients {
    c: &[0.0, 0.5, 0.5, 1.0],
    a: &[&[], &[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
    b: &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
    e: None,
    order: 4,
};

impl Tableau {
    fn coefficients(self) -> &'static Coefficients {
        match self {
            Tableau::CashKarp => &CASH_KARP,
            Tableau::BogackiShampine => &BOGACKI_SHAMPINE,
            Tableau::Rk4 => &RK4,
        }
    }

    pub fn has_error_estimate(self) -> bool {
        self.coefficients().e.is_some()
    }
}

/// Flow parameter as a function of the integration variable `t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parametrization {
    /// `Λ = t`
    Linear,
    /// `Λ = t²`, `t ≥ 0`
    Sqrt,
    /// `Λ = exp(−t)`
    Exp,
}

impl Parametrization {
    pub fn t_of(self, lambda: f64) -> f64 {
        match self {
            Parametrization::Linear => lambda,
            Parametrization::Sqrt => lambda.sqrt(),
            Parametrization::Exp => -lambda.ln(),
        }
    }

    pub fn lambda_of(self, t: f64) -> f64 {
        match self {
            Parametrization::Linear => t,
            Parametrization::Sqrt => t * t,
            Parametrization::Exp => (-t).exp(),
        }
    }

    pub fn dlambda_dt(self, t: f64) -> f64 {
        match self {
            Parametrization::Linear => 1.0,
            Parametrization::Sqrt => 2.0 * t,
            Parametrization::Exp => -(-t).exp(),
        }
    }

    /// Whether `Λ` can be represented.
    pub fn supports(self, lambda: f64) -> bool {
        match self {
            Parametrization::Linear => lambda.is_finite(),
            Parametrization::Sqrt => lambda >= 0.0 && lambda.is_finite(),
            Parametrization::Exp => lambda > 0.0 && lambda.is_finite(),
        }
    }
}

const SAFETY: f64 = 0.8;
const MAX_GROWTH: f64 = 2.0;
const MIN_SHRINK: f64 = 0.1;

/// Integrator settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    pub tableau: Tableau,
    pub relerr: f64,
    pub abserr: f64,
    pub min_step: f64,
    pub max_step: f64,
    pub max_steps: usize,
    /// Fixed step size if `false`.
    pub adaptive: bool,
}

/// `{ tableau: CashKarp, relerr: 1e-6, abserr: 1e-8, adaptive: true, .. }`
impl Default for Conf {
    fn default() -> Self {
        Self {
            tableau: Tableau::CashKarp,
            relerr: 1e-6,
            abserr: 1e-8,
            min_step: 1e-10,
            max_step: f64::INFINITY,
            max_steps: 10000,
            adaptive: true,
        }
    }
}

impl Conf {
    pub fn is_adaptive(&self) -> bool {
        self.adaptive && self.tableau.has_error_estimate()
    }

    pub fn make_solver<Y: OdeVector>(self, x: f64, target: f64, step: f64, y: Y)
                                     -> Result<Solver<Y>, Error> {
        if step == 0.0 || !step.is_finite()
            || (target - x) * step < 0.0
        {
            return Err(Error::InvalidStep(step));
        }
        Ok(Solver {
            conf: self,
            x,
            target,
            step,
            y,
            phase: Phase::Initialized,
            report: Report { x, ..Default::default() },
            checkpoints: Vec::new(),
            passed: Vec::new(),
            rejected_last: false,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Initialized,
    Trial,
    Evaluated,
    Accepted,
    Rejected,
    Finished,
    Failed,
}

/// Counters of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Report {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
    pub x: f64,
    pub last_error: f64,
    pub last_step: f64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{accepted: {}, rejected: {}, evaluations: {}, x: {}, \
                   error: {:e}, step: {:e}}}",
               self.accepted, self.rejected, self.evaluations, self.x,
               self.last_error, self.last_step)
    }
}

#[derive(Clone, Debug)]
pub struct Solver<Y> {
    conf: Conf,
    x: f64,
    target: f64,
    /// Proposed size of the next step, pointing to the target.
    step: f64,
    y: Y,
    phase: Phase,
    report: Report,
    /// Pending checkpoints, nearest last.
    checkpoints: Vec<f64>,
    passed: Vec<f64>,
    rejected_last: bool,
}

impl<Y: OdeVector> Solver<Y> {
    /// Values of `x` to be reported once an accepted step reaches them.
    /// They do not influence the step sizes.
    pub fn with_checkpoints(mut self, mut checkpoints: Vec<f64>) -> Self {
        let (x, target) = (self.x, self.target);
        let ahead = |c: f64| (c - x) * (target - x) > 0.0
            && (target - c) * (target - x) >= 0.0;
        checkpoints.retain(|&c| ahead(c));
        // nearest last
        checkpoints.sort_by(|a, b| {
            let da = (a - x).abs();
            let db = (b - x).abs();
            db.partial_cmp(&da).unwrap_or(::std::cmp::Ordering::Equal)
        });
        checkpoints.dedup();
        self.checkpoints = checkpoints;
        self
    }

    pub fn conf(&self) -> &Conf {
        &self.conf
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> &Y {
        &self.y
    }

    pub fn y_mut(&mut self) -> &mut Y {
        &mut self.y
    }

    pub fn into_y(self) -> Y {
        self.y
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Checkpoints reached by the last accepted step.
    pub fn take_passed_checkpoints(&mut self) -> Vec<f64> {
        ::std::mem::replace(&mut self.passed, Vec::new())
    }

    /// Propagated solution and error increment for a step of size `h`.
    fn evaluate<E, F>(&mut self, f: &mut F, h: f64) -> Result<(Y, Option<Y>), E>
        where F: FnMut(f64, &Y) -> Result<Y, E>
    {
        let coeffs = self.conf.tableau.coefficients();
        let mut k: Vec<Y> = Vec::with_capacity(coeffs.c.len());
        for (i, &c) in coeffs.c.iter().enumerate() {
            let mut yi = self.y.clone();
            for (j, &a) in coeffs.a[i].iter().enumerate() {
                if a != 0.0 {
                    yi.axpy(h * a, &k[j]);
                }
            }
            k.push(f(self.x + c * h, &yi)?);
            self.report.evaluations += 1;
        }
        let mut high = self.y.clone();
        for (kj, &b) in k.iter().zip(coeffs.b) {
            if b != 0.0 {
                high.axpy(h * b, kj);
            }
        }
        let delta = coeffs.e.map(|e| {
            let mut delta = k[0].clone();
            delta.scale(h * e[0]);
            for (kj, &ej) in k.iter().zip(e).skip(1) {
                if ej != 0.0 {
                    delta.axpy(h * ej, kj);
                }
            }
            delta
        });
        Ok((high, delta))
    }

    fn fail<E: From<Error>>(&mut self, err: Error) -> E {
        self.phase = Phase::Failed;
        err.into()
    }

    /// Attempt one step.  Returns the phase reached: `Accepted`, `Rejected`
    /// or `Finished`.
    pub fn step<E, F>(&mut self, f: &mut F) -> Result<Phase, E>
        where F: FnMut(f64, &Y) -> Result<Y, E>,
              E: From<Error>
    {
        match self.phase {
            Phase::Finished => return Ok(Phase::Finished),
            Phase::Failed => return Err(Error::Failed(self.x).into()),
            _ => {}
        }
        let attempts = self.report.accepted + self.report.rejected;
        if attempts >= self.conf.max_steps {
            return Err(self.fail(Error::TooManySteps(self.conf.max_steps)));
        }
        self.phase = Phase::Trial;
        let remaining = self.target - self.x;
        let mut h = self.step;
        if self.conf.is_adaptive() && h.abs() > self.conf.max_step {
            h = self.conf.max_step * h.signum();
        }
        let last = h.abs() >= remaining.abs();
        if last {
            h = remaining;
        }
        let (high, delta) = match self.evaluate(f, h) {
            Ok(r) => r,
            Err(e) => {
                let step = h * MIN_SHRINK;
                if !self.conf.is_adaptive() || step.abs() < self.conf.min_step {
                    self.phase = Phase::Failed;
                    return Err(e);
                }
                debug!("right-hand side failed at x = {} with step {}", self.x, h);
                self.step = step;
                self.report.rejected += 1;
                self.rejected_last = true;
                self.phase = Phase::Rejected;
                return Ok(self.phase);
            }
        };
        self.phase = Phase::Evaluated;
        let err = match delta {
            Some(ref delta) if self.conf.is_adaptive() => {
                let scale = f64::max(self.y.max_norm(), high.max_norm());
                delta.max_norm() / (self.conf.abserr + self.conf.relerr * scale)
            }
            _ => 0.0,
        };
        if !err.is_finite() {
            return Err(self.fail(Error::StepUnderflow(self.x, h)));
        }
        let order = f64::from(self.conf.tableau.coefficients().order);
        if err <= 1.0 {
            let x_old = self.x;
            self.x = if last { self.target } else { self.x + h };
            self.y = high;
            self.report.accepted += 1;
            self.report.x = self.x;
            self.report.last_error = err;
            self.report.last_step = h;
            if self.conf.is_adaptive() {
                let mut factor = if err == 0.0 {
                    MAX_GROWTH
                } else {
                    f64::min(SAFETY * err.powf(-1.0 / (order + 1.0)), MAX_GROWTH)
                };
                if self.rejected_last {
                    factor = f64::min(factor, 1.0);
                }
                // a clipped final step says nothing about the step size
                if !last {
                    self.step = h * factor;
                }
            }
            self.rejected_last = false;
            let x_new = self.x;
            while let Some(&c) = self.checkpoints.last() {
                if (c - x_old) * (x_new - c) >= 0.0 {
                    self.passed.push(c);
                    self.checkpoints.pop();
                } else {
                    break;
                }
            }
            self.phase = if last { Phase::Finished } else { Phase::Accepted };
        } else {
            let factor = f64::max(SAFETY * err.powf(-1.0 / order), MIN_SHRINK);
            self.step = h * factor;
            self.report.rejected += 1;
            self.report.last_error = err;
            self.rejected_last = true;
            if self.step.abs() < self.conf.min_step {
                return Err(self.fail(Error::StepUnderflow(self.x, self.step)));
            }
            self.phase = Phase::Rejected;
        }
        Ok(self.phase)
    }

    /// Step until the target is reached.  `observer` is called after every
    /// accepted step with the checkpoints it passed.
    pub fn run<E, F, O>(&mut self, mut f: F, mut observer: O) -> Result<Report, E>
        where F: FnMut(f64, &Y) -> Result<Y, E>,
              O: FnMut(&Self, &[f64]) -> Result<(), E>,
              E: From<Error>
    {
        loop {
            match self.step(&mut f)? {
                Phase::Accepted | Phase::Finished => {
                    let passed = self.take_passed_checkpoints();
                    observer(self, &passed)?;
                    if self.is_finished() {
                        return Ok(self.report);
                    }
                }
                _ => {}
            }
        }
    }
}
