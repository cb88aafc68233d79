use conv::ValueInto;
use num::Complex;

/// Shorthand for casting numbers.  Panics if out of range.
pub fn cast<T: ValueInto<U>, U>(x: T) -> U {
    x.value_into().expect("integer conversion failure")
}

/// Relative and absolute tolerances.
///
/// Two numbers `x` and `y` are considered equal if
///
/// ```text
/// |x − y| ≤ abserr + relerr × max(|x|, |y|)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Toler {
    pub relerr: f64,
    pub abserr: f64,
}

/// `{ relerr: 1e-8, abserr: 1e-8 }`
impl Default for Toler {
    fn default() -> Self {
        Self {
            relerr: 1e-8,
            abserr: 1e-8,
        }
    }
}

impl Toler {
    pub fn is_eq(&self, x: f64, y: f64) -> bool {
        (x - y).abs() <= self.abserr + self.relerr * f64::max(x.abs(), y.abs())
    }

    pub fn is_eq_complex(&self, x: Complex<f64>, y: Complex<f64>) -> bool {
        (x - y).norm() <= self.abserr + self.relerr * f64::max(x.norm(), y.norm())
    }
}

/// Outcome of an iteration that may stop before meeting its tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Convergence {
    Converged { iterations: usize, residual: f64 },
    NotConverged { iterations: usize, residual: f64 },
}

impl Convergence {
    pub fn new(converged: bool, iterations: usize, residual: f64) -> Self {
        if converged {
            Convergence::Converged { iterations, residual }
        } else {
            Convergence::NotConverged { iterations, residual }
        }
    }

    pub fn is_converged(&self) -> bool {
        match *self {
            Convergence::Converged { .. } => true,
            Convergence::NotConverged { .. } => false,
        }
    }

    pub fn iterations(&self) -> usize {
        match *self {
            Convergence::Converged { iterations, .. }
            | Convergence::NotConverged { iterations, .. } => iterations,
        }
    }

    pub fn residual(&self) -> f64 {
        match *self {
            Convergence::Converged { residual, .. }
            | Convergence::NotConverged { residual, .. } => residual,
        }
    }
}

/// Sign function with `sgn(0) = 0`.
pub fn sgn(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn is_finite(z: Complex<f64>) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toler() {
        let toler = Toler { relerr: 1e-3, abserr: 0.0 };
        assert!(toler.is_eq(1000.0, 1000.5));
        assert!(!toler.is_eq(1.0, 1.01));
        assert!(toler.is_eq_complex(Complex::new(1.0, 1.0),
                                    Complex::new(1.0, 1.0005)));
    }

    #[test]
    fn test_sgn() {
        assert_eq!(sgn(-2.0), -1.0);
        assert_eq!(sgn(0.0), 0.0);
        assert_eq!(sgn(3.0), 1.0);
    }
}
