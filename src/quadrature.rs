//! Adaptive Gauss–Kronrod quadrature of complex integrands.
//!
//! Each subinterval is integrated with the 15-point Kronrod rule; the local
//! error estimate is `|K15 − G7|`, where `G7` is the embedded 7-point Gauss
//! rule.  The subinterval with the largest estimate is bisected until the
//! summed estimate drops below `max(abserr, relerr × |I|)` or the number of
//! bisections reaches `max_subdivisions`.  Infinite tails are mapped onto
//! `[0, 1)` through `x = b ± scale × s / (1 − s)`.

use std::cmp::Ordering;
use std::f64;
use num::Zero;
use super::data::Complex64;
use super::utils::is_finite;

quick_error! {
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Error {
        NonFinite(x: f64) {
            display("integrand is not finite at {}", x)
        }
    }
}

/// Abscissae of the 15-point Kronrod rule on `[−1, 1]` (non-negative half).
const XGK: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];

const WGK: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];

/// Weights of the 7-point Gauss rule at `XGK[1]`, `XGK[3]`, `XGK[5]`,
/// `XGK[7]`.
const WG: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

/// Quadrature tolerances.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    pub relerr: f64,
    pub abserr: f64,
    pub max_subdivisions: usize,
}

/// `{ relerr: 1e-6, abserr: 1e-10, max_subdivisions: 200 }`
impl Default for Conf {
    fn default() -> Self {
        Self {
            relerr: 1e-6,
            abserr: 1e-10,
            max_subdivisions: 200,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integral {
    pub value: Complex64,
    pub abserr: f64,
    /// Whether the tolerance was met within the subdivision cap.
    pub converged: bool,
}

#[derive(Clone, Copy, Debug)]
enum Map {
    Identity,
    /// `[b, ∞)`
    Upper(f64, f64),
    /// `(−∞, b]`
    Lower(f64, f64),
}

impl Map {
    /// Point and Jacobian.
    fn apply(self, s: f64) -> (f64, f64) {
        match self {
            Map::Identity => (s, 1.0),
            Map::Upper(b, scale) => {
                let r = 1.0 / (1.0 - s);
                (b + scale * s * r, scale * r * r)
            }
            Map::Lower(b, scale) => {
                let r = 1.0 / (1.0 - s);
                (b - scale * s * r, scale * r * r)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    lo: f64,
    hi: f64,
    map: Map,
    value: Complex64,
    err: f64,
}

fn gauss_kronrod<F>(f: &F, lo: f64, hi: f64, map: Map)
                    -> Result<Segment, Error>
    where F: Fn(f64) -> Complex64
{
    let center = 0.5 * (lo + hi);
    let half = 0.5 * (hi - lo);
    let eval = |s: f64| -> Result<Complex64, Error> {
        let (x, jacobian) = map.apply(s);
        let y = f(x) * jacobian;
        if is_finite(y) { Ok(y) } else { Err(Error::NonFinite(x)) }
    };
    let fc = eval(center)?;
    let mut kronrod = fc * WGK[7];
    let mut gauss = fc * WG[3];
    for j in 0..7 {
        let dx = half * XGK[j];
        let sum = eval(center - dx)? + eval(center + dx)?;
        kronrod += sum * WGK[j];
        if j % 2 == 1 {
            gauss += sum * WG[j / 2];
        }
    }
    Ok(Segment {
        lo,
        hi,
        map,
        value: kronrod * half,
        err: ((kronrod - gauss) * half).norm(),
    })
}

impl Conf {
    fn adapt<F>(&self, f: &F, mut segments: Vec<Segment>)
                -> Result<Integral, Error>
        where F: Fn(f64) -> Complex64
    {
        let mut subdivisions = 0;
        loop {
            let value = segments.iter()
                .fold(Complex64::zero(), |s, seg| s + seg.value);
            let err: f64 = segments.iter().map(|seg| seg.err).sum();
            if err <= f64::max(self.abserr, self.relerr * value.norm()) {
                return Ok(Integral { value, abserr: err, converged: true });
            }
            if subdivisions >= self.max_subdivisions {
                return Ok(Integral { value, abserr: err, converged: false });
            }
            let (worst, _) = segments.iter().enumerate()
                .fold((0, -1.0), |(i, e), (j, seg)| {
                    if seg.err > e { (j, seg.err) } else { (i, e) }
                });
            let seg = segments[worst];
            let mid = 0.5 * (seg.lo + seg.hi);
            if !(seg.lo < mid && mid < seg.hi) {
                return Ok(Integral { value, abserr: err, converged: false });
            }
            segments[worst] = gauss_kronrod(f, seg.lo, mid, seg.map)?;
            segments.push(gauss_kronrod(f, mid, seg.hi, seg.map)?);
            subdivisions += 1;
        }
    }

    /// `∫[a, b] f(x) dx`, split at the given breakpoints.
    pub fn integrate<F>(&self, f: F, a: f64, b: f64, breakpoints: &[f64])
                        -> Result<Integral, Error>
        where F: Fn(f64) -> Complex64
    {
        let points = split_points(breakpoints, a, b);
        let mut segments = Vec::with_capacity(points.len());
        for w in points.windows(2) {
            segments.push(gauss_kronrod(&f, w[0], w[1], Map::Identity)?);
        }
        self.adapt(&f, segments)
    }

    /// `∫[a, ∞) f(x) dx`, the tail beyond the last breakpoint being mapped
    /// with the given scale.
    pub fn integrate_upper<F>(&self, f: F, a: f64, breakpoints: &[f64],
                              tail_scale: f64) -> Result<Integral, Error>
        where F: Fn(f64) -> Complex64
    {
        let inner: Vec<f64> = breakpoints.iter().cloned()
            .filter(|&x| x.is_finite() && x > a)
            .collect();
        let last = inner.iter().cloned().fold(a, f64::max);
        let points = split_points(&inner, a, last);
        let mut segments = Vec::with_capacity(points.len());
        for w in points.windows(2) {
            segments.push(gauss_kronrod(&f, w[0], w[1], Map::Identity)?);
        }
        segments.push(gauss_kronrod(&f, 0.0, 1.0, Map::Upper(last, tail_scale))?);
        self.adapt(&f, segments)
    }

    /// `∫ f(x) dx` over the real line, split at the breakpoints, both tails
    /// being mapped with the given scale.
    pub fn integrate_real_line<F>(&self, f: F, breakpoints: &[f64],
                                  tail_scale: f64) -> Result<Integral, Error>
        where F: Fn(f64) -> Complex64
    {
        let mut points: Vec<f64> = breakpoints.iter().cloned()
            .filter(|x| x.is_finite())
            .collect();
        if points.is_empty() {
            points.push(0.0);
        }
        points.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
        points.dedup_by(|x, y| (*x - *y).abs() <= 1e-14 * f64::max(1.0, x.abs()));
        let mut segments = Vec::with_capacity(points.len() + 1);
        segments.push(gauss_kronrod(&f, 0.0, 1.0, Map::Lower(points[0], tail_scale))?);
        for w in points.windows(2) {
            segments.push(gauss_kronrod(&f, w[0], w[1], Map::Identity)?);
        }
        let last = points[points.len() - 1];
        segments.push(gauss_kronrod(&f, 0.0, 1.0, Map::Upper(last, tail_scale))?);
        self.adapt(&f, segments)
    }
}

/// Sorted, deduplicated points `a = x0 < x1 < … < b` including all
/// breakpoints strictly inside `(a, b)`.
fn split_points(breakpoints: &[f64], a: f64, b: f64) -> Vec<f64> {
    let mut points = vec![a];
    let mut inner: Vec<f64> = breakpoints.iter().cloned()
        .filter(|&x| x > a && x < b)
        .collect();
    inner.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
    for x in inner {
        let last = points[points.len() - 1];
        if x - last > 1e-14 * f64::max(1.0, x.abs()) {
            points.push(x);
        }
    }
    if b > points[points.len() - 1] {
        points.push(b);
    }
    points
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use num::Complex;
    use super::*;
    use super::super::utils::Toler;

    fn re(x: f64) -> Complex64 {
        Complex::new(x, 0.0)
    }

    #[test]
    fn test_polynomial_exact() {
        let conf = Conf::default();
        let r = conf.integrate(|x| re(x.powi(5) - 3.0 * x * x), 0.0, 2.0, &[])
            .unwrap();
        assert!(r.converged);
        toler_assert_eq!(Toler { relerr: 1e-14, abserr: 1e-14 },
                         r.value.re, 64.0 / 6.0 - 8.0);
        assert!(r.abserr < 1e-12);
    }

    #[test]
    fn test_breakpoints() {
        let conf = Conf { relerr: 1e-10, abserr: 0.0, ..Default::default() };
        // kink at x = 0.3
        let r = conf.integrate(|x| re((x - 0.3).abs()), 0.0, 1.0, &[0.3, 5.0])
            .unwrap();
        assert!(r.converged);
        toler_assert_eq!(Toler { relerr: 1e-12, abserr: 0.0 },
                         r.value.re, 0.5 * (0.09 + 0.49));
    }

    #[test]
    fn test_tails() {
        let conf = Conf { relerr: 1e-10, abserr: 1e-14, ..Default::default() };
        let toler = Toler { relerr: 1e-9, abserr: 1e-12 };
        let r = conf.integrate_real_line(|x| re(1.0 / (1.0 + x * x)), &[], 1.0)
            .unwrap();
        assert!(r.converged);
        toler_assert_eq!(toler, r.value.re, PI);

        // ∫ dx / (ix + 1)² over the real line vanishes
        let r = conf.integrate_real_line(|x| {
            let d = Complex::new(1.0, x);
            (d * d).inv()
        }, &[-1.0, 2.0], 3.0).unwrap();
        assert!(r.value.norm() < 1e-9);

        let r = conf.integrate_upper(|x| re((-x).exp()), 0.0, &[1.0], 1.0)
            .unwrap();
        toler_assert_eq!(toler, r.value.re, 1.0);
    }

    #[test]
    fn test_non_finite() {
        let conf = Conf::default();
        assert_eq!(conf.integrate(|x| re(1.0 / x), -1.0, 1.0, &[]),
                   Err(Error::NonFinite(0.0)));
    }

    #[test]
    fn test_not_converged() {
        let conf = Conf { relerr: 1e-14, abserr: 0.0, max_subdivisions: 3 };
        let r = conf.integrate(|x| re(1.0 / x.sqrt()), 0.0, 1.0, &[]).unwrap();
        assert!(!r.converged);
        assert!((r.value.re - 2.0).abs() < 0.1);
    }
}
