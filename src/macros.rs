/// Check whether two `f64` numbers are equal within the given
/// [`Toler`](utils/struct.Toler.html).
///
/// ```
/// #[macro_use]
/// extern crate mfrg;
///
/// use mfrg::utils::Toler;
///
/// fn main() {
///     toler_assert_eq!(Toler { abserr: 1e-2, relerr: 1e-3 }, 10.0, 10.02);
/// }
/// ```
#[macro_export]
macro_rules! toler_assert_eq {
    ($toler:expr, $left:expr, $right:expr) => {
        let toler = &$toler;
        let left = $left;
        let right = $right;
        assert!(toler.is_eq(left, right),
                "{} does not equal to {} within {:?}",
                left, right, toler)
    }
}

/// Complex version of [`toler_assert_eq!`](macro.toler_assert_eq.html).
///
/// ```
/// #[macro_use]
/// extern crate mfrg;
/// extern crate num;
///
/// use mfrg::utils::Toler;
/// use num::Complex;
///
/// fn main() {
///     toler_assert_complex_eq!(Toler { abserr: 1e-9, relerr: 0.0 },
///                              Complex::new(1.0, -2.0),
///                              Complex::new(1.0, -2.0));
/// }
/// ```
#[macro_export]
macro_rules! toler_assert_complex_eq {
    ($toler:expr, $left:expr, $right:expr) => {
        let toler = &$toler;
        let left = $left;
        let right = $right;
        assert!(toler.is_eq_complex(left, right),
                "{} does not equal to {} within {:?}",
                left, right, toler)
    }
}
