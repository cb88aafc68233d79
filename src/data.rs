//! Dense multi-dimensional arrays of complex amplitudes.
//!
//! Elementwise arithmetic is restricted to a small set of named operations
//! (`add`, `scale`, `map`, `zip_map`), all of which are pointwise and
//! preserve the shape.  Combining containers of different shapes is a
//! programming error and panics.

use num::Complex;
use num::Zero;

pub type Complex64 = Complex<f64>;

/// Row-major dense array; the last index varies fastest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataContainer {
    dims: Vec<usize>,
    data: Vec<Complex64>,
}

impl DataContainer {
    pub fn zeros(dims: &[usize]) -> Self {
        let len = dims.iter().product();
        Self {
            dims: dims.to_vec(),
            data: vec![Complex64::zero(); len],
        }
    }

    /// Wrap row-major data.  Panics if the length does not match.
    pub fn from_vec(dims: &[usize], data: Vec<Complex64>) -> Self {
        assert_eq!(dims.iter().product::<usize>(), data.len(), "shape mismatch");
        Self { dims: dims.to_vec(), data }
    }

    pub fn from_fn<F>(dims: &[usize], mut f: F) -> Self
        where F: FnMut(&[usize]) -> Complex64
    {
        let mut this = Self::zeros(dims);
        let mut index = vec![0; dims.len()];
        for i in 0..this.data.len() {
            this.unflatten_into(i, &mut index);
            this.data[i] = f(&index);
        }
        this
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    /// Distance in the flat array between neighbors along `axis`.
    pub fn stride(&self, axis: usize) -> usize {
        self.dims[axis + 1..].iter().product()
    }

    pub fn flatten(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.dims.len());
        let mut flat = 0;
        for (&i, &n) in index.iter().zip(&self.dims) {
            debug_assert!(i < n, "index {:?} out of {:?}", index, self.dims);
            flat = flat * n + i;
        }
        flat
    }

    pub fn unflatten_into(&self, mut flat: usize, index: &mut [usize]) {
        for (i, &n) in index.iter_mut().zip(&self.dims).rev() {
            *i = flat % n;
            flat /= n;
        }
    }

    pub fn unflatten(&self, flat: usize) -> Vec<usize> {
        let mut index = vec![0; self.dims.len()];
        self.unflatten_into(flat, &mut index);
        index
    }

    pub fn at(&self, index: &[usize]) -> Complex64 {
        self.data[self.flatten(index)]
    }

    pub fn set(&mut self, index: &[usize], value: Complex64) {
        let i = self.flatten(index);
        self.data[i] = value;
    }

    fn assert_same_shape(&self, other: &Self) {
        assert_eq!(self.dims, other.dims, "shape mismatch");
    }

    /// `self[i] ← self[i] + other[i]`
    pub fn add(&mut self, other: &Self) {
        self.assert_same_shape(other);
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x += *y;
        }
    }

    /// `self[i] ← self[i] + α other[i]`
    pub fn add_scaled(&mut self, alpha: f64, other: &Self) {
        self.assert_same_shape(other);
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x += *y * alpha;
        }
    }

    /// `self[i] ← α self[i]`
    pub fn scale(&mut self, alpha: f64) {
        for x in &mut self.data {
            *x *= alpha;
        }
    }

    /// `self[i] ← f(self[i])`
    pub fn map<F: FnMut(Complex64) -> Complex64>(&mut self, mut f: F) {
        for x in &mut self.data {
            *x = f(*x);
        }
    }

    /// `self[i] ← f(self[i], other[i])`
    pub fn zip_map<F>(&mut self, other: &Self, mut f: F)
        where F: FnMut(Complex64, Complex64) -> Complex64
    {
        self.assert_same_shape(other);
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x = f(*x, *y);
        }
    }

    /// `max[i] |self[i]|`
    pub fn max_norm(&self) -> f64 {
        self.data.iter().fold(0.0, |m, x| f64::max(m, x.norm()))
    }

    /// `max[i] |self[i] − other[i]|`
    pub fn max_distance(&self, other: &Self) -> f64 {
        self.assert_same_shape(other);
        self.data.iter().zip(&other.data)
            .fold(0.0, |m, (x, y)| f64::max(m, (x - y).norm()))
    }

    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|x| x.re.is_finite() && x.im.is_finite())
    }

    /// Apply `f` to every one-dimensional line along `axis`.  The line is
    /// passed as a contiguous buffer and written back afterwards.
    pub fn map_lines<F>(&mut self, axis: usize, mut f: F)
        where F: FnMut(&mut [Complex64])
    {
        let n = self.dims[axis];
        let stride = self.stride(axis);
        let outer: usize = self.dims[..axis].iter().product();
        let mut line = vec![Complex64::zero(); n];
        for o in 0..outer {
            for s in 0..stride {
                let base = o * n * stride + s;
                for k in 0..n {
                    line[k] = self.data[base + k * stride];
                }
                f(&mut line);
                for k in 0..n {
                    self.data[base + k * stride] = line[k];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexing() {
        let a = DataContainer::from_fn(&[2, 3, 4], |i| {
            Complex64::new((100 * i[0] + 10 * i[1] + i[2]) as f64, 0.0)
        });
        assert_eq!(a.len(), 24);
        assert_eq!(a.stride(0), 12);
        assert_eq!(a.stride(2), 1);
        assert_eq!(a.at(&[1, 2, 3]).re, 123.0);
        for flat in 0..a.len() {
            assert_eq!(a.flatten(&a.unflatten(flat)), flat);
        }
    }

    #[test]
    fn test_elementwise() {
        let mut a = DataContainer::from_fn(&[3, 2], |i| {
            Complex64::new(i[0] as f64, i[1] as f64)
        });
        let b = a.clone();
        a.add(&b);
        assert_eq!(a.at(&[2, 1]), Complex64::new(4.0, 2.0));
        a.scale(0.5);
        assert_eq!(a, b);
        a.add_scaled(-1.0, &b);
        assert_eq!(a.max_norm(), 0.0);
        a.map(|_| Complex64::new(1.0, 0.0));
        a.zip_map(&b, |x, y| x * y);
        assert_eq!(a, b);
        assert_eq!(a.max_distance(&b), 0.0);
        assert!(a.all_finite());
        a.set(&[0, 0], Complex64::new(f64::NAN, 0.0));
        assert!(!a.all_finite());
    }

    #[test]
    #[should_panic]
    fn test_shape_mismatch() {
        let mut a = DataContainer::zeros(&[3, 2]);
        a.add(&DataContainer::zeros(&[2, 3]));
    }

    #[test]
    fn test_map_lines() {
        let mut a = DataContainer::from_fn(&[2, 3, 2], |i| {
            Complex64::new(i[1] as f64, 0.0)
        });
        a.map_lines(1, |line| {
            assert_eq!(line.len(), 3);
            for (k, x) in line.iter().enumerate() {
                assert_eq!(x.re, k as f64);
            }
            line.reverse();
        });
        assert_eq!(a.at(&[1, 0, 1]).re, 2.0);
        assert_eq!(a.at(&[0, 2, 0]).re, 0.0);
    }
}
