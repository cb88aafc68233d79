//! Symmetry transformations of the SU(2)-symmetric impurity vertex.
//!
//! Only the spin component `V = Γ↑↓↑↓` of each reducible vertex `γ_r` is
//! stored, and of the two classes with two frequency arguments only `K2`
//! (depending on `w` and `v`); `V̂ = Γ↓↑↑↓` and `K2b` (depending on `w` and
//! `v'`) are obtained through
//!
//! ```text
//! T1: exchange of the outgoing legs     Γ(1'2';12) = −Γ(2'1';12)
//! T2: exchange of the incoming legs     Γ(1'2';12) = −Γ(1'2';21)
//! T3: exchange of both                  Γ(1'2';12) =  Γ(2'1';21)
//! TC: complex conjugation               Γ(1'2';12) =  Γ(−1 −2;−1' −2')*
//! ```
//!
//! T1 and T2 interchange the channels `a` and `t` and map `V ↔ V̂`.

use std::fmt;
use num::Complex;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use super::data::Complex64;
use super::frequencies::{Bosonic, Channel};
use super::interpolation::Rank;

quick_error! {
    #[derive(Clone, Debug, PartialEq)]
    pub enum Error {
        RoundTrip(original: String, back: String) {
            display("symmetry round trip failed: {} -> {}", original, back)
        }
        Sector(indices: String) {
            display("sector table does not reach the canonical sector: {}",
                    indices)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spin {
    /// `↑↓↑↓`
    V,
    /// `↓↑↑↓`
    Vhat,
}

impl Spin {
    pub fn flipped(self) -> Self {
        match self {
            Spin::V => Spin::Vhat,
            Spin::Vhat => Spin::V,
        }
    }
}

/// Diagrammatic class by frequency dependence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Class {
    /// `K1(w)`
    K1,
    /// `K2(w, v)`
    K2,
    /// `K2b(w, v')`
    K2b,
    /// `K3(w, v, v')`
    K3,
}

impl Class {
    /// Classes that are tabulated.
    pub const STORED: [Class; 3] = [Class::K1, Class::K2, Class::K3];

    /// Position among the tabulated classes.
    pub fn index(self) -> usize {
        match self {
            Class::K1 => 0,
            Class::K2 | Class::K2b => 1,
            Class::K3 => 2,
        }
    }

    /// `1`, `2`, `3` for `K1`, `K2`/`K2b`, `K3`.
    pub fn order(self) -> usize {
        self.index() + 1
    }

    pub fn rank(self) -> Rank {
        match self {
            Class::K1 => Rank::One,
            Class::K2 | Class::K2b => Rank::Two,
            Class::K3 => Rank::Three,
        }
    }

    fn swapped(self) -> Self {
        match self {
            Class::K2 => Class::K2b,
            Class::K2b => Class::K2,
            c => c,
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Class::K1 => "K1",
            Class::K2 => "K2",
            Class::K2b => "K2b",
            Class::K3 => "K3",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transformation {
    T1,
    T2,
    T3,
    TC,
}

const MAX_HISTORY: usize = 4;

/// Transient description of one vertex argument together with the
/// transformations applied to it so far.
///
/// The value of the original argument is `prefactor × value` of the
/// current one, or `prefactor × conj(value)` if `conjugate` is set.
/// `half_swapped` tells non-symmetric vertices to read from their other
/// half.
#[derive(Clone, Copy, Debug)]
pub struct IndicesSymmetryTransformations {
    pub channel: Channel,
    pub spin: Spin,
    pub class: Class,
    pub freqs: Bosonic,
    pub prefactor: Complex64,
    pub conjugate: bool,
    pub half_swapped: bool,
    history: [Transformation; MAX_HISTORY],
    history_len: usize,
}

impl PartialEq for IndicesSymmetryTransformations {
    fn eq(&self, other: &Self) -> bool {
        self.channel == other.channel
            && self.spin == other.spin
            && self.class == other.class
            && self.freqs == other.freqs
            && self.prefactor == other.prefactor
            && self.conjugate == other.conjugate
            && self.half_swapped == other.half_swapped
    }
}

impl IndicesSymmetryTransformations {
    pub fn new(channel: Channel, spin: Spin, class: Class, freqs: Bosonic)
               -> Self {
        Self {
            channel,
            spin,
            class,
            freqs,
            prefactor: Complex::new(1.0, 0.0),
            conjugate: false,
            half_swapped: false,
            history: [Transformation::T1; MAX_HISTORY],
            history_len: 0,
        }
    }

    /// Transformations applied so far, in order.
    pub fn history(&self) -> &[Transformation] {
        &self.history[..self.history_len]
    }

    fn multiply_prefactor(&mut self, p: Complex64) {
        let p = if self.conjugate { p.conj() } else { p };
        self.prefactor = self.prefactor * p;
    }

    fn swap_halves_and_classes(&mut self) {
        self.class = self.class.swapped();
        self.half_swapped = !self.half_swapped;
    }

    pub fn apply(&mut self, t: Transformation) {
        assert!(self.history_len < MAX_HISTORY, "too many transformations");
        self.history[self.history_len] = t;
        self.history_len += 1;
        let Bosonic { w, v, vp } = self.freqs;
        match t {
            Transformation::T1 => {
                self.spin = self.spin.flipped();
                self.multiply_prefactor(Complex::new(-1.0, 0.0));
                match self.channel {
                    Channel::A => self.channel = Channel::T,
                    Channel::T => self.channel = Channel::A,
                    Channel::P => self.freqs = Bosonic::new(w, -v, vp),
                }
            }
            Transformation::T2 => {
                self.apply_raw_t3();
                self.history_len -= 1;
                self.apply(Transformation::T1);
                self.history[self.history_len - 1] = Transformation::T2;
            }
            Transformation::T3 => self.apply_raw_t3(),
            Transformation::TC => {
                self.conjugate = !self.conjugate;
                match self.channel {
                    Channel::A | Channel::P => {
                        self.freqs = Bosonic::new(-w, -vp, -v);
                        self.swap_halves_and_classes();
                    }
                    Channel::T => self.freqs = Bosonic::new(w, -v, -vp),
                }
            }
        }
    }

    fn apply_raw_t3(&mut self) {
        let Bosonic { w, v, vp } = self.freqs;
        match self.channel {
            Channel::A | Channel::T => {
                self.freqs = Bosonic::new(-w, vp, v);
                self.swap_halves_and_classes();
            }
            Channel::P => self.freqs = Bosonic::new(w, -v, -vp),
        }
    }

    /// Map onto a tabulated representative: spin `V`, class other than
    /// `K2b`.  The channel may change.
    pub fn reduce(mut self) -> Self {
        if self.spin == Spin::Vhat {
            self.apply(Transformation::T1);
        }
        if self.class == Class::K2b {
            match self.channel {
                Channel::A | Channel::T => self.apply(Transformation::T3),
                Channel::P => self.apply(Transformation::TC),
            }
        }
        self
    }

    /// Undo every recorded transformation.  `expand` is an exact left
    /// inverse of `reduce`.
    pub fn expand(mut self) -> Self {
        let history = self.history;
        let n = self.history_len;
        // every transformation is an involution
        for &t in history[..n].iter().rev() {
            self.apply(t);
        }
        self.history_len = 0;
        self
    }

    /// Value of the original argument given the value at the current one.
    pub fn value(&self, value: Complex64) -> Complex64 {
        let value = if self.conjugate { value.conj() } else { value };
        self.prefactor * value
    }
}

impl fmt::Display for IndicesSymmetryTransformations {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{channel: {}, spin: {:?}, class: {}, w: {}, v: {}, \
                   vp: {}, prefactor: {}, conjugate: {}, half_swapped: {}}}",
               self.channel, self.spin, self.class, self.freqs.w,
               self.freqs.v, self.freqs.vp, self.prefactor, self.conjugate,
               self.half_swapped)
    }
}

/// Transformations mapping a tabulated entry onto the canonical sector of
/// its class, or an empty list if the entry is canonical.
///
/// Canonical sectors: `w ≥ 0` for K1, `v ≥ 0` for K2, and `w ≥ 0`,
/// `v + v' ≥ 0` for K3.
pub fn sector_transformations(channel: Channel, class: Class, f: Bosonic)
                              -> &'static [Transformation] {
    use self::Transformation::{T3, TC};
    match class {
        Class::K1 => {
            if f.w >= 0.0 {
                &[]
            } else {
                match channel {
                    Channel::A | Channel::T => &[T3],
                    Channel::P => &[TC],
                }
            }
        }
        Class::K2 => {
            if f.v >= 0.0 {
                &[]
            } else {
                match channel {
                    Channel::A => &[T3, TC],
                    Channel::P => &[T3],
                    Channel::T => &[TC],
                }
            }
        }
        Class::K2b => panic!("K2b is not tabulated"),
        Class::K3 => {
            let s = f.v + f.vp;
            match (f.w >= 0.0, s >= 0.0, channel) {
                (true, true, _) => &[],
                (false, true, Channel::A) => &[T3],
                (false, false, Channel::A) => &[TC],
                (true, false, Channel::A) => &[T3, TC],
                (false, true, Channel::P) => &[TC, T3],
                (false, false, Channel::P) => &[TC],
                (true, false, Channel::P) => &[T3],
                (false, true, Channel::T) => &[T3],
                (false, false, Channel::T) => &[T3, TC],
                (true, false, Channel::T) => &[TC],
            }
        }
    }
}

/// Whether `f` lies in the canonical sector of `class`.
pub fn is_canonical(class: Class, f: Bosonic) -> bool {
    match class {
        Class::K1 => f.w >= 0.0,
        Class::K2 | Class::K2b => f.v >= 0.0,
        Class::K3 => f.w >= 0.0 && f.v + f.vp >= 0.0,
    }
}

fn random_indices(rng: &mut XorShiftRng) -> IndicesSymmetryTransformations {
    let channel = Channel::ALL[rng.gen_range(0..3)];
    let spin = if rng.gen() { Spin::V } else { Spin::Vhat };
    let class = [Class::K1, Class::K2, Class::K2b, Class::K3][rng.gen_range(0..4)];
    let freqs = Bosonic::new(rng.gen_range(-20.0..20.0),
                             rng.gen_range(-20.0..20.0),
                             rng.gen_range(-20.0..20.0));
    IndicesSymmetryTransformations::new(channel, spin, class, freqs)
}

/// Randomized self-check of `reduce`/`expand` and of the sector tables.
pub fn self_check(samples: usize, seed: [u8; 16]) -> Result<(), Error> {
    let mut rng = XorShiftRng::from_seed(seed);
    for _ in 0..samples {
        let original = random_indices(&mut rng);
        let reduced = original.reduce();
        if reduced.spin != Spin::V || reduced.class == Class::K2b {
            return Err(Error::RoundTrip(original.to_string(),
                                        reduced.to_string()));
        }
        let back = reduced.expand();
        if back != original {
            return Err(Error::RoundTrip(original.to_string(), back.to_string()));
        }

        if original.class == Class::K2b {
            continue;
        }
        let mut moved = IndicesSymmetryTransformations::new(
            original.channel, Spin::V, original.class, original.freqs);
        for &t in sector_transformations(moved.channel, moved.class, moved.freqs) {
            moved.apply(t);
        }
        if moved.channel != original.channel
            || moved.class != original.class
            || moved.spin != Spin::V
            || !is_canonical(moved.class, moved.freqs)
        {
            return Err(Error::Sector(moved.to_string()));
        }
    }
    Ok(())
}
