//! Two-particle vertex decomposed into channels and classes.
//!
//! ```text
//! Γ = Γ0 + γ_a + γ_p + γ_t
//! γ_r(w, v, v') = K1_r(w) + K2_r(w, v) + K2b_r(w, v') + K3_r(w, v, v')
//! ```
//!
//! Each tabulated class is a [`Component`](struct.Component.html): one data
//! container of shape `[1, frequencies …, n_in]` together with the spline
//! fitted to it.  Outside the grid box a component vanishes.

use std::convert::TryFrom;
use num::Zero;
use super::data::{Complex64, DataContainer};
use super::frequencies::{switch2bosonic, switch_channel, Bosonic, Channel, Natural};
use super::frequency_grid::{FrequencyGrid, GridConf, GridKind, Transform};
use super::interpolation::Spline;
use super::symmetry::{Class, IndicesSymmetryTransformations, Spin};

/// One tabulated class of a reducible vertex.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawComponent", into = "RawComponent")]
pub struct Component {
    class: Class,
    spline: Spline,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawComponent {
    class: Class,
    grids: Vec<FrequencyGrid>,
    data: DataContainer,
}

impl TryFrom<RawComponent> for Component {
    type Error = String;
    fn try_from(raw: RawComponent) -> Result<Self, Self::Error> {
        let expected = raw.class.order() + 2;
        if raw.grids.len() != raw.class.order()
            || raw.data.rank() != expected
            || raw.grids.iter().enumerate()
                .any(|(k, g)| raw.data.dims()[k + 1] != g.len())
        {
            return Err(format!("inconsistent shape {:?} for {}",
                               raw.data.dims(), raw.class));
        }
        Ok(Component::new(raw.class, raw.data, &raw.grids))
    }
}

impl From<Component> for RawComponent {
    fn from(c: Component) -> Self {
        RawComponent {
            class: c.class,
            grids: c.spline.grids().to_vec(),
            data: c.spline.data().clone(),
        }
    }
}

impl Component {
    pub fn new(class: Class, data: DataContainer, grids: &[FrequencyGrid])
               -> Self {
        assert!(class != Class::K2b, "K2b is not tabulated");
        Self { class, spline: Spline::fit(&data, grids) }
    }

    pub fn zeros(class: Class, grids: &[FrequencyGrid], n_in: usize) -> Self {
        let mut dims = vec![1];
        dims.extend(grids.iter().map(|g| g.len()));
        dims.push(n_in);
        Self::new(class, DataContainer::zeros(&dims), grids)
    }

    /// Tabulate `f(i_in, frequencies)` on the given grids.
    pub fn from_fn<F>(class: Class, grids: &[FrequencyGrid], n_in: usize,
                      mut f: F) -> Self
        where F: FnMut(usize, Bosonic) -> Complex64
    {
        let mut dims = vec![1];
        dims.extend(grids.iter().map(|g| g.len()));
        dims.push(n_in);
        let data = DataContainer::from_fn(&dims, |index| {
            f(index[index.len() - 1], frequencies_at(class, grids, index))
        });
        Self::new(class, data, grids)
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn data(&self) -> &DataContainer {
        self.spline.data()
    }

    pub fn grids(&self) -> &[FrequencyGrid] {
        self.spline.grids()
    }

    pub fn spline(&self) -> &Spline {
        &self.spline
    }

    pub fn n_in(&self) -> usize {
        let dims = self.data().dims();
        dims[dims.len() - 1]
    }

    /// Replace the data; the spline is refitted.
    pub fn set_data(&mut self, data: DataContainer) {
        let grids = self.grids().to_vec();
        self.spline = Spline::fit(&data, &grids);
    }

    /// `self ← self + α other` without refitting.
    pub fn add_scaled(&mut self, alpha: f64, other: &Self) {
        assert_eq!(self.class, other.class, "class mismatch");
        self.spline.add_scaled(alpha, &other.spline);
    }

    /// `self ← α self` without refitting.
    pub fn scale(&mut self, alpha: f64) {
        self.spline.scale(alpha);
    }

    /// Channel frequencies of a tabulated entry.
    pub fn frequencies_of(&self, index: &[usize]) -> Bosonic {
        frequencies_at(self.class, self.grids(), index)
    }

    pub fn value(&self, i_in: usize, f: Bosonic) -> Complex64 {
        let freqs = [f.w, f.v, f.vp];
        let freqs = &freqs[..self.class.order()];
        if !self.spline.contains(freqs) {
            return Complex64::zero();
        }
        self.spline.value(0, i_in, freqs)
    }

    /// Same function tabulated on other grids.
    pub fn retabulate(&self, grids: &[FrequencyGrid]) -> Self {
        Self::from_fn(self.class, grids, self.n_in(), |i_in, f| self.value(i_in, f))
    }
}

fn frequencies_at(class: Class, grids: &[FrequencyGrid], index: &[usize])
                  -> Bosonic {
    let mut f = [0.0; 3];
    for (k, grid) in grids.iter().enumerate() {
        f[k] = grid.frequency(index[k + 1]);
    }
    match class {
        Class::K1 => Bosonic::new(f[0], 0.0, 0.0),
        Class::K2 => Bosonic::new(f[0], f[1], 0.0),
        Class::K2b => Bosonic::new(f[0], 0.0, f[1]),
        Class::K3 => Bosonic::new(f[0], f[1], f[2]),
    }
}

/// Grid parameters for the vertex classes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexGrids {
    pub k1: FrequencyGrid,
    pub k2_bosonic: FrequencyGrid,
    pub k2_fermionic: FrequencyGrid,
    pub k3_bosonic: FrequencyGrid,
    pub k3_fermionic: FrequencyGrid,
}

impl VertexGrids {
    pub fn guess(
        transform: Transform,
        k1: &GridConf,
        k2: &GridConf,
        k3: &GridConf,
        scale: f64,
    ) -> Self {
        Self {
            k1: k1.guess_essential_parameters(GridKind::Bosonic, transform, scale),
            k2_bosonic: k2.guess_essential_parameters(GridKind::Bosonic,
                                                      transform, scale),
            k2_fermionic: k2.guess_essential_parameters(GridKind::Fermionic,
                                                        transform, scale),
            k3_bosonic: k3.guess_essential_parameters(GridKind::Bosonic,
                                                      transform, scale),
            k3_fermionic: k3.guess_essential_parameters(GridKind::Fermionic,
                                                        transform, scale),
        }
    }

    pub fn for_class(&self, class: Class) -> Vec<FrequencyGrid> {
        match class {
            Class::K1 => vec![self.k1.clone()],
            Class::K2 | Class::K2b => {
                vec![self.k2_bosonic.clone(), self.k2_fermionic.clone()]
            }
            Class::K3 => vec![self.k3_bosonic.clone(),
                              self.k3_fermionic.clone(),
                              self.k3_fermionic.clone()],
        }
    }
}

/// Vertex reducible in one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReducibleVertex {
    channel: Channel,
    /// Tabulated classes `K1`, `K2`, `K3`, up to the maximal class.
    components: Vec<Component>,
}

impl ReducibleVertex {
    pub fn zeros(channel: Channel, grids: &VertexGrids, max_class: usize,
                 n_in: usize) -> Self {
        assert!(max_class >= 1 && max_class <= 3);
        Self {
            channel,
            components: Class::STORED[..max_class].iter()
                .map(|&class| Component::zeros(class, &grids.for_class(class), n_in))
                .collect(),
        }
    }

    /// Same grids, all zero, tabulated up to `max_class`.
    pub fn zeros_like(&self, max_class: usize) -> Self {
        Self {
            channel: self.channel,
            components: self.components.iter().take(max_class)
                .map(|c| Component::zeros(c.class, c.grids(), c.n_in()))
                .collect(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn max_class(&self) -> usize {
        self.components.len()
    }

    pub fn scale(&mut self, alpha: f64) {
        for c in &mut self.components {
            c.scale(alpha);
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, class: Class) -> Option<&Component> {
        self.components.get(class.index())
    }

    pub fn component_mut(&mut self, class: Class) -> Option<&mut Component> {
        self.components.get_mut(class.index())
    }

    /// Value of a tabulated class for spin `V`.
    pub fn value(&self, class: Class, i_in: usize, f: Bosonic) -> Complex64 {
        match self.component(class) {
            Some(c) => c.value(i_in, f),
            None => Complex64::zero(),
        }
    }
}

/// Full vertex `Γ0 + γ_a + γ_p + γ_t`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Bare vertex `Γ0` of the spin component `V`; `V̂` is its negative.
    bare: f64,
    channels: Vec<ReducibleVertex>,
}

impl Vertex {
    /// Bare vertex `Γ0_V = −U` with vanishing reducible parts.
    pub fn bare(u: f64, grids: &VertexGrids, max_class: usize, n_in: usize)
                -> Self {
        Self {
            bare: -u,
            channels: Channel::ALL.iter()
                .map(|&r| ReducibleVertex::zeros(r, grids, max_class, n_in))
                .collect(),
        }
    }

    pub fn zeros(grids: &VertexGrids, max_class: usize, n_in: usize) -> Self {
        Self::bare(0.0, grids, max_class, n_in)
    }

    /// Same shape, all zero.
    pub fn zeros_like(&self) -> Self {
        let mut v = self.clone();
        v.scale(0.0);
        v
    }

    pub fn bare_value(&self, spin: Spin) -> f64 {
        match spin {
            Spin::V => self.bare,
            Spin::Vhat => -self.bare,
        }
    }

    pub fn set_bare(&mut self, bare: f64) {
        self.bare = bare;
    }

    pub fn max_class(&self) -> usize {
        self.channels[0].max_class()
    }

    pub fn n_in(&self) -> usize {
        self.channels[0].components()[0].n_in()
    }

    pub fn channel(&self, r: Channel) -> &ReducibleVertex {
        &self.channels[r.index()]
    }

    pub fn channel_mut(&mut self, r: Channel) -> &mut ReducibleVertex {
        &mut self.channels[r.index()]
    }

    pub fn components(&self) -> impl Iterator<Item = (Channel, &Component)> {
        self.channels.iter()
            .flat_map(|rv| rv.components().iter().map(move |c| (rv.channel(), c)))
    }

    /// `self ← self + α other` on the bare part and all components.
    pub fn add_scaled(&mut self, alpha: f64, other: &Self) {
        assert_eq!(self.max_class(), other.max_class(), "class mismatch");
        self.bare += alpha * other.bare;
        for (r, c) in other.components() {
            if let Some(mine) = self.channel_mut(r).component_mut(c.class()) {
                mine.add_scaled(alpha, c);
            }
        }
    }

    /// `self ← α self`
    pub fn scale(&mut self, alpha: f64) {
        self.bare *= alpha;
        for rv in &mut self.channels {
            rv.scale(alpha);
        }
    }

    pub fn max_norm(&self) -> f64 {
        self.components()
            .fold(self.bare.abs(), |m, (_, c)| f64::max(m, c.data().max_norm()))
    }

    pub fn all_finite(&self) -> bool {
        self.bare.is_finite() && self.components().all(|(_, c)| c.data().all_finite())
    }

    /// Same vertex on other grids, re-tabulated by interpolation.
    pub fn retabulate(&self, grids: &VertexGrids) -> Self {
        Self {
            bare: self.bare,
            channels: self.channels.iter().map(|rv| ReducibleVertex {
                channel: rv.channel,
                components: rv.components.iter()
                    .map(|c| c.retabulate(&grids.for_class(c.class())))
                    .collect(),
            }).collect(),
        }
    }

    /// View of the full symmetric vertex.
    pub fn view(&self) -> VertexView {
        VertexView {
            halves: Halves::Symmetric(self),
            restriction: Restriction::Full,
        }
    }
}

/// A vertex that is either symmetric under exchange of its left and right
/// halves, or given as a pair where the second half supplies the values
/// reached through half-exchanging transformations.
#[derive(Clone, Copy, Debug)]
pub enum Halves<'a> {
    Symmetric(&'a Vertex),
    NonSymmetric(&'a Vertex, &'a Vertex),
}

/// Which diagrammatic parts of the vertex contribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Restriction {
    Full,
    /// `Γ − γ_r`
    Irreducible(Channel),
    /// `Γ − Γ0 − γ_r`
    Complement(Channel),
}

impl Restriction {
    fn includes_bare(self) -> bool {
        match self {
            Restriction::Full | Restriction::Irreducible(_) => true,
            Restriction::Complement(_) => false,
        }
    }

    fn includes(self, r: Channel) -> bool {
        match self {
            Restriction::Full => true,
            Restriction::Irreducible(s) | Restriction::Complement(s) => r != s,
        }
    }
}

/// Side of a vertex in a bubble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Outer fermionic frequency `v`.
    Left,
    /// Outer fermionic frequency `v'`.
    Right,
}

/// Selection of terms with respect to a bubble in channel `r`, split by
/// whether they depend on the outer fermionic frequency of the side.
///
/// ```text
/// Independent(Left)  = Γ0 + K1_r + K2b_r
/// Dependent(Left)    = K2_r + K3_r + γ_{r' ≠ r}
/// Independent(Right) = Γ0 + K1_r + K2_r
/// Dependent(Right)   = K2b_r + K3_r + γ_{r' ≠ r}
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Part {
    All,
    Independent(Side),
    Dependent(Side),
}

impl Part {
    fn includes_bare(self) -> bool {
        match self {
            Part::All | Part::Independent(_) => true,
            Part::Dependent(_) => false,
        }
    }

    fn includes_other_channels(self) -> bool {
        match self {
            Part::All | Part::Dependent(_) => true,
            Part::Independent(_) => false,
        }
    }

    fn includes(self, class: Class) -> bool {
        let independent = match (self, class) {
            (Part::All, _) => return true,
            (_, Class::K1) => true,
            (_, Class::K3) => false,
            (Part::Independent(Side::Left), Class::K2b)
                | (Part::Dependent(Side::Left), Class::K2b) => true,
            (Part::Independent(Side::Right), Class::K2)
                | (Part::Dependent(Side::Right), Class::K2) => true,
            _ => false,
        };
        match self {
            Part::Independent(_) => independent,
            _ => !independent,
        }
    }
}

const ALL_CLASSES: [Class; 4] = [Class::K1, Class::K2, Class::K2b, Class::K3];

/// Read-only view of a vertex used as a bubble operand.
#[derive(Clone, Copy, Debug)]
pub struct VertexView<'a> {
    pub halves: Halves<'a>,
    pub restriction: Restriction,
}

impl<'a> VertexView<'a> {
    pub fn new(halves: Halves<'a>, restriction: Restriction) -> Self {
        Self { halves, restriction }
    }

    fn first(&self) -> &'a Vertex {
        match self.halves {
            Halves::Symmetric(v) | Halves::NonSymmetric(v, _) => v,
        }
    }

    pub fn max_class(&self) -> usize {
        self.first().max_class()
    }

    pub fn restriction(&self) -> Restriction {
        self.restriction
    }

    /// Bare part surviving the restriction.
    pub fn bare_value(&self, spin: Spin) -> f64 {
        if self.restriction.includes_bare() {
            self.first().bare_value(spin)
        } else {
            0.0
        }
    }

    /// Whether no term of `part` survives the restriction (in channel `r`).
    pub fn is_empty(&self, r: Channel, part: Part) -> bool {
        let bare = part.includes_bare() && self.restriction.includes_bare()
            && self.first().bare != 0.0;
        let same = self.restriction.includes(r)
            && ALL_CLASSES.iter().any(|&c| {
                part.includes(c) && c.order() <= self.max_class()
            });
        let others = part.includes_other_channels()
            && r.complement().iter().any(|&s| self.restriction.includes(s));
        !(bare || same || others)
    }

    /// One class of `γ_r` for any spin, through the symmetry reduction.
    pub fn reducible_value(&self, spin: Spin, r: Channel, class: Class,
                           i_in: usize, f: Bosonic) -> Complex64 {
        if class.order() > self.max_class() {
            return Complex64::zero();
        }
        let ind = IndicesSymmetryTransformations::new(r, spin, class, f).reduce();
        let vertex = match self.halves {
            Halves::Symmetric(v) => v,
            Halves::NonSymmetric(v1, v2) => if ind.half_swapped { v2 } else { v1 },
        };
        ind.value(vertex.channel(ind.channel).value(ind.class, i_in, ind.freqs))
    }

    /// Selected part of the vertex at frequencies `f` of channel `r`.
    pub fn value(&self, spin: Spin, r: Channel, f: Bosonic, part: Part,
                 i_in: usize) -> Complex64 {
        let mut sum = Complex64::zero();
        if part.includes_bare() && self.restriction.includes_bare() {
            sum += self.first().bare_value(spin);
        }
        if self.restriction.includes(r) {
            for &class in &ALL_CLASSES {
                if part.includes(class) {
                    sum += self.reducible_value(spin, r, class, i_in, f);
                }
            }
        }
        if part.includes_other_channels() {
            for &s in &r.complement() {
                if self.restriction.includes(s) {
                    let g = switch_channel(r, s, f);
                    for &class in &ALL_CLASSES {
                        sum += self.reducible_value(spin, s, class, i_in, g);
                    }
                }
            }
        }
        sum
    }

    /// Vertex at natural frequencies.
    pub fn value_natural(&self, spin: Spin, n: Natural, i_in: usize)
                         -> Complex64 {
        let mut sum = Complex64::zero();
        if self.restriction.includes_bare() {
            sum += self.first().bare_value(spin);
        }
        for &r in &Channel::ALL {
            if self.restriction.includes(r) {
                let f = switch2bosonic(r, n);
                for &class in &ALL_CLASSES {
                    sum += self.reducible_value(spin, r, class, i_in, f);
                }
            }
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use num::Complex;
    use super::*;
    use super::super::frequencies::switch2natural;
    use super::super::utils::Toler;

    fn grids() -> VertexGrids {
        VertexGrids::guess(Transform::Sqrt,
                           &GridConf::with_n(11),
                           &GridConf::with_n(9),
                           &GridConf::with_n(7),
                           1.0)
    }

    /// Vertex filled with functions that respect the symmetries.
    fn sample_vertex() -> Vertex {
        let grids = grids();
        let mut vertex = Vertex::bare(1.5, &grids, 3, 1);
        let k1 = |r: Channel, w: f64| {
            let x = 1.0 / (1.0 + w * w);
            match r {
                Channel::A => Complex::new(x, 0.0),
                Channel::P => Complex::new(0.5 * x, 0.3 * w * x),
                Channel::T => Complex::new(-0.25 * x, 0.0),
            }
        };
        for &r in &Channel::ALL {
            let c = Component::from_fn(Class::K1, &grids.for_class(Class::K1), 1,
                                       |_, f| k1(r, f.w));
            vertex.channel_mut(r).components[0] = c;
        }
        vertex
    }

    #[test]
    fn test_bare() {
        let vertex = Vertex::bare(2.0, &grids(), 2, 1);
        let view = vertex.view();
        let n = Natural { v1p: 0.3, v2p: -1.0, v1: 2.0 };
        assert_eq!(view.value_natural(Spin::V, n, 0), Complex::new(-2.0, 0.0));
        assert_eq!(view.value_natural(Spin::Vhat, n, 0), Complex::new(2.0, 0.0));
        let complement = VertexView::new(Halves::Symmetric(&vertex),
                                         Restriction::Complement(Channel::A));
        assert_eq!(complement.value_natural(Spin::V, n, 0), Complex64::zero());
        assert!(!complement.is_empty(Channel::A, Part::All));
        assert!(complement.is_empty(Channel::A, Part::Independent(Side::Left)));
    }

    #[test]
    fn test_parts_add_up() {
        let vertex = sample_vertex();
        let view = vertex.view();
        let toler = Toler { relerr: 1e-13, abserr: 1e-13 };
        for &r in &Channel::ALL {
            for &spin in &[Spin::V, Spin::Vhat] {
                let f = Bosonic::new(0.7, -0.4, 1.9);
                let all = view.value(spin, r, f, Part::All, 0);
                for &side in &[Side::Left, Side::Right] {
                    let sum = view.value(spin, r, f, Part::Independent(side), 0)
                        + view.value(spin, r, f, Part::Dependent(side), 0);
                    toler_assert_complex_eq!(toler, sum, all);
                }
                // agrees with the natural parametrization
                let n = switch2natural(r, f);
                toler_assert_complex_eq!(toler, view.value_natural(spin, n, 0), all);
            }
        }
    }

    #[test]
    fn test_vhat_from_t1() {
        let vertex = sample_vertex();
        let view = vertex.view();
        let f = Bosonic::new(1.3, 0.2, -0.8);
        let k1t = vertex.channel(Channel::T).value(Class::K1, 0, f);
        assert_eq!(view.reducible_value(Spin::Vhat, Channel::A, Class::K1, 0, f),
                   -k1t);
        // K1_p(−w) = K1_p(w)* is reached through complex conjugation
        let g = Bosonic::new(-1.3, 0.2, -0.8);
        let direct = vertex.channel(Channel::P).value(Class::K1, 0, g);
        let mirrored = vertex.channel(Channel::P).value(Class::K1, 0, f).conj();
        toler_assert_complex_eq!(Toler { relerr: 1e-12, abserr: 1e-12 },
                                 direct, mirrored);
    }

    #[test]
    fn test_nonsymmetric_halves() {
        let grids = grids();
        let mut left = Vertex::zeros(&grids, 2, 1);
        let right = Vertex::zeros(&grids, 2, 1);
        let g = grids.for_class(Class::K2);
        left.channel_mut(Channel::A).components[1] =
            Component::from_fn(Class::K2, &g, 1, |_, f| Complex::new(f.w + 2.0 * f.v, 0.0));
        // exactly on the grid after the transformation
        let (w, v) = (g[0].frequency(5), g[1].frequency(6));
        let f = Bosonic::new(-w, 0.25, v);
        // K2b of the left half lives in the K2 of the right half
        let view = VertexView::new(Halves::NonSymmetric(&left, &right),
                                   Restriction::Full);
        assert_eq!(view.reducible_value(Spin::V, Channel::A, Class::K2b, 0, f),
                   Complex64::zero());
        let view = VertexView::new(Halves::NonSymmetric(&right, &left),
                                   Restriction::Full);
        let k2b = view.reducible_value(Spin::V, Channel::A, Class::K2b, 0, f);
        toler_assert_complex_eq!(Toler { relerr: 1e-10, abserr: 1e-10 },
                                 k2b, Complex::new(w + 2.0 * v, 0.0));
    }

    #[test]
    fn test_serde_refits() {
        let vertex = sample_vertex();
        let bytes = bincode::serialize(&vertex).unwrap();
        let back: Vertex = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, vertex);
    }
}
