//! Bubble function calculator.
//!
//! Computes the reducible vertex of channel `r`
//!
//! ```text
//! γ_r(w, v, v') = ±1/(2π) ∫ dν  Γ_L(w, v, ν) Π_r(w, ν) Γ_R(w, ν, v')
//!
//! Π_a(w, ν) = Π_t(w, ν) = G(ν − w/2) G(ν + w/2)
//! Π_p(w, ν) = G(w/2 + ν) G(w/2 − ν)
//! ```
//!
//! with a minus sign in `t`.  Each class is obtained from the parts of the
//! operands that do or do not depend on their outer fermionic frequency:
//! `K1 = L₀ Π R₀`, `K2 = L₁ Π R₀`, `K3 = L₁ Π R₁`, while `K2b = L₀ Π R₁`
//! follows from `K2` by symmetry.

use std::f64::consts::PI;
use std::ops::Range;
use rayon::prelude::*;
use super::data::{Complex64, DataContainer};
use super::frequencies::{Bosonic, Channel};
use super::frequency_grid;
use super::propagator::Propagator;
use super::quadrature;
use super::symmetry::{sector_transformations, Class, IndicesSymmetryTransformations, Spin};
use super::utils::is_finite;
use super::vertex::{Component, Part, ReducibleVertex, Side, VertexView};

quick_error! {
    #[derive(Clone, Debug, PartialEq)]
    pub enum Error {
        NonFinite(channel: Channel, class: Class, index: usize) {
            display("non-finite bubble in channel {}, class {}, entry {}",
                    channel, class, index)
        }
        Quadrature(channel: Channel, class: Class, index: usize,
                   err: quadrature::Error) {
            display("bubble quadrature failed in channel {}, class {}, \
                     entry {}: {}", channel, class, index, err)
        }
        Grid(err: frequency_grid::Error) {
            from()
            display("{}", err)
        }
    }
}

/// Pair of propagators closing a loop.
#[derive(Clone, Copy, Debug)]
pub struct Bubble<'a> {
    g: Propagator<'a>,
    dg: Option<Propagator<'a>>,
}

impl<'a> Bubble<'a> {
    /// `G G`
    pub fn new(g: Propagator<'a>) -> Self {
        Self { g, dg: None }
    }

    /// `G Ġ + Ġ G`, with `Ġ` either `S` or the Katanin propagator.
    pub fn differentiated(g: Propagator<'a>, dg: Propagator<'a>) -> Self {
        Self { g, dg: Some(dg) }
    }

    pub fn value(&self, channel: Channel, w: f64, nu: f64, i_in: usize)
                 -> Complex64 {
        let (x, y) = match channel {
            Channel::A | Channel::T => (nu - 0.5 * w, nu + 0.5 * w),
            Channel::P => (0.5 * w + nu, 0.5 * w - nu),
        };
        let gx = self.g.value(x, i_in);
        let gy = self.g.value(y, i_in);
        match self.dg {
            None => gx * gy,
            Some(dg) => gx * dg.value(y, i_in) + dg.value(x, i_in) * gy,
        }
    }
}

/// Outcome of one tabulated entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Entry {
    Computed { value: Complex64, converged: bool },
    /// Filled in from its canonical partner.
    Dependent,
}

/// Work done by a calculation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub computed: usize,
    pub copied: usize,
    pub unconverged: usize,
    pub zero_classes: usize,
}

impl Stats {
    pub fn merge(&mut self, other: &Stats) {
        self.computed += other.computed;
        self.copied += other.copied;
        self.unconverged += other.unconverged;
        self.zero_classes += other.zero_classes;
    }
}

/// Parts of the left and right operands contributing to a class.
fn operand_parts(class: Class) -> (Part, Part) {
    match class {
        Class::K1 => (Part::Independent(Side::Left), Part::Independent(Side::Right)),
        Class::K2 => (Part::Dependent(Side::Left), Part::Independent(Side::Right)),
        Class::K2b => (Part::Independent(Side::Left), Part::Dependent(Side::Right)),
        Class::K3 => (Part::Dependent(Side::Left), Part::Dependent(Side::Right)),
    }
}

pub struct BubbleFunctionCalculator<'a> {
    channel: Channel,
    left: VertexView<'a>,
    right: VertexView<'a>,
    bubble: Bubble<'a>,
    quadrature: quadrature::Conf,
    tail_scale: f64,
    /// Whether the result obeys the vertex symmetries, so that only the
    /// canonical sector needs to be integrated.
    symmetric_result: bool,
    prefactor: f64,
    chunk_size: usize,
}

impl<'a> BubbleFunctionCalculator<'a> {
    pub fn new(
        channel: Channel,
        left: VertexView<'a>,
        right: VertexView<'a>,
        bubble: Bubble<'a>,
        quadrature: quadrature::Conf,
        tail_scale: f64,
        symmetric_result: bool,
    ) -> Self {
        let mut this = Self {
            channel,
            left,
            right,
            bubble,
            quadrature,
            tail_scale,
            symmetric_result,
            prefactor: 0.0,
            chunk_size: 512,
        };
        this.set_channel_specific_freq_ranges_and_prefactor();
        this
    }

    /// Number of entries per work item.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0);
        self.chunk_size = chunk_size;
        self
    }

    fn set_channel_specific_freq_ranges_and_prefactor(&mut self) {
        self.prefactor = self.channel.sign() / (2.0 * PI);
        if self.tail_scale <= 0.0 {
            self.tail_scale = 1.0;
        }
    }

    /// Kinks of the integrand in `ν`: zeros of the propagator arguments and
    /// the positions where the operands switch frequency dependence.
    fn breakpoints(&self, class: Class, f: Bosonic) -> Vec<f64> {
        let Bosonic { w, v, vp } = f;
        let mut points = vec![0.0, 0.5 * w, -0.5 * w];
        match class {
            Class::K1 => {}
            Class::K2 | Class::K2b => points.extend(&[v, v + w, v - w]),
            Class::K3 => points.extend(&[v, vp, w + v, w - v, w + vp, w - vp]),
        }
        points
    }

    /// Whether a class vanishes because one operand part is absent.
    pub fn set_to_zero_in_integrand(&self, class: Class) -> bool {
        let (lpart, rpart) = operand_parts(class);
        self.left.is_empty(self.channel, lpart)
            || self.right.is_empty(self.channel, rpart)
    }

    fn integrand(&self, class: Class, f: Bosonic, i_in: usize, nu: f64)
                 -> Complex64 {
        let r = self.channel;
        let (lpart, rpart) = operand_parts(class);
        let fl = Bosonic::new(f.w, f.v, nu);
        let fr = Bosonic::new(f.w, nu, f.vp);
        let pi = self.bubble.value(r, f.w, nu, i_in);
        let lv = self.left.value(Spin::V, r, fl, lpart, i_in);
        let rv = self.right.value(Spin::V, r, fr, rpart, i_in);
        match r {
            Channel::A | Channel::P => lv * pi * rv,
            Channel::T => {
                let lh = self.left.value(Spin::Vhat, r, fl, lpart, i_in);
                let rh = self.right.value(Spin::Vhat, r, fr, rpart, i_in);
                (lv * rv * 2.0 + lv * rh + lh * rv) * pi
            }
        }
    }

    /// Integrate one external argument.
    pub fn value(&self, class: Class, f: Bosonic, i_in: usize)
                 -> Result<quadrature::Integral, quadrature::Error> {
        let mut integral = self.quadrature.integrate_real_line(
            |nu| self.integrand(class, f, i_in, nu),
            &self.breakpoints(class, f),
            self.tail_scale,
        )?;
        integral.value *= self.prefactor;
        integral.abserr *= self.prefactor.abs();
        Ok(integral)
    }

    /// Canonical partner of a tabulated entry, if the entry is dependent.
    pub fn symmetry_reduce(&self, component: &Component, flat: usize)
                           -> Result<Option<(usize, IndicesSymmetryTransformations)>,
                                     Error> {
        if !self.symmetric_result {
            return Ok(None);
        }
        let data = component.data();
        let index = data.unflatten(flat);
        let class = component.class();
        let f = component.frequencies_of(&index);
        let transformations = sector_transformations(self.channel, class, f);
        if transformations.is_empty() {
            return Ok(None);
        }
        let mut ind = IndicesSymmetryTransformations::new(self.channel, Spin::V, class, f);
        for &t in transformations {
            ind.apply(t);
        }
        let freqs = [ind.freqs.w, ind.freqs.v, ind.freqs.vp];
        let mut source = index.clone();
        for (k, grid) in component.grids().iter().enumerate() {
            source[k + 1] = grid.nearest_index(freqs[k])?;
        }
        Ok(Some((data.flatten(&source), ind)))
    }

    fn compute_entry(&self, component: &Component, flat: usize)
                     -> Result<Entry, Error> {
        if self.symmetry_reduce(component, flat)?.is_some() {
            return Ok(Entry::Dependent);
        }
        let class = component.class();
        let index = component.data().unflatten(flat);
        let i_in = index[index.len() - 1];
        let f = component.frequencies_of(&index);
        let integral = self.value(class, f, i_in)
            .map_err(|e| Error::Quadrature(self.channel, class, flat, e))?;
        if !is_finite(integral.value) {
            return Err(Error::NonFinite(self.channel, class, flat));
        }
        Ok(Entry::Computed { value: integral.value, converged: integral.converged })
    }

    /// Evaluate the entries with flat indices in `range` of a tabulated
    /// component.  Entries are independent of each other.
    pub fn compute_range(&self, component: &Component, range: Range<usize>)
                         -> Result<Vec<Entry>, Error> {
        range.into_par_iter()
            .map(|flat| self.compute_entry(component, flat))
            .collect()
    }

    fn assemble(&self, component: &Component, entries: &[Entry], stats: &mut Stats)
                -> Result<DataContainer, Error> {
        let mut data = DataContainer::zeros(component.data().dims());
        for (flat, entry) in entries.iter().enumerate() {
            if let Entry::Computed { value, converged } = *entry {
                data.as_mut_slice()[flat] = value;
                stats.computed += 1;
                if !converged {
                    stats.unconverged += 1;
                }
            }
        }
        for (flat, entry) in entries.iter().enumerate() {
            if let Entry::Dependent = *entry {
                if let Some((source, ind)) = self.symmetry_reduce(component, flat)? {
                    let value = ind.value(data.as_slice()[source]);
                    data.as_mut_slice()[flat] = value;
                    stats.copied += 1;
                }
            }
        }
        Ok(data)
    }

    /// Fill every tabulated class of `result`.
    pub fn perform_computation(&self, result: &mut ReducibleVertex)
                               -> Result<Stats, Error> {
        assert_eq!(result.channel(), self.channel, "channel mismatch");
        let mut stats = Stats::default();
        for &class in &Class::STORED[..result.max_class()] {
            let data = {
                let component = match result.component(class) {
                    Some(c) => c,
                    None => continue,
                };
                if self.set_to_zero_in_integrand(class) {
                    stats.zero_classes += 1;
                    DataContainer::zeros(component.data().dims())
                } else {
                    let len = component.data().len();
                    let mut entries = Vec::with_capacity(len);
                    let mut start = 0;
                    while start < len {
                        let end = usize::min(start + self.chunk_size, len);
                        entries.extend(self.compute_range(component, start..end)?);
                        start = end;
                    }
                    self.assemble(component, &entries, &mut stats)?
                }
            };
            if let Some(component) = result.component_mut(class) {
                component.set_data(data);
            }
        }
        debug!("bubble {}: {} computed, {} copied, {} zero classes",
               self.channel, stats.computed, stats.copied, stats.zero_classes);
        if stats.unconverged > 0 {
            warn!("bubble {}: {} entries did not reach the quadrature tolerance",
                  self.channel, stats.unconverged);
        }
        Ok(stats)
    }
}
