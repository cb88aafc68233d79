extern crate bincode;
extern crate conv;
extern crate flate2;
#[macro_use]
extern crate log;
extern crate num;
#[macro_use]
extern crate quick_error;
extern crate rand;
extern crate rand_xorshift;
extern crate rayon;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_yaml;
extern crate xz2;

#[macro_use]
mod macros;

pub mod bubble;
pub mod config;
pub mod data;
pub mod flow;
pub mod frequencies;
pub mod frequency_grid;
pub mod hartree;
pub mod interpolation;
pub mod io;
pub mod loops;
pub mod ode;
pub mod parquet;
pub mod perturbation;
pub mod propagator;
pub mod quadrature;
pub mod self_energy;
pub mod state;
pub mod susceptibility;
pub mod symmetry;
pub mod utils;
pub mod vertex;
