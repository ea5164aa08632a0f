// Path Planning module

pub mod lattice;

pub use lattice::*;
