//! Utility modules for xytheta_lattice

pub mod visualization;

pub use visualization::{Visualizer, PathStyle, PointStyle, colors};
