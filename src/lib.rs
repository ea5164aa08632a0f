//! xytheta_lattice - discretized (x, y, theta) motion planning environment
//!
//! This crate provides the environment a lattice based path planner searches
//! over: state encoding, motion primitive libraries, obstacle collision
//! checks, successor generation and plan materialization.

// Core modules
pub mod common;
pub mod utils;

// Planning modules
pub mod path_planning;

// Re-export common types for convenience
pub use common::{ActionId, ContinuousPose, DiscretePose, DiscreteTheta, StateId, INVALID_ACTION_ID};
pub use common::{LatticeSearchSpace, Visualizable, WorldPose};
pub use common::{LatticeError, LatticeResult};
