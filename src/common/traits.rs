//! Common traits defining the seams between the lattice environment and its users

use crate::common::error::LatticeResult;
use crate::common::types::*;
use crate::path_planning::lattice::{to_continuous, Discretization, Successor};

/// Anything that can be placed in the world for a collision query
pub trait WorldPose {
    fn to_world(&self, discretization: &Discretization) -> ContinuousPose;
}

impl WorldPose for ContinuousPose {
    fn to_world(&self, _discretization: &Discretization) -> ContinuousPose {
        *self
    }
}

impl WorldPose for DiscretePose {
    fn to_world(&self, discretization: &Discretization) -> ContinuousPose {
        to_continuous(*self, discretization)
    }
}

/// What a graph search needs from a lattice
///
/// Implementations must be deterministic: expanding the same state twice has to
/// produce the same successors in the same order.
pub trait LatticeSearchSpace {
    type Successors<'a>: Iterator<Item = Successor>
    where
        Self: 'a;

    /// Lazily enumerate successors of `state` reached with accumulated cost `g`
    fn successors(&self, state: StateId, g: f32) -> Self::Successors<'_>;

    /// Pack a pose into a search key
    fn state_id(&self, pose: DiscretePose) -> LatticeResult<StateId>;

    /// Unpack a search key
    fn state(&self, id: StateId) -> DiscretePose;
}

/// Trait for visualizable structures
pub trait Visualizable {
    /// Draw current state to visualizer
    fn visualize(&self, vis: &mut crate::utils::Visualizer);
}
