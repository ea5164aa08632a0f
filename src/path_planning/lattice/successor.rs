//! Lazy successor enumeration
//!
//! A search algorithm expands a state by pulling [`Successor`]s one at a time;
//! each pull evaluates actions in id order until one is valid and collision
//! free.

use std::iter::FusedIterator;

use crate::common::{ActionId, DiscretePose, StateId};

use super::environment::Environment;
use super::motion_primitive::MotionPrimitive;

/// One reachable neighbour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Successor {
    pub state_id: StateId,
    pub action_id: ActionId,
    /// Accumulated cost including the action
    pub g: f32,
}

/// Successors of one state, forwards or backwards
///
/// Backwards, the iterator walks the primitives that end on the start
/// heading and yields their predecessors; the `action_id` is the action that
/// drives from the predecessor to the start state.
#[derive(Debug, Clone)]
pub struct SuccessorIterator<'a> {
    env: &'a Environment,
    start_id: StateId,
    start: DiscretePose,
    start_g: f32,
    primitives: &'a [MotionPrimitive],
    reverse: bool,
    next_index: usize,
}

impl<'a> SuccessorIterator<'a> {
    pub(crate) fn new(env: &'a Environment, start_id: StateId, start_g: f32, reverse: bool) -> Self {
        let start = env.discretization().state_id_to_state(start_id);
        let primitives = if reverse {
            env.library().primitives_into(start.theta)
        } else {
            env.library().primitives_from(start.theta)
        };
        Self {
            env,
            start_id,
            start,
            start_g,
            primitives,
            reverse,
            next_index: 0,
        }
    }

    pub fn start(&self) -> StateId {
        self.start_id
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Every action has been evaluated
    pub fn is_done(&self) -> bool {
        self.next_index >= self.primitives.len()
    }

    /// Start over from the first action
    pub fn restart(&mut self) {
        self.next_index = 0;
    }

    fn evaluate(&self, prim: &MotionPrimitive) -> Option<Successor> {
        let state_id = if self.reverse {
            let predecessor = self.env.offset_pose(self.start, prim)?;
            let state_id = self.env.on_map_state_id(predecessor)?;
            // same check as driving forward from the predecessor
            if self.env.motion_collides(prim, predecessor, self.start) {
                return None;
            }
            state_id
        } else {
            self.env.apply_action(prim.id, self.start_id, true)?
        };

        let factor = self
            .env
            .library()
            .action_type(prim.id)
            .map_or(1.0, |action| action.extra_cost_factor);
        Some(Successor {
            state_id,
            action_id: prim.id,
            g: self.start_g + prim.cost * factor,
        })
    }
}

impl<'a> Iterator for SuccessorIterator<'a> {
    type Item = Successor;

    fn next(&mut self) -> Option<Successor> {
        while let Some(prim) = self.primitives.get(self.next_index) {
            self.next_index += 1;
            if let Some(successor) = self.evaluate(prim) {
                return Some(successor);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.primitives.len().saturating_sub(self.next_index)))
    }
}

impl<'a> FusedIterator for SuccessorIterator<'a> {}
