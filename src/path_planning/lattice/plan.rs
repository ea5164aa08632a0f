//! Plans and their materialization
//!
//! A [`Plan`] is a start pose and a list of action ids. The environment turns
//! it into a dense pose sequence for display, or into world frame segments a
//! path follower can drive, and can re-validate it against new obstacles.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::common::{ActionId, ContinuousPose, DiscretePose, LatticeError, LatticeResult};

use super::discretization::{normalize_angle, to_continuous, to_discrete};
use super::environment::Environment;
use super::motion_primitive::MotionPrimitive;
use super::path_segment::PathSegment;

/// Sequence of actions from a start pose
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plan {
    pub start: DiscretePose,
    pub actions: Vec<ActionId>,
}

impl Plan {
    pub fn new(start: DiscretePose) -> Self {
        Self {
            start,
            actions: Vec::new(),
        }
    }

    pub fn with_actions(start: DiscretePose, actions: Vec<ActionId>) -> Self {
        Self { start, actions }
    }

    pub fn push(&mut self, action: ActionId) {
        self.actions.push(action);
    }

    /// Append `other`'s actions; an empty plan also takes its start
    pub fn append(&mut self, other: &Plan) {
        if self.actions.is_empty() {
            self.start = other.start;
        }
        self.actions.extend_from_slice(&other.actions);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drop the actions, keep the start
    pub fn clear(&mut self) {
        self.actions.clear();
    }
}

/// World frame segment and the plan action it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedSegment {
    pub segment: PathSegment,
    pub action_index: usize,
}

/// Drivable form of a plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutablePath {
    pub segments: Vec<PlannedSegment>,
}

impl ExecutablePath {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn path_segments(&self) -> impl Iterator<Item = PathSegment> + '_ {
        self.segments.iter().map(|planned| planned.segment)
    }

    pub fn length_mm(&self) -> f32 {
        self.path_segments().map(|segment| segment.length()).sum()
    }
}

/// Result of [`Environment::check_plan`]
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCheck {
    /// Every remaining action is collision free
    pub safe: bool,
    /// Checked prefix still worth following, starting at the robot's state
    pub valid_plan: Plan,
    /// End of `valid_plan`
    pub last_safe_pose: ContinuousPose,
}

fn same_pose(a: &ContinuousPose, b: &ContinuousPose) -> bool {
    a.distance(b) < 1e-3 && normalize_angle(a.theta_rad - b.theta_rad).abs() < 1e-4
}

impl Environment {
    /// Primitive for action `index` of `plan` taken from `curr`, and where it ends
    fn advance(&self, plan: &Plan, index: usize, curr: DiscretePose) -> LatticeResult<(&MotionPrimitive, DiscretePose)> {
        let action = plan.actions[index];
        let prim = self.get_motion(curr.theta, action).ok_or_else(|| {
            error!("Can't look up primitive for heading {} and action id {}", curr.theta, action);
            LatticeError::InvalidPlanAction {
                index,
                theta: curr.theta,
                action_id: action,
            }
        })?;
        let next = self.offset_pose(curr, prim).ok_or_else(|| {
            LatticeError::InvalidParameter(format!("plan action {} leaves the grid from {}", index, curr))
        })?;
        self.discretization().state_to_state_id(next)?;
        Ok((prim, next))
    }

    /// Dense poses along the plan, starting with the start pose
    pub fn to_continuous_path(&self, plan: &Plan) -> LatticeResult<Vec<ContinuousPose>> {
        let mut path = vec![to_continuous(plan.start, self.discretization())];
        let mut curr = plan.start;
        for index in 0..plan.len() {
            let (prim, next) = self.advance(plan, index, curr)?;
            let origin = to_continuous(curr, self.discretization());
            let mut samples = prim.placed_samples(origin).peekable();
            let repeats_last = match (samples.peek(), path.last()) {
                (Some(first), Some(last)) => same_pose(first, last),
                _ => false,
            };
            if repeats_last {
                samples.next();
            }
            path.extend(samples);
            curr = next;
        }
        Ok(path)
    }

    pub fn to_executable_path(&self, plan: &Plan) -> LatticeResult<ExecutablePath> {
        self.to_executable_path_from(plan, 0)
    }

    /// Executable path without the first `skip` actions
    pub fn to_executable_path_from(&self, plan: &Plan, skip: usize) -> LatticeResult<ExecutablePath> {
        let mut path = ExecutablePath::default();
        let mut curr = plan.start;
        for index in 0..plan.len() {
            let (prim, next) = self.advance(plan, index, curr)?;
            if index >= skip {
                let origin = to_continuous(curr, self.discretization());
                path.segments.extend(prim.placed_segments(origin).map(|segment| PlannedSegment {
                    segment,
                    action_index: index,
                }));
            }
            curr = next;
        }
        Ok(path)
    }

    /// State after executing every action without collision checks
    pub fn plan_final_state(&self, plan: &Plan) -> LatticeResult<DiscretePose> {
        (0..plan.len()).try_fold(plan.start, |curr, index| {
            self.advance(plan, index, curr).map(|(_, next)| next)
        })
    }

    pub fn log_plan(&self, plan: &Plan) {
        debug!("plan start: {}", plan.start);
        let mut curr = plan.start;
        for (index, &action) in plan.actions.iter().enumerate() {
            let name = self.action_type(action).map_or("?", |a| a.name.as_str());
            debug!(
                "{:2}: {} [{}] --> {}",
                index,
                to_continuous(curr, self.discretization()),
                curr.theta,
                name
            );
            match self.advance(plan, index, curr) {
                Ok((_, next)) => curr = next,
                Err(_) => break,
            }
        }
    }

    /// Re-validate a plan the robot is following
    ///
    /// The first `current_index` actions are taken as already driven. The
    /// rest are checked for collisions; the valid plan keeps actions until
    /// its end is more than `max_distance_to_follow_mm` from the robot.
    pub fn check_plan(&self, plan: &Plan, current_index: usize, max_distance_to_follow_mm: f32) -> PlanCheck {
        let mut check = PlanCheck {
            safe: false,
            valid_plan: Plan::new(plan.start),
            last_safe_pose: to_continuous(plan.start, self.discretization()),
        };
        if plan.is_empty() {
            return check;
        }

        let mut curr = plan.start;
        for index in 0..current_index.min(plan.len()) {
            match self.advance(plan, index, curr) {
                Ok((_, next)) => curr = next,
                Err(_) => return check,
            }
        }

        let robot_pose = to_continuous(curr, self.discretization());
        check.valid_plan = Plan::new(curr);
        check.last_safe_pose = robot_pose;

        let mut following = true;
        for index in current_index..plan.len() {
            let action = plan.actions[index];
            let next_id = self
                .discretization()
                .state_to_state_id(curr)
                .ok()
                .and_then(|id| self.apply_action(action, id, true));
            let Some(next_id) = next_id else {
                warn!("Collision along plan action {} (starting from {})", index, current_index);
                return check;
            };
            curr = self.discretization().state_id_to_state(next_id);

            if following {
                check.valid_plan.push(action);
                check.last_safe_pose = to_continuous(curr, self.discretization());
                if check.last_safe_pose.distance(&robot_pose) > max_distance_to_follow_mm {
                    following = false;
                }
            }
        }

        check.safe = true;
        check
    }

    /// Index of the plan action nearest to `pose`, and the distance to it
    ///
    /// An action whose start state equals the discretized pose wins outright,
    /// the lowest such index first. Then an action with an intermediate
    /// sample in that state. Otherwise the action owning the closest start or
    /// sample in x/y.
    pub fn find_closest_plan_index(&self, plan: &Plan, pose: ContinuousPose) -> (usize, f32) {
        if plan.is_empty() {
            return (0, pose.distance(&to_continuous(plan.start, self.discretization())));
        }
        let target = to_discrete(pose, self.discretization());
        let mut closest = (0, f32::INFINITY);

        let mut curr = plan.start;
        for index in 0..plan.len() {
            if curr == target {
                return (index, 0.0);
            }
            let dist = pose.distance(&to_continuous(curr, self.discretization()));
            if dist < closest.1 {
                closest = (index, dist);
            }
            match self.advance(plan, index, curr) {
                Ok((_, next)) => curr = next,
                Err(_) => break,
            }
        }

        let mut curr = plan.start;
        for index in 0..plan.len() {
            let Ok((prim, next)) = self.advance(plan, index, curr) else {
                break;
            };
            let origin = to_continuous(curr, self.discretization());
            // the last sample is the next action's start
            let num_samples = prim.intermediate_positions.len().saturating_sub(1);
            for sample in prim.placed_samples(origin).take(num_samples) {
                if to_discrete(sample, self.discretization()) == target {
                    return (index, 0.0);
                }
                let dist = pose.distance(&sample);
                if dist < closest.1 {
                    closest = (index, dist);
                }
            }
            curr = next;
        }

        closest
    }
}
