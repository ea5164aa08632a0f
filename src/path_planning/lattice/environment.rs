//! Lattice environment
//!
//! Ties the discretization, a shared primitive library and the obstacles
//! together and answers the questions a lattice search asks: which actions
//! are legal from a state, where they lead, and whether a pose collides.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::{
    ActionId, ContinuousPose, DiscretePose, DiscreteTheta, LatticeError, LatticeResult, LatticeSearchSpace, StateId,
    Visualizable, WorldPose,
};
use crate::utils::{colors, Visualizer};

use super::discretization::{to_continuous, Discretization, DiscretizationConfig};
use super::motion_primitive::{ActionType, MotionPrimitive};
use super::obstacle::{Footprint, ObstacleStore, RotatedRectangle};
use super::path_segment::PathSegment;
use super::primitive_library::{LatticeDefinition, MotionPrimitiveLibrary};
use super::successor::SuccessorIterator;

/// Configuration for [`Environment`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub discretization: DiscretizationConfig,
    #[serde(default)]
    pub footprint: Footprint,
    /// Sample spacing when checking executable paths [mm]
    pub path_check_step_mm: f32,
    /// Sample spacing when checking executable paths [rad]
    pub path_check_step_rad: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            discretization: DiscretizationConfig::default(),
            footprint: Footprint::Point,
            path_check_step_mm: 0.25,
            path_check_step_rad: std::f32::consts::PI / 32.0,
        }
    }
}

/// Result of [`Environment::check_path`]
#[derive(Debug, Clone, PartialEq)]
pub struct PathCheck {
    pub safe: bool,
    /// Leading segments that are collision free
    pub valid_segments: Vec<PathSegment>,
}

#[derive(Debug, Clone)]
pub struct Environment {
    config: EnvironmentConfig,
    discretization: Discretization,
    library: Arc<MotionPrimitiveLibrary>,
    obstacles: ObstacleStore,
}

impl Environment {
    /// Create an environment over an already built library
    pub fn new(config: EnvironmentConfig, library: Arc<MotionPrimitiveLibrary>) -> LatticeResult<Self> {
        let discretization = Discretization::from_config(&config.discretization)?;
        if library.num_angles() != discretization.num_angles() {
            return Err(LatticeError::InvalidParameter(format!(
                "library has {} headings, discretization has {}",
                library.num_angles(),
                discretization.num_angles()
            )));
        }
        if !config.footprint.is_valid() {
            return Err(LatticeError::InvalidParameter(format!(
                "invalid footprint {:?}",
                config.footprint
            )));
        }
        if !(config.path_check_step_mm > 0.0 && config.path_check_step_rad > 0.0) {
            return Err(LatticeError::InvalidParameter(
                "path check steps must be positive".to_string(),
            ));
        }
        Ok(Self {
            config,
            discretization,
            library,
            obstacles: ObstacleStore::new(),
        })
    }

    /// Build the library from `definition` and wrap it
    pub fn from_definition(definition: &LatticeDefinition, footprint: Footprint) -> LatticeResult<Self> {
        let discretization = definition.build_discretization()?;
        let library = MotionPrimitiveLibrary::build(definition, &discretization)?;
        let config = EnvironmentConfig {
            discretization: definition.discretization.clone(),
            footprint,
            ..EnvironmentConfig::default()
        };
        Self::new(config, Arc::new(library))
    }

    /// Environment over the point turn lattice
    pub fn point_turn(resolution_mm: f32, num_angles: usize, footprint: Footprint) -> LatticeResult<Self> {
        Self::from_definition(&LatticeDefinition::point_turn_lattice(resolution_mm, num_angles)?, footprint)
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn discretization(&self) -> &Discretization {
        &self.discretization
    }

    pub fn library(&self) -> &Arc<MotionPrimitiveLibrary> {
        &self.library
    }

    pub fn footprint(&self) -> Footprint {
        self.config.footprint
    }

    pub fn num_actions(&self) -> usize {
        self.library.num_actions()
    }

    pub fn action_type(&self, action: ActionId) -> Option<&ActionType> {
        self.library.action_type(action)
    }

    /// Primitive for `action` from heading `theta`, if both exist
    pub fn get_motion(&self, theta: DiscreteTheta, action: ActionId) -> Option<&MotionPrimitive> {
        self.library.get(theta, action)
    }

    /// State reached by taking `action` from `state_id`
    ///
    /// `None` when the action does not exist, the result leaves the state id
    /// layout, or (when `check_collisions` is set) any sample of the motion
    /// or the resulting pose collides.
    pub fn apply_action(&self, action: ActionId, state_id: StateId, check_collisions: bool) -> Option<StateId> {
        let curr = self.discretization.state_id_to_state(state_id);
        let prim = self.get_motion(curr.theta, action)?;
        let next = self.offset_pose(curr, prim)?;
        let next_id = self.on_map_state_id(next)?;
        if check_collisions && self.motion_collides(prim, curr, next) {
            return None;
        }
        Some(next_id)
    }

    /// `curr` moved by the primitive's offset, `None` past the i16 range
    pub(crate) fn offset_pose(&self, curr: DiscretePose, prim: &MotionPrimitive) -> Option<DiscretePose> {
        let offset = prim.end_state_offset;
        match (curr.x.checked_add(offset.x), curr.y.checked_add(offset.y)) {
            (Some(x), Some(y)) => Some(DiscretePose::new(x, y, offset.theta)),
            _ => {
                warn!("Motion {} from {} leaves the grid", prim.id, curr);
                None
            }
        }
    }

    pub(crate) fn on_map_state_id(&self, pose: DiscretePose) -> Option<StateId> {
        match self.discretization.state_to_state_id(pose) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("Dropping off-map state: {}", err);
                None
            }
        }
    }

    /// Samples of `prim` driven from `origin`, plus the pose `end`
    pub(crate) fn motion_collides(&self, prim: &MotionPrimitive, origin: DiscretePose, end: DiscretePose) -> bool {
        let start = to_continuous(origin, &self.discretization);
        prim.placed_samples(start).any(|sample| self.is_in_collision(&sample)) || self.is_in_collision(&end)
    }

    pub fn is_in_collision<P: WorldPose + ?Sized>(&self, pose: &P) -> bool {
        let pose = pose.to_world(&self.discretization);
        self.obstacles.collides(&self.config.footprint, pose)
    }

    pub fn add_obstacle(&mut self, obstacle: RotatedRectangle) -> LatticeResult<()> {
        self.obstacles.push(obstacle)
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles.clear();
    }

    pub fn obstacles(&self) -> &ObstacleStore {
        &self.obstacles
    }

    pub fn num_obstacles(&self) -> usize {
        self.obstacles.len()
    }

    /// Snapshot with a different obstacle set, sharing the library
    pub fn with_obstacles(&self, obstacles: impl IntoIterator<Item = RotatedRectangle>) -> LatticeResult<Self> {
        Ok(Self {
            config: self.config.clone(),
            discretization: self.discretization.clone(),
            library: Arc::clone(&self.library),
            obstacles: ObstacleStore::from_rectangles(obstacles)?,
        })
    }

    /// Add obstacles from a JSON array; returns how many were added
    pub fn import_obstacles_json(&mut self, json: &str) -> LatticeResult<usize> {
        let rectangles: Vec<RotatedRectangle> = serde_json::from_str(json)?;
        let count = rectangles.len();
        for rectangle in rectangles {
            self.add_obstacle(rectangle)?;
        }
        Ok(count)
    }

    pub fn obstacles_to_json(&self) -> LatticeResult<String> {
        Ok(serde_json::to_string_pretty(&self.obstacles.to_rectangles())?)
    }

    pub fn get_successors(&self, state_id: StateId, g: f32) -> SuccessorIterator<'_> {
        SuccessorIterator::new(self, state_id, g, false)
    }

    /// Predecessors of `state_id`, for searching backwards from a goal
    pub fn get_successors_reverse(&self, state_id: StateId, g: f32) -> SuccessorIterator<'_> {
        SuccessorIterator::new(self, state_id, g, true)
    }

    /// Nearest collision free lattice pose among the cells around `pose`
    ///
    /// Only the floor/ceil neighbours in x and y are tried; the heading is
    /// the nearest table entry.
    pub fn round_safe(&self, pose: ContinuousPose) -> Option<DiscretePose> {
        let res = self.discretization.resolution_mm();
        let theta = self.discretization.headings().radians_to_theta(pose.theta_rad);
        let (fx, fy) = (pose.x_mm / res, pose.y_mm / res);
        let (min, max) = self.discretization.layout().xy_range();
        let cells = |f: f32| {
            [f.floor(), f.ceil()]
                .into_iter()
                .filter(move |c| *c >= min as f32 && *c <= max as f32)
                .map(|c| c as i16)
        };

        let mut best: Option<(f32, DiscretePose)> = None;
        for x in cells(fx) {
            for y in cells(fy) {
                let candidate = DiscretePose::new(x, y, theta);
                if !self.discretization.layout().contains(candidate) || self.is_in_collision(&candidate) {
                    continue;
                }
                let dist = to_continuous(candidate, &self.discretization).distance(&pose);
                if best.map_or(true, |(best_dist, _)| dist < best_dist) {
                    best = Some((dist, candidate));
                }
            }
        }
        best.map(|(_, candidate)| candidate)
    }

    /// Drive `segments` in order and stop at the first collision
    pub fn check_path(&self, segments: &[PathSegment]) -> PathCheck {
        let mut valid_segments = Vec::with_capacity(segments.len());
        for segment in segments {
            let blocked = segment
                .sample(self.config.path_check_step_mm, self.config.path_check_step_rad)
                .iter()
                .skip(1)
                .any(|sample| self.is_in_collision(sample));
            if blocked {
                warn!("Collision along path segment {}", valid_segments.len());
                return PathCheck {
                    safe: false,
                    valid_segments,
                };
            }
            valid_segments.push(*segment);
        }
        PathCheck {
            safe: !segments.is_empty(),
            valid_segments,
        }
    }
}

impl LatticeSearchSpace for Environment {
    type Successors<'a> = SuccessorIterator<'a>
    where
        Self: 'a;

    fn successors(&self, state: StateId, g: f32) -> SuccessorIterator<'_> {
        self.get_successors(state, g)
    }

    fn state_id(&self, pose: DiscretePose) -> LatticeResult<StateId> {
        self.discretization.state_to_state_id(pose)
    }

    fn state(&self, id: StateId) -> DiscretePose {
        self.discretization.state_id_to_state(id)
    }
}

impl Visualizable for Environment {
    fn visualize(&self, vis: &mut Visualizer) {
        vis.plot_rectangles(self.obstacles.iter(), colors::OBSTACLE, "Obstacles");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_planning::lattice::{HeadingTable, PrimitiveDefinition, RobotActionParams, StateIdLayout};
    use std::collections::BTreeMap;

    /// Four headings at 10mm, one unit-cost straight move per heading
    fn straight_definition() -> LatticeDefinition {
        let headings = HeadingTable::uniform(4).unwrap();
        let mut angles = BTreeMap::new();
        for (theta, &angle) in headings.angles().iter().enumerate() {
            let (dx, dy) = (angle.cos().round() as i16, angle.sin().round() as i16);
            angles.insert(
                theta,
                vec![PrimitiveDefinition {
                    action_id: 0,
                    end_pose: DiscretePose::new(dx, dy, theta as u8),
                    intermediate_poses: (1..=2)
                        .map(|i| {
                            let t = i as f32 * 5.0;
                            ContinuousPose::new(t * f32::from(dx), t * f32::from(dy), angle)
                        })
                        .collect(),
                    segments: Vec::new(),
                    cost: Some(1.0),
                }],
            );
        }
        LatticeDefinition {
            discretization: DiscretizationConfig {
                resolution_mm: 10.0,
                angle_definitions: headings.angles().to_vec(),
                layout: StateIdLayout::default(),
            },
            actions: vec![ActionType::new("forward", 1.0, false)],
            robot: RobotActionParams::default(),
            angles,
        }
    }

    fn straight_env() -> Environment {
        Environment::from_definition(&straight_definition(), Footprint::Point).unwrap()
    }

    fn origin_id(env: &Environment) -> StateId {
        env.discretization()
            .state_to_state_id(DiscretePose::new(0, 0, 0))
            .unwrap()
    }

    #[test]
    fn test_forward_successor_from_origin() {
        let env = straight_env();
        let successors: Vec<_> = env.get_successors(origin_id(&env), 3.5).collect();
        assert_eq!(successors.len(), 1);
        assert_eq!(
            env.discretization().state_id_to_state(successors[0].state_id),
            DiscretePose::new(1, 0, 0)
        );
        assert_eq!(successors[0].action_id, 0);
        assert_eq!(successors[0].g, 4.5);
    }

    #[test]
    fn test_obstacle_blocks_only_when_checking() {
        let mut env = straight_env();
        env.add_obstacle(RotatedRectangle::axis_aligned(5.0, -5.0, 15.0, 5.0)).unwrap();
        let start = origin_id(&env);
        let expected = env
            .discretization()
            .state_to_state_id(DiscretePose::new(1, 0, 0))
            .unwrap();

        assert_eq!(env.apply_action(0, start, true), None);
        assert_eq!(env.apply_action(0, start, false), Some(expected));
        assert_eq!(env.get_successors(start, 0.0).count(), 0);
    }

    #[test]
    fn test_get_motion_bounds() {
        let env = straight_env();
        assert!(env.get_motion(0, 0).is_some());
        assert!(env.get_motion(0, 1).is_none());
        assert!(env.get_motion(4, 0).is_none());
        assert_eq!(env.apply_action(7, origin_id(&env), false), None);
    }

    #[test]
    fn test_is_in_collision_pose_kinds() {
        let mut env = straight_env();
        env.add_obstacle(RotatedRectangle::new(30.0, 30.0, 4.0, 4.0, 0.3)).unwrap();
        assert!(env.is_in_collision(&DiscretePose::new(3, 3, 2)));
        assert!(env.is_in_collision(&ContinuousPose::new(31.0, 29.0, 0.0)));
        assert!(!env.is_in_collision(&ContinuousPose::new(35.0, 30.0, 0.0)));
        env.clear_obstacles();
        assert!(!env.is_in_collision(&DiscretePose::new(3, 3, 2)));
    }

    #[test]
    fn test_circle_footprint() {
        let mut env = Environment::from_definition(&straight_definition(), Footprint::Circle { radius_mm: 6.0 }).unwrap();
        env.add_obstacle(RotatedRectangle::axis_aligned(15.0, -5.0, 25.0, 5.0)).unwrap();
        // the end cell (10, 0) is 5mm from the obstacle
        assert_eq!(env.apply_action(0, origin_id(&env), true), None);
    }

    #[test]
    fn test_with_obstacles_shares_library() {
        let env = straight_env();
        let snapshot = env
            .with_obstacles(vec![RotatedRectangle::axis_aligned(5.0, -5.0, 15.0, 5.0)])
            .unwrap();
        assert!(Arc::ptr_eq(env.library(), snapshot.library()));
        assert_eq!(env.num_obstacles(), 0);
        assert_eq!(snapshot.num_obstacles(), 1);
        assert!(env.apply_action(0, origin_id(&env), true).is_some());
        assert!(snapshot.apply_action(0, origin_id(&snapshot), true).is_none());
    }

    #[test]
    fn test_obstacle_json_round_trip() {
        let mut env = straight_env();
        env.add_obstacle(RotatedRectangle::new(1.0, 2.0, 3.0, 4.0, 0.5)).unwrap();
        env.add_obstacle(RotatedRectangle::axis_aligned(-10.0, -10.0, 0.0, 0.0)).unwrap();
        let json = env.obstacles_to_json().unwrap();

        let mut other = straight_env();
        assert_eq!(other.import_obstacles_json(&json).unwrap(), 2);
        assert_eq!(other.obstacles().to_rectangles(), env.obstacles().to_rectangles());
        assert!(other.import_obstacles_json("not json").is_err());
    }

    #[test]
    fn test_round_safe() {
        let mut env = straight_env();
        let pose = ContinuousPose::new(12.0, 3.0, 0.1);
        assert_eq!(env.round_safe(pose), Some(DiscretePose::new(1, 0, 0)));

        env.add_obstacle(RotatedRectangle::axis_aligned(8.0, -2.0, 12.0, 2.0)).unwrap();
        assert_eq!(env.round_safe(pose), Some(DiscretePose::new(1, 1, 0)));

        env.add_obstacle(RotatedRectangle::axis_aligned(5.0, -5.0, 25.0, 25.0)).unwrap();
        assert_eq!(env.round_safe(pose), None);
    }

    #[test]
    fn test_round_safe_stays_inside_layout() {
        let env = straight_env();
        let (_, max) = env.discretization().layout().xy_range();
        let edge_mm = (max as f32 + 0.5) * env.discretization().resolution_mm();

        let rounded = env.round_safe(ContinuousPose::new(edge_mm, 0.0, 0.0)).unwrap();
        assert_eq!(i32::from(rounded.x), max);
        assert!(env.discretization().state_to_state_id(rounded).is_ok());

        assert_eq!(env.round_safe(ContinuousPose::new(1.0e6, 0.0, 0.0)), None);
        assert_eq!(env.round_safe(ContinuousPose::new(0.0, -1.0e9, 0.0)), None);
    }

    #[test]
    fn test_check_path() {
        let mut env = straight_env();
        let segments = vec![
            PathSegment::Line {
                start_x_mm: 0.0,
                start_y_mm: 0.0,
                end_x_mm: 20.0,
                end_y_mm: 0.0,
                reverse: false,
            },
            PathSegment::Line {
                start_x_mm: 20.0,
                start_y_mm: 0.0,
                end_x_mm: 20.0,
                end_y_mm: 20.0,
                reverse: false,
            },
        ];
        let check = env.check_path(&segments);
        assert!(check.safe);
        assert_eq!(check.valid_segments.len(), 2);

        env.add_obstacle(RotatedRectangle::axis_aligned(18.0, 8.0, 22.0, 12.0)).unwrap();
        let check = env.check_path(&segments);
        assert!(!check.safe);
        assert_eq!(check.valid_segments, segments[..1].to_vec());

        assert!(!env.check_path(&[]).safe);
    }

    #[test]
    fn test_mismatched_library_rejected() {
        let (_, library) = MotionPrimitiveLibrary::point_turn(10.0, 8).unwrap();
        let config = EnvironmentConfig {
            discretization: straight_definition().discretization,
            ..EnvironmentConfig::default()
        };
        assert!(Environment::new(config, Arc::new(library)).is_err());
    }

    #[test]
    fn test_environment_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Environment>();
    }
}
