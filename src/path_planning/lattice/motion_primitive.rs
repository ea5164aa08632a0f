//! Motion primitives
//!
//! A primitive is one precomputed move from a given starting heading: where it
//! ends on the lattice, the sampled curve it drives, the drivable segments
//! that make up that curve and what it costs.

use serde::{Deserialize, Serialize};

use crate::common::{ActionId, ContinuousPose, DiscretePose, DiscreteTheta, LatticeError, LatticeResult};

use super::discretization::Discretization;
use super::path_segment::{realize_segments, segments_from_samples, PathSegment, SegmentDefinition};

/// Kind of action shared by all headings, e.g. "forward" or "turn left"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionType {
    pub name: String,
    /// Multiplier applied to the primitive cost when searching
    pub extra_cost_factor: f32,
    /// The action drives backwards
    #[serde(default)]
    pub reverse: bool,
}

impl ActionType {
    pub fn new(name: impl Into<String>, extra_cost_factor: f32, reverse: bool) -> Self {
        Self {
            name: name.into(),
            extra_cost_factor,
            reverse,
        }
    }
}

/// Robot parameters used to turn geometry into travel time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotActionParams {
    pub half_wheel_base_mm: f32,
    pub max_velocity_mmps: f32,
    pub max_reverse_velocity_mmps: f32,
}

impl Default for RobotActionParams {
    fn default() -> Self {
        Self {
            half_wheel_base_mm: 23.85,
            max_velocity_mmps: 60.0,
            max_reverse_velocity_mmps: 25.0,
        }
    }
}

impl RobotActionParams {
    pub fn validate(&self) -> LatticeResult<()> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if positive(self.half_wheel_base_mm)
            && positive(self.max_velocity_mmps)
            && positive(self.max_reverse_velocity_mmps)
        {
            Ok(())
        } else {
            Err(LatticeError::InvalidParameter(format!(
                "robot parameters must be positive: {:?}",
                self
            )))
        }
    }

    /// Seconds needed to drive `segment`
    pub fn travel_time(&self, segment: &PathSegment, reverse_action: bool) -> f32 {
        match *segment {
            PathSegment::PointTurn { sweep_rad, .. } => {
                self.half_wheel_base_mm * sweep_rad.abs() / self.max_velocity_mmps
            }
            _ => {
                let velocity = if reverse_action || segment.is_reverse() {
                    self.max_reverse_velocity_mmps
                } else {
                    self.max_velocity_mmps
                };
                segment.length() / velocity
            }
        }
    }
}

/// Serializable description of one primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveDefinition {
    pub action_id: ActionId,
    /// Cell offset and absolute end heading
    pub end_pose: DiscretePose,
    /// Samples relative to `(0, 0, start heading)`
    pub intermediate_poses: Vec<ContinuousPose>,
    /// Explicit geometry; derived from the samples when empty
    #[serde(default)]
    pub segments: Vec<SegmentDefinition>,
    /// Explicit cost; travel time when absent
    #[serde(default)]
    pub cost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionPrimitive {
    /// Action id, equal to the primitive's index at its heading
    pub id: ActionId,
    pub start_theta: DiscreteTheta,
    pub cost: f32,
    /// `x`/`y` are relative cells, `theta` is the absolute resulting heading
    pub end_state_offset: DiscretePose,
    /// Relative to `(0, 0, start heading)`
    pub intermediate_positions: Vec<ContinuousPose>,
    /// Relative to `(0, 0, start heading)`
    pub path_segments: Vec<PathSegment>,
}

impl MotionPrimitive {
    /// Validate a definition and precompute its geometry and cost
    pub fn create(
        definition: &PrimitiveDefinition,
        start_theta: DiscreteTheta,
        index: usize,
        discretization: &Discretization,
        action_types: &[ActionType],
        robot: &RobotActionParams,
    ) -> LatticeResult<Self> {
        let degenerate = |reason: String| LatticeError::DegeneratePrimitive {
            theta: start_theta,
            index,
            reason,
        };

        if usize::from(definition.action_id) != index {
            return Err(LatticeError::ActionIdMismatch {
                theta: start_theta,
                index,
                action_id: definition.action_id,
            });
        }
        let action = action_types
            .get(usize::from(definition.action_id))
            .ok_or(LatticeError::UnknownActionType {
                theta: start_theta,
                index,
                action_id: definition.action_id,
            })?;
        if usize::from(definition.end_pose.theta) >= discretization.num_angles() {
            return Err(LatticeError::UnknownHeading {
                theta: usize::from(definition.end_pose.theta),
                num_angles: discretization.num_angles(),
            });
        }

        let last = definition
            .intermediate_poses
            .last()
            .ok_or_else(|| degenerate("no intermediate poses".to_string()))?;
        if !definition.intermediate_poses.iter().all(ContinuousPose::is_finite) {
            return Err(degenerate("non-finite intermediate pose".to_string()));
        }
        if !definition.segments.iter().all(SegmentDefinition::is_finite) {
            return Err(degenerate("non-finite segment".to_string()));
        }
        if definition.segments.iter().any(SegmentDefinition::is_zero_length) {
            return Err(degenerate("zero length straight segment".to_string()));
        }

        let end_x_mm = discretization.cell_to_mm(definition.end_pose.x);
        let end_y_mm = discretization.cell_to_mm(definition.end_pose.y);
        let miss = (last.x_mm - end_x_mm).hypot(last.y_mm - end_y_mm);
        if miss > 0.5 * discretization.resolution_mm() {
            return Err(degenerate(format!(
                "last sample ({}, {}) is {:.2}mm from the end offset",
                last.x_mm, last.y_mm, miss
            )));
        }

        let start_angle = discretization.headings().theta_to_radians(start_theta);
        let origin = ContinuousPose::new(0.0, 0.0, start_angle);
        let path_segments = if definition.segments.is_empty() {
            let samples: Vec<ContinuousPose> = std::iter::once(origin)
                .chain(definition.intermediate_poses.iter().copied())
                .collect();
            segments_from_samples(&samples)
        } else {
            let segments = realize_segments(&definition.segments, origin);
            if let Some(end) = segments.last().map(PathSegment::end_pose) {
                let miss = (end.x_mm - end_x_mm).hypot(end.y_mm - end_y_mm);
                if miss > 0.5 * discretization.resolution_mm() {
                    return Err(degenerate(format!(
                        "segments end at ({:.2}, {:.2}), {:.2}mm from the end offset",
                        end.x_mm, end.y_mm, miss
                    )));
                }
            }
            segments
        };

        let cost = match definition.cost {
            Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
            Some(cost) => return Err(degenerate(format!("invalid cost {}", cost))),
            None => path_segments
                .iter()
                .map(|segment| robot.travel_time(segment, action.reverse))
                .sum(),
        };

        Ok(Self {
            id: definition.action_id,
            start_theta,
            cost,
            end_state_offset: definition.end_pose,
            intermediate_positions: definition.intermediate_poses.clone(),
            path_segments,
        })
    }

    pub fn end_theta(&self) -> DiscreteTheta {
        self.end_state_offset.theta
    }

    /// Driven distance summed over the segments [mm]
    pub fn length_mm(&self) -> f32 {
        self.path_segments.iter().map(PathSegment::length).sum()
    }

    /// Samples placed in the world for a primitive started at `origin`
    ///
    /// Samples carry their own heading, so only the position of `origin`
    /// matters.
    pub fn placed_samples(&self, origin: ContinuousPose) -> impl Iterator<Item = ContinuousPose> + '_ {
        self.intermediate_positions
            .iter()
            .map(move |sample| sample.translated(origin.x_mm, origin.y_mm))
    }

    /// Segments placed in the world for a primitive started at `origin`
    pub fn placed_segments(&self, origin: ContinuousPose) -> impl Iterator<Item = PathSegment> + '_ {
        self.path_segments
            .iter()
            .map(move |segment| segment.translated(origin.x_mm, origin.y_mm))
    }

    /// Entry for the backward table: offset negated, ends on the start
    /// heading. Samples stay relative to the predecessor.
    pub(crate) fn reversed(&self) -> Self {
        Self {
            end_state_offset: DiscretePose::new(
                self.end_state_offset.x.wrapping_neg(),
                self.end_state_offset.y.wrapping_neg(),
                self.start_theta,
            ),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_planning::lattice::discretization::{HeadingTable, StateIdLayout};
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn cardinal() -> Discretization {
        Discretization::new(10.0, HeadingTable::uniform(4).unwrap(), StateIdLayout::default()).unwrap()
    }

    fn actions() -> Vec<ActionType> {
        vec![ActionType::new("forward", 1.0, false), ActionType::new("reverse", 2.0, true)]
    }

    fn straight(action_id: ActionId, cells: i16) -> PrimitiveDefinition {
        let end = f32::from(cells) * 10.0;
        PrimitiveDefinition {
            action_id,
            end_pose: DiscretePose::new(cells, 0, 0),
            intermediate_poses: (1..=4)
                .map(|i| ContinuousPose::new(end * i as f32 / 4.0, 0.0, 0.0))
                .collect(),
            segments: Vec::new(),
            cost: None,
        }
    }

    #[test]
    fn test_travel_time_cost() {
        let robot = RobotActionParams::default();
        let prim = MotionPrimitive::create(&straight(0, 3), 0, 0, &cardinal(), &actions(), &robot).unwrap();
        assert_relative_eq!(prim.cost, 30.0 / robot.max_velocity_mmps, epsilon = 1e-5);
        assert_eq!(prim.path_segments.len(), 1);
        assert_relative_eq!(prim.length_mm(), 30.0, epsilon = 1e-4);
    }

    #[test]
    fn test_reverse_uses_reverse_velocity() {
        let robot = RobotActionParams::default();
        let prim = MotionPrimitive::create(&straight(1, -1), 0, 1, &cardinal(), &actions(), &robot).unwrap();
        assert!(prim.path_segments[0].is_reverse());
        assert_relative_eq!(prim.cost, 10.0 / robot.max_reverse_velocity_mmps, epsilon = 1e-5);
    }

    #[test]
    fn test_point_turn_cost() {
        let robot = RobotActionParams::default();
        let definition = PrimitiveDefinition {
            action_id: 0,
            end_pose: DiscretePose::new(0, 0, 1),
            intermediate_poses: vec![ContinuousPose::new(0.0, 0.0, 0.5), ContinuousPose::new(0.0, 0.0, FRAC_PI_2)],
            segments: vec![SegmentDefinition::TurnInPlace { sweep_rad: FRAC_PI_2 }],
            cost: None,
        };
        let prim = MotionPrimitive::create(&definition, 0, 0, &cardinal(), &actions(), &robot).unwrap();
        assert_relative_eq!(
            prim.cost,
            robot.half_wheel_base_mm * FRAC_PI_2 / robot.max_velocity_mmps,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_explicit_cost_wins() {
        let mut definition = straight(0, 1);
        definition.cost = Some(1.0);
        let prim =
            MotionPrimitive::create(&definition, 0, 0, &cardinal(), &actions(), &RobotActionParams::default()).unwrap();
        assert_eq!(prim.cost, 1.0);
    }

    #[test]
    fn test_rejects_bad_definitions() {
        let robot = RobotActionParams::default();
        let disc = cardinal();

        let result = MotionPrimitive::create(&straight(1, 1), 0, 0, &disc, &actions(), &robot);
        assert!(matches!(result, Err(LatticeError::ActionIdMismatch { .. })));

        let result = MotionPrimitive::create(&straight(2, 1), 0, 2, &disc, &actions(), &robot);
        assert!(matches!(result, Err(LatticeError::UnknownActionType { .. })));

        let mut definition = straight(0, 1);
        definition.end_pose.theta = 4;
        let result = MotionPrimitive::create(&definition, 0, 0, &disc, &actions(), &robot);
        assert!(matches!(result, Err(LatticeError::UnknownHeading { .. })));

        let mut definition = straight(0, 1);
        definition.intermediate_poses.clear();
        let result = MotionPrimitive::create(&definition, 0, 0, &disc, &actions(), &robot);
        assert!(matches!(result, Err(LatticeError::DegeneratePrimitive { .. })));

        let mut definition = straight(0, 1);
        definition.cost = Some(-1.0);
        let result = MotionPrimitive::create(&definition, 0, 0, &disc, &actions(), &robot);
        assert!(matches!(result, Err(LatticeError::DegeneratePrimitive { .. })));

        let mut definition = straight(0, 1);
        definition.end_pose.x = 2;
        let result = MotionPrimitive::create(&definition, 0, 0, &disc, &actions(), &robot);
        assert!(matches!(result, Err(LatticeError::DegeneratePrimitive { .. })));
    }

    #[test]
    fn test_rejects_bad_explicit_segments() {
        let robot = RobotActionParams::default();
        let disc = cardinal();

        let mut definition = straight(0, 1);
        definition.segments = vec![
            SegmentDefinition::Straight { length_mm: 0.0 },
            SegmentDefinition::Straight { length_mm: 10.0 },
        ];
        let result = MotionPrimitive::create(&definition, 0, 0, &disc, &actions(), &robot);
        assert!(matches!(result, Err(LatticeError::DegeneratePrimitive { .. })));

        // segments drive two cells for a one cell primitive
        definition.segments = vec![SegmentDefinition::Straight { length_mm: 20.0 }];
        let result = MotionPrimitive::create(&definition, 0, 0, &disc, &actions(), &robot);
        assert!(matches!(result, Err(LatticeError::DegeneratePrimitive { .. })));

        definition.segments = vec![SegmentDefinition::Straight { length_mm: 10.0 }];
        let prim = MotionPrimitive::create(&definition, 0, 0, &disc, &actions(), &robot).unwrap();
        assert_relative_eq!(prim.length_mm(), 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_placed_samples_translate_only() {
        let prim =
            MotionPrimitive::create(&straight(0, 1), 0, 0, &cardinal(), &actions(), &RobotActionParams::default())
                .unwrap();
        let placed: Vec<_> = prim.placed_samples(ContinuousPose::new(100.0, -20.0, 3.0)).collect();
        assert_eq!(placed.last(), Some(&ContinuousPose::new(110.0, -20.0, 0.0)));
    }

    #[test]
    fn test_reversed() {
        let prim =
            MotionPrimitive::create(&straight(0, 2), 0, 0, &cardinal(), &actions(), &RobotActionParams::default())
                .unwrap();
        let back = prim.reversed();
        assert_eq!(back.end_state_offset, DiscretePose::new(-2, 0, 0));
        assert_eq!(back.intermediate_positions, prim.intermediate_positions);
        assert_eq!(back.id, prim.id);
    }
}
