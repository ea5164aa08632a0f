//! Motion primitive library
//!
//! Built once from a [`LatticeDefinition`], then frozen and shared between
//! environments.

use std::collections::BTreeMap;
use std::f32::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{ActionId, ContinuousPose, DiscretePose, DiscreteTheta, LatticeError, LatticeResult, INVALID_ACTION_ID};

use super::discretization::{normalize_angle, Discretization, DiscretizationConfig, HeadingTable, StateIdLayout};
use super::motion_primitive::{ActionType, MotionPrimitive, PrimitiveDefinition, RobotActionParams};
use super::path_segment::SegmentDefinition;

/// Everything needed to build a library, as read from a primitive file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeDefinition {
    pub discretization: DiscretizationConfig,
    pub actions: Vec<ActionType>,
    #[serde(default)]
    pub robot: RobotActionParams,
    /// Primitives per starting heading index
    pub angles: BTreeMap<usize, Vec<PrimitiveDefinition>>,
}

impl LatticeDefinition {
    pub fn from_json_str(json: &str) -> LatticeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> LatticeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn build_discretization(&self) -> LatticeResult<Discretization> {
        Discretization::from_config(&self.discretization)
    }

    /// Grid exact lattice with uniformly spaced headings
    ///
    /// Four actions per heading: forward one cell, reverse one cell, turn
    /// left in place and turn right in place. Only 4 and 8 headings keep
    /// every straight move on a grid neighbour.
    pub fn point_turn_lattice(resolution_mm: f32, num_angles: usize) -> LatticeResult<Self> {
        if num_angles != 4 && num_angles != 8 {
            return Err(LatticeError::InvalidParameter(format!(
                "point turn lattice needs 4 or 8 headings, got {}",
                num_angles
            )));
        }
        const SAMPLES_PER_MOVE: usize = 4;

        let headings = HeadingTable::uniform(num_angles)?;
        let step_rad = 2.0 * PI / num_angles as f32;

        let actions = vec![
            ActionType::new("forward", 1.0, false),
            ActionType::new("reverse", 2.0, true),
            ActionType::new("turn_left", 1.0, false),
            ActionType::new("turn_right", 1.0, false),
        ];

        let mut angles = BTreeMap::new();
        for (theta, &angle) in headings.angles().iter().enumerate() {
            let dx = angle.cos().round() as i16;
            let dy = angle.sin().round() as i16;
            let length_mm = resolution_mm * f32::from(dx).hypot(f32::from(dy));

            let drive = |action_id: ActionId, sign: i16| PrimitiveDefinition {
                action_id,
                end_pose: DiscretePose::new(sign * dx, sign * dy, theta as DiscreteTheta),
                intermediate_poses: (1..=SAMPLES_PER_MOVE)
                    .map(|i| {
                        let t = f32::from(sign) * i as f32 / SAMPLES_PER_MOVE as f32;
                        ContinuousPose::new(
                            t * resolution_mm * f32::from(dx),
                            t * resolution_mm * f32::from(dy),
                            angle,
                        )
                    })
                    .collect(),
                segments: vec![SegmentDefinition::Straight {
                    length_mm: f32::from(sign) * length_mm,
                }],
                cost: None,
            };

            let turn = |action_id: ActionId, direction: f32, end_theta: usize| PrimitiveDefinition {
                action_id,
                end_pose: DiscretePose::new(0, 0, end_theta as DiscreteTheta),
                intermediate_poses: (1..=SAMPLES_PER_MOVE)
                    .map(|i| {
                        let swept = direction * step_rad * i as f32 / SAMPLES_PER_MOVE as f32;
                        ContinuousPose::new(0.0, 0.0, normalize_angle(angle + swept))
                    })
                    .collect(),
                segments: vec![SegmentDefinition::TurnInPlace {
                    sweep_rad: direction * step_rad,
                }],
                cost: None,
            };

            angles.insert(
                theta,
                vec![
                    drive(0, 1),
                    drive(1, -1),
                    turn(2, 1.0, (theta + 1) % num_angles),
                    turn(3, -1.0, (theta + num_angles - 1) % num_angles),
                ],
            );
        }

        Ok(Self {
            discretization: DiscretizationConfig {
                resolution_mm,
                angle_definitions: headings.angles().to_vec(),
                layout: StateIdLayout::default(),
            },
            actions,
            robot: RobotActionParams::default(),
            angles,
        })
    }
}

/// Frozen per-heading primitive tables
#[derive(Debug, Clone)]
pub struct MotionPrimitiveLibrary {
    /// `[start_theta][action_id]`
    primitives: Vec<Vec<MotionPrimitive>>,
    /// `[end_theta]`: primitives that end on a heading, offsets negated
    reverse_primitives: Vec<Vec<MotionPrimitive>>,
    action_types: Vec<ActionType>,
    robot: RobotActionParams,
}

impl MotionPrimitiveLibrary {
    pub fn build(definition: &LatticeDefinition, discretization: &Discretization) -> LatticeResult<Self> {
        definition.robot.validate()?;

        if definition.actions.is_empty() || definition.actions.len() > usize::from(INVALID_ACTION_ID) {
            return Err(LatticeError::InvalidParameter(format!(
                "need between 1 and {} action types, got {}",
                INVALID_ACTION_ID,
                definition.actions.len()
            )));
        }
        if let Some(action) = definition
            .actions
            .iter()
            .find(|a| !(a.extra_cost_factor.is_finite() && a.extra_cost_factor >= 0.0))
        {
            return Err(LatticeError::InvalidParameter(format!(
                "action '{}' has invalid cost factor {}",
                action.name, action.extra_cost_factor
            )));
        }

        let num_angles = discretization.num_angles();
        if let Some(&theta) = definition.angles.keys().find(|&&theta| theta >= num_angles) {
            return Err(LatticeError::UnknownHeading { theta, num_angles });
        }

        let mut primitives = Vec::with_capacity(num_angles);
        let mut expected_count = None;
        for theta in 0..num_angles {
            let heading = theta as DiscreteTheta;
            let definitions = definition
                .angles
                .get(&theta)
                .filter(|defs| !defs.is_empty())
                .ok_or(LatticeError::MissingHeading { theta: heading })?;

            let expected = *expected_count.get_or_insert(definitions.len());
            if definitions.len() != expected {
                return Err(LatticeError::PrimitiveCountMismatch {
                    theta: heading,
                    expected,
                    found: definitions.len(),
                });
            }

            let prims = definitions
                .iter()
                .enumerate()
                .map(|(index, def)| {
                    MotionPrimitive::create(
                        def,
                        heading,
                        index,
                        discretization,
                        &definition.actions,
                        &definition.robot,
                    )
                })
                .collect::<LatticeResult<Vec<_>>>()?;
            primitives.push(prims);
        }

        let reverse_primitives = Self::reverse_table(&primitives, num_angles);

        let num_prims: usize = primitives.iter().map(Vec::len).sum();
        info!("Added {} motion primitives", num_prims);

        Ok(Self {
            primitives,
            reverse_primitives,
            action_types: definition.actions.clone(),
            robot: definition.robot,
        })
    }

    fn reverse_table(primitives: &[Vec<MotionPrimitive>], num_angles: usize) -> Vec<Vec<MotionPrimitive>> {
        let mut reverse = vec![Vec::new(); num_angles];
        for prim in primitives.iter().flatten() {
            reverse[usize::from(prim.end_theta())].push(prim.reversed());
        }
        reverse
    }

    /// Library for the point turn lattice and its discretization
    pub fn point_turn(resolution_mm: f32, num_angles: usize) -> LatticeResult<(Discretization, Self)> {
        let definition = LatticeDefinition::point_turn_lattice(resolution_mm, num_angles)?;
        let discretization = definition.build_discretization()?;
        let library = Self::build(&definition, &discretization)?;
        Ok((discretization, library))
    }

    pub fn get(&self, theta: DiscreteTheta, action: ActionId) -> Option<&MotionPrimitive> {
        self.primitives
            .get(usize::from(theta))
            .and_then(|prims| prims.get(usize::from(action)))
    }

    /// Primitives starting at `theta`, empty for an unknown heading
    pub fn primitives_from(&self, theta: DiscreteTheta) -> &[MotionPrimitive] {
        self.primitives
            .get(usize::from(theta))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Primitives ending at `theta`, with offsets pointing back to their start
    pub fn primitives_into(&self, theta: DiscreteTheta) -> &[MotionPrimitive] {
        self.reverse_primitives
            .get(usize::from(theta))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn num_angles(&self) -> usize {
        self.primitives.len()
    }

    /// Same for every heading
    pub fn num_actions(&self) -> usize {
        self.primitives.first().map_or(0, Vec::len)
    }

    pub fn action_types(&self) -> &[ActionType] {
        &self.action_types
    }

    pub fn action_type(&self, action: ActionId) -> Option<&ActionType> {
        self.action_types.get(usize::from(action))
    }

    pub fn robot_params(&self) -> &RobotActionParams {
        &self.robot
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotionPrimitive> + '_ {
        self.primitives.iter().flatten()
    }
}
