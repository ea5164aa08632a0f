//! Executable path segments
//!
//! Lines, arcs and point turns in continuous space. Motion primitives carry
//! these in their own frame; the plan materializer translates them into the
//! world for a path follower.

use std::f32::consts::{FRAC_PI_2, PI};

use itertools::Itertools;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::common::ContinuousPose;

use super::discretization::normalize_angle;

/// Positions closer than this are the same point [mm]
const POSITION_EPSILON_MM: f32 = 1e-3;
/// Headings closer than this are the same heading [rad]
const ANGLE_EPSILON_RAD: f32 = 1e-4;

/// A drivable piece of path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathSegment {
    /// Straight line; `reverse` drives it backwards
    Line {
        start_x_mm: f32,
        start_y_mm: f32,
        end_x_mm: f32,
        end_y_mm: f32,
        reverse: bool,
    },
    /// Circular arc around a center; `start_rad` is the angle of the start
    /// point seen from the center and `sweep_rad` is signed (CCW positive)
    Arc {
        center_x_mm: f32,
        center_y_mm: f32,
        radius_mm: f32,
        start_rad: f32,
        sweep_rad: f32,
        reverse: bool,
    },
    /// Turn in place
    PointTurn {
        x_mm: f32,
        y_mm: f32,
        start_angle_rad: f32,
        sweep_rad: f32,
    },
}

impl PathSegment {
    /// Driven distance [mm]; zero for point turns
    pub fn length(&self) -> f32 {
        match *self {
            PathSegment::Line {
                start_x_mm,
                start_y_mm,
                end_x_mm,
                end_y_mm,
                ..
            } => (end_x_mm - start_x_mm).hypot(end_y_mm - start_y_mm),
            PathSegment::Arc { radius_mm, sweep_rad, .. } => radius_mm * sweep_rad.abs(),
            PathSegment::PointTurn { .. } => 0.0,
        }
    }

    /// Heading change over the segment [rad]
    pub fn turned_angle(&self) -> f32 {
        match *self {
            PathSegment::Line { .. } => 0.0,
            PathSegment::Arc { sweep_rad, .. } | PathSegment::PointTurn { sweep_rad, .. } => sweep_rad,
        }
    }

    pub fn is_reverse(&self) -> bool {
        match *self {
            PathSegment::Line { reverse, .. } | PathSegment::Arc { reverse, .. } => reverse,
            PathSegment::PointTurn { .. } => false,
        }
    }

    pub fn start_point(&self) -> Vector2<f32> {
        match *self {
            PathSegment::Line { start_x_mm, start_y_mm, .. } => Vector2::new(start_x_mm, start_y_mm),
            PathSegment::Arc {
                center_x_mm,
                center_y_mm,
                radius_mm,
                start_rad,
                ..
            } => Vector2::new(
                center_x_mm + radius_mm * start_rad.cos(),
                center_y_mm + radius_mm * start_rad.sin(),
            ),
            PathSegment::PointTurn { x_mm, y_mm, .. } => Vector2::new(x_mm, y_mm),
        }
    }

    /// Heading the robot has when entering the segment
    pub fn start_angle(&self) -> f32 {
        match *self {
            PathSegment::Line { .. } => self.end_pose().theta_rad,
            PathSegment::Arc { sweep_rad, .. } => normalize_angle(self.end_pose().theta_rad - sweep_rad),
            PathSegment::PointTurn { start_angle_rad, .. } => start_angle_rad,
        }
    }

    pub fn start_pose(&self) -> ContinuousPose {
        let p = self.start_point();
        ContinuousPose::new(p.x, p.y, self.start_angle())
    }

    pub fn end_pose(&self) -> ContinuousPose {
        match *self {
            PathSegment::Line {
                start_x_mm,
                start_y_mm,
                end_x_mm,
                end_y_mm,
                reverse,
            } => {
                let travel = (end_y_mm - start_y_mm).atan2(end_x_mm - start_x_mm);
                let heading = if reverse { travel + PI } else { travel };
                ContinuousPose::new(end_x_mm, end_y_mm, normalize_angle(heading))
            }
            PathSegment::Arc {
                center_x_mm,
                center_y_mm,
                radius_mm,
                start_rad,
                sweep_rad,
                reverse,
            } => {
                let end_rad = start_rad + sweep_rad;
                let tangent = if sweep_rad > 0.0 { end_rad + FRAC_PI_2 } else { end_rad - FRAC_PI_2 };
                let heading = if reverse { tangent + PI } else { tangent };
                ContinuousPose::new(
                    center_x_mm + radius_mm * end_rad.cos(),
                    center_y_mm + radius_mm * end_rad.sin(),
                    normalize_angle(heading),
                )
            }
            PathSegment::PointTurn {
                x_mm,
                y_mm,
                start_angle_rad,
                sweep_rad,
            } => ContinuousPose::new(x_mm, y_mm, normalize_angle(start_angle_rad + sweep_rad)),
        }
    }

    /// Same segment shifted by `(dx, dy)`
    pub fn translated(&self, dx_mm: f32, dy_mm: f32) -> Self {
        let mut segment = *self;
        match segment {
            PathSegment::Line {
                ref mut start_x_mm,
                ref mut start_y_mm,
                ref mut end_x_mm,
                ref mut end_y_mm,
                ..
            } => {
                *start_x_mm += dx_mm;
                *start_y_mm += dy_mm;
                *end_x_mm += dx_mm;
                *end_y_mm += dy_mm;
            }
            PathSegment::Arc {
                ref mut center_x_mm,
                ref mut center_y_mm,
                ..
            } => {
                *center_x_mm += dx_mm;
                *center_y_mm += dy_mm;
            }
            PathSegment::PointTurn {
                ref mut x_mm,
                ref mut y_mm,
                ..
            } => {
                *x_mm += dx_mm;
                *y_mm += dy_mm;
            }
        }
        segment
    }

    /// Poses along the segment, start and end included, no further apart
    /// than `max_step_mm` in position or `max_step_rad` in heading
    pub fn sample(&self, max_step_mm: f32, max_step_rad: f32) -> Vec<ContinuousPose> {
        let by_length = (self.length() / max_step_mm.max(POSITION_EPSILON_MM)).ceil() as usize + 1;
        let by_angle = (self.turned_angle().abs() / max_step_rad.max(ANGLE_EPSILON_RAD)).ceil() as usize + 1;
        let num_points = by_length.max(by_angle).max(2);
        let start = self.start_pose();

        (0..num_points)
            .map(|i| {
                let t = i as f32 / (num_points - 1) as f32;
                match *self {
                    PathSegment::Line {
                        start_x_mm,
                        start_y_mm,
                        end_x_mm,
                        end_y_mm,
                        ..
                    } => ContinuousPose::new(
                        start_x_mm + t * (end_x_mm - start_x_mm),
                        start_y_mm + t * (end_y_mm - start_y_mm),
                        start.theta_rad,
                    ),
                    PathSegment::Arc {
                        center_x_mm,
                        center_y_mm,
                        radius_mm,
                        start_rad,
                        sweep_rad,
                        ..
                    } => {
                        let angle = start_rad + t * sweep_rad;
                        ContinuousPose::new(
                            center_x_mm + radius_mm * angle.cos(),
                            center_y_mm + radius_mm * angle.sin(),
                            normalize_angle(start.theta_rad + t * sweep_rad),
                        )
                    }
                    PathSegment::PointTurn { x_mm, y_mm, sweep_rad, .. } => {
                        ContinuousPose::new(x_mm, y_mm, normalize_angle(start.theta_rad + t * sweep_rad))
                    }
                }
            })
            .collect()
    }
}

/// Geometric description of one piece of a primitive, relative to the pose
/// the previous piece ended in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentDefinition {
    /// Drive straight; negative length drives backwards
    Straight { length_mm: f32 },
    /// Drive an arc changing the heading by `sweep_rad`
    Arc {
        radius_mm: f32,
        sweep_rad: f32,
        #[serde(default)]
        reverse: bool,
    },
    /// Rotate in place by `sweep_rad`
    TurnInPlace { sweep_rad: f32 },
}

impl SegmentDefinition {
    pub fn is_finite(&self) -> bool {
        match *self {
            SegmentDefinition::Straight { length_mm } => length_mm.is_finite(),
            SegmentDefinition::Arc { radius_mm, sweep_rad, .. } => {
                radius_mm.is_finite() && radius_mm > 0.0 && sweep_rad.is_finite()
            }
            SegmentDefinition::TurnInPlace { sweep_rad } => sweep_rad.is_finite(),
        }
    }

    /// A straight that does not move
    pub fn is_zero_length(&self) -> bool {
        matches!(*self, SegmentDefinition::Straight { length_mm } if length_mm.abs() <= POSITION_EPSILON_MM)
    }

    /// Place this piece at `pose`
    pub fn realize(&self, pose: ContinuousPose) -> PathSegment {
        let heading = pose.theta_rad;
        match *self {
            SegmentDefinition::Straight { length_mm } => PathSegment::Line {
                start_x_mm: pose.x_mm,
                start_y_mm: pose.y_mm,
                end_x_mm: pose.x_mm + length_mm * heading.cos(),
                end_y_mm: pose.y_mm + length_mm * heading.sin(),
                reverse: length_mm < 0.0,
            },
            SegmentDefinition::Arc {
                radius_mm,
                sweep_rad,
                reverse,
            } => {
                // center sits on the side the heading turns towards when driving forward
                let center_on_left = (sweep_rad > 0.0) != reverse;
                let side = if center_on_left { heading + FRAC_PI_2 } else { heading - FRAC_PI_2 };
                let center_x_mm = pose.x_mm + radius_mm * side.cos();
                let center_y_mm = pose.y_mm + radius_mm * side.sin();
                PathSegment::Arc {
                    center_x_mm,
                    center_y_mm,
                    radius_mm,
                    start_rad: normalize_angle(side + PI),
                    sweep_rad,
                    reverse,
                }
            }
            SegmentDefinition::TurnInPlace { sweep_rad } => PathSegment::PointTurn {
                x_mm: pose.x_mm,
                y_mm: pose.y_mm,
                start_angle_rad: heading,
                sweep_rad,
            },
        }
    }
}

/// Chain definitions starting at `start`
pub fn realize_segments(definitions: &[SegmentDefinition], start: ContinuousPose) -> Vec<PathSegment> {
    let mut pose = start;
    definitions
        .iter()
        .map(|definition| {
            let segment = definition.realize(pose);
            let end = segment.end_pose();
            pose = match definition {
                // straights keep the heading, even when they have no length
                SegmentDefinition::Straight { .. } => ContinuousPose::new(end.x_mm, end.y_mm, pose.theta_rad),
                _ => end,
            };
            segment
        })
        .collect()
}

/// Recover lines and point turns from a densely sampled curve
///
/// Collinear lines and consecutive point turns are merged.
pub fn segments_from_samples(samples: &[ContinuousPose]) -> Vec<PathSegment> {
    samples
        .iter()
        .tuple_windows()
        .filter_map(|(a, b)| {
            let delta = b.position() - a.position();
            if delta.norm() > POSITION_EPSILON_MM {
                let facing = Vector2::new(a.theta_rad.cos(), a.theta_rad.sin());
                Some(PathSegment::Line {
                    start_x_mm: a.x_mm,
                    start_y_mm: a.y_mm,
                    end_x_mm: b.x_mm,
                    end_y_mm: b.y_mm,
                    reverse: delta.dot(&facing) < 0.0,
                })
            } else {
                let sweep = normalize_angle(b.theta_rad - a.theta_rad);
                if sweep.abs() > ANGLE_EPSILON_RAD {
                    Some(PathSegment::PointTurn {
                        x_mm: a.x_mm,
                        y_mm: a.y_mm,
                        start_angle_rad: a.theta_rad,
                        sweep_rad: sweep,
                    })
                } else {
                    None
                }
            }
        })
        .coalesce(merge_segments)
        .collect()
}

fn merge_segments(first: PathSegment, second: PathSegment) -> Result<PathSegment, (PathSegment, PathSegment)> {
    match (first, second) {
        (
            PathSegment::Line {
                start_x_mm,
                start_y_mm,
                end_x_mm,
                end_y_mm,
                reverse,
            },
            PathSegment::Line {
                end_x_mm: next_end_x_mm,
                end_y_mm: next_end_y_mm,
                reverse: next_reverse,
                ..
            },
        ) if reverse == next_reverse => {
            let d1 = Vector2::new(end_x_mm - start_x_mm, end_y_mm - start_y_mm);
            let d2 = Vector2::new(next_end_x_mm - end_x_mm, next_end_y_mm - end_y_mm);
            let cross = d1.x * d2.y - d1.y * d2.x;
            if d1.dot(&d2) > 0.0 && cross.abs() <= POSITION_EPSILON_MM * (d1.norm() + d2.norm()) {
                Ok(PathSegment::Line {
                    start_x_mm,
                    start_y_mm,
                    end_x_mm: next_end_x_mm,
                    end_y_mm: next_end_y_mm,
                    reverse,
                })
            } else {
                Err((first, second))
            }
        }
        (
            PathSegment::PointTurn {
                x_mm,
                y_mm,
                start_angle_rad,
                sweep_rad,
            },
            PathSegment::PointTurn {
                sweep_rad: next_sweep_rad,
                ..
            },
        ) => Ok(PathSegment::PointTurn {
            x_mm,
            y_mm,
            start_angle_rad,
            sweep_rad: sweep_rad + next_sweep_rad,
        }),
        _ => Err((first, second)),
    }
}
