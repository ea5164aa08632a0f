//! Common types used throughout xytheta_lattice

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into the global action type table
pub type ActionId = u8;

/// Marker for "no action"
pub const INVALID_ACTION_ID: ActionId = 255;

/// Discretized heading index
pub type DiscreteTheta = u8;

/// Pose in continuous space, millimeters and radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContinuousPose {
    pub x_mm: f32,
    pub y_mm: f32,
    pub theta_rad: f32,
}

impl ContinuousPose {
    pub fn new(x_mm: f32, y_mm: f32, theta_rad: f32) -> Self {
        Self { x_mm, y_mm, theta_rad }
    }

    pub fn origin() -> Self {
        Self { x_mm: 0.0, y_mm: 0.0, theta_rad: 0.0 }
    }

    pub fn position(&self) -> Vector2<f32> {
        Vector2::new(self.x_mm, self.y_mm)
    }

    pub fn distance(&self, other: &ContinuousPose) -> f32 {
        (self.position() - other.position()).norm()
    }

    /// Same pose shifted by `(dx, dy)`; heading untouched
    pub fn translated(&self, dx_mm: f32, dy_mm: f32) -> Self {
        Self {
            x_mm: self.x_mm + dx_mm,
            y_mm: self.y_mm + dy_mm,
            theta_rad: self.theta_rad,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x_mm.is_finite() && self.y_mm.is_finite() && self.theta_rad.is_finite()
    }
}

impl From<(f32, f32, f32)> for ContinuousPose {
    fn from(tuple: (f32, f32, f32)) -> Self {
        Self { x_mm: tuple.0, y_mm: tuple.1, theta_rad: tuple.2 }
    }
}

impl fmt::Display for ContinuousPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}mm, {:.2}mm, {:.3}rad)", self.x_mm, self.y_mm, self.theta_rad)
    }
}

/// Pose on the lattice: grid cells and a heading index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct DiscretePose {
    pub x: i16,
    pub y: i16,
    pub theta: DiscreteTheta,
}

impl DiscretePose {
    pub fn new(x: i16, y: i16, theta: DiscreteTheta) -> Self {
        Self { x, y, theta }
    }
}

impl fmt::Display for DiscretePose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.theta)
    }
}

/// Packed integer form of a [`DiscretePose`], used as a search key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u32);

impl StateId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_continuous_pose_distance() {
        let p1 = ContinuousPose::new(0.0, 0.0, 0.0);
        let p2 = ContinuousPose::new(3.0, 4.0, 1.0);
        assert_relative_eq!(p1.distance(&p2), 5.0);
    }

    #[test]
    fn test_translated_keeps_heading() {
        let p = ContinuousPose::new(1.0, 2.0, 0.5).translated(10.0, -2.0);
        assert_eq!(p, ContinuousPose::new(11.0, 0.0, 0.5));
    }

    #[test]
    fn test_discrete_pose_display() {
        assert_eq!(DiscretePose::new(-3, 4, 7).to_string(), "(-3, 4, 7)");
    }
}
