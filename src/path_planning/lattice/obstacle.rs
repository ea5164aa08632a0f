//! Obstacle store
//!
//! Obstacles are rotated rectangles in continuous space, independent of the
//! lattice resolution. Queries scan every obstacle; each entry keeps an
//! axis-aligned bounding box so most of them are rejected without any
//! rotation math.

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::common::{ContinuousPose, LatticeError, LatticeResult};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn from_points(points: &[Vector2<f32>]) -> Self {
        points.iter().fold(
            Aabb {
                min_x: f32::INFINITY,
                min_y: f32::INFINITY,
                max_x: f32::NEG_INFINITY,
                max_y: f32::NEG_INFINITY,
            },
            |b, p| Aabb {
                min_x: b.min_x.min(p.x),
                min_y: b.min_y.min(p.y),
                max_x: b.max_x.max(p.x),
                max_y: b.max_y.max(p.y),
            },
        )
    }

    pub fn inflated(&self, margin: f32) -> Self {
        Aabb {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Rectangle with arbitrary orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRectangle {
    pub center_x_mm: f32,
    pub center_y_mm: f32,
    /// Half extent along the rectangle's own x axis [mm]
    pub half_length_mm: f32,
    /// Half extent along the rectangle's own y axis [mm]
    pub half_width_mm: f32,
    /// Rotation of the rectangle's x axis from the world x axis [rad]
    pub rotation_rad: f32,
}

impl RotatedRectangle {
    pub fn new(center_x_mm: f32, center_y_mm: f32, length_mm: f32, width_mm: f32, rotation_rad: f32) -> Self {
        Self {
            center_x_mm,
            center_y_mm,
            half_length_mm: 0.5 * length_mm,
            half_width_mm: 0.5 * width_mm,
            rotation_rad,
        }
    }

    pub fn axis_aligned(min_x_mm: f32, min_y_mm: f32, max_x_mm: f32, max_y_mm: f32) -> Self {
        Self::new(
            0.5 * (min_x_mm + max_x_mm),
            0.5 * (min_y_mm + max_y_mm),
            max_x_mm - min_x_mm,
            max_y_mm - min_y_mm,
            0.0,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.center_x_mm.is_finite()
            && self.center_y_mm.is_finite()
            && self.rotation_rad.is_finite()
            && self.half_length_mm.is_finite()
            && self.half_width_mm.is_finite()
            && self.half_length_mm >= 0.0
            && self.half_width_mm >= 0.0
    }

    pub fn center(&self) -> Vector2<f32> {
        Vector2::new(self.center_x_mm, self.center_y_mm)
    }

    fn rotation(&self) -> Rotation2<f32> {
        Rotation2::new(self.rotation_rad)
    }

    /// World point expressed in the rectangle's frame
    fn to_local(&self, point: Vector2<f32>) -> Vector2<f32> {
        self.rotation().inverse() * (point - self.center())
    }

    /// Boundary counts as inside
    pub fn contains(&self, x_mm: f32, y_mm: f32) -> bool {
        let local = self.to_local(Vector2::new(x_mm, y_mm));
        local.x.abs() <= self.half_length_mm && local.y.abs() <= self.half_width_mm
    }

    /// Euclidean distance from a point to the rectangle; zero inside
    pub fn distance_to(&self, x_mm: f32, y_mm: f32) -> f32 {
        let local = self.to_local(Vector2::new(x_mm, y_mm));
        let dx = (local.x.abs() - self.half_length_mm).max(0.0);
        let dy = (local.y.abs() - self.half_width_mm).max(0.0);
        dx.hypot(dy)
    }

    /// Corners in counter-clockwise order
    pub fn corners(&self) -> [Vector2<f32>; 4] {
        let rotation = self.rotation();
        let center = self.center();
        let (hl, hw) = (self.half_length_mm, self.half_width_mm);
        [
            center + rotation * Vector2::new(hl, hw),
            center + rotation * Vector2::new(-hl, hw),
            center + rotation * Vector2::new(-hl, -hw),
            center + rotation * Vector2::new(hl, -hw),
        ]
    }

    fn axes(&self) -> [Vector2<f32>; 2] {
        let rotation = self.rotation();
        [rotation * Vector2::x(), rotation * Vector2::y()]
    }

    /// Separating axis test between two rectangles; touching counts
    pub fn intersects(&self, other: &RotatedRectangle) -> bool {
        let mine = self.corners();
        let theirs = other.corners();
        self.axes().iter().chain(other.axes().iter()).all(|axis| {
            let (min_a, max_a) = project(&mine, axis);
            let (min_b, max_b) = project(&theirs, axis);
            max_a >= min_b && max_b >= min_a
        })
    }

    pub fn bounding_box(&self) -> Aabb {
        Aabb::from_points(&self.corners())
    }
}

fn project(corners: &[Vector2<f32>; 4], axis: &Vector2<f32>) -> (f32, f32) {
    corners.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), c| {
        let d = c.dot(axis);
        (min.min(d), max.max(d))
    })
}

/// Shape of the robot used for collision checks
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Footprint {
    /// The pose itself; obstacles are assumed to be inflated already
    #[default]
    Point,
    /// Disc centered on the pose
    Circle { radius_mm: f32 },
    /// Rectangle aligned with the pose heading, its center
    /// `forward_offset_mm` ahead of the pose
    Rectangle {
        length_mm: f32,
        width_mm: f32,
        forward_offset_mm: f32,
    },
}

impl Footprint {
    pub fn is_valid(&self) -> bool {
        match *self {
            Footprint::Point => true,
            Footprint::Circle { radius_mm } => radius_mm.is_finite() && radius_mm >= 0.0,
            Footprint::Rectangle {
                length_mm,
                width_mm,
                forward_offset_mm,
            } => {
                length_mm.is_finite()
                    && width_mm.is_finite()
                    && forward_offset_mm.is_finite()
                    && length_mm >= 0.0
                    && width_mm >= 0.0
            }
        }
    }

    /// Radius around the pose that contains the whole footprint
    pub fn reach_mm(&self) -> f32 {
        match *self {
            Footprint::Point => 0.0,
            Footprint::Circle { radius_mm } => radius_mm,
            Footprint::Rectangle {
                length_mm,
                width_mm,
                forward_offset_mm,
            } => (forward_offset_mm.abs() + 0.5 * length_mm).hypot(0.5 * width_mm),
        }
    }

    /// Footprint rectangle placed at `pose`, if the footprint is a rectangle
    pub fn placed_rectangle(&self, pose: ContinuousPose) -> Option<RotatedRectangle> {
        match *self {
            Footprint::Rectangle {
                length_mm,
                width_mm,
                forward_offset_mm,
            } => Some(RotatedRectangle::new(
                pose.x_mm + forward_offset_mm * pose.theta_rad.cos(),
                pose.y_mm + forward_offset_mm * pose.theta_rad.sin(),
                length_mm,
                width_mm,
                pose.theta_rad,
            )),
            _ => None,
        }
    }

    pub fn collides_with(&self, pose: ContinuousPose, obstacle: &RotatedRectangle) -> bool {
        match *self {
            Footprint::Point => obstacle.contains(pose.x_mm, pose.y_mm),
            Footprint::Circle { radius_mm } => obstacle.distance_to(pose.x_mm, pose.y_mm) <= radius_mm,
            Footprint::Rectangle { .. } => self
                .placed_rectangle(pose)
                .map_or(false, |robot| robot.intersects(obstacle)),
        }
    }
}

#[derive(Debug, Clone)]
struct ObstacleEntry {
    rectangle: RotatedRectangle,
    bounds: Aabb,
}

/// Flat list of obstacles
#[derive(Debug, Clone, Default)]
pub struct ObstacleStore {
    entries: Vec<ObstacleEntry>,
}

impl ObstacleStore {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn from_rectangles(rectangles: impl IntoIterator<Item = RotatedRectangle>) -> LatticeResult<Self> {
        let mut store = Self::new();
        for rectangle in rectangles {
            store.push(rectangle)?;
        }
        Ok(store)
    }

    pub fn push(&mut self, rectangle: RotatedRectangle) -> LatticeResult<()> {
        if !rectangle.is_valid() {
            return Err(LatticeError::InvalidParameter(format!(
                "obstacle {:?} has negative or non-finite dimensions",
                rectangle
            )));
        }
        self.entries.push(ObstacleEntry {
            bounds: rectangle.bounding_box(),
            rectangle,
        });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RotatedRectangle> + '_ {
        self.entries.iter().map(|entry| &entry.rectangle)
    }

    pub fn to_rectangles(&self) -> Vec<RotatedRectangle> {
        self.iter().copied().collect()
    }

    /// True as soon as any obstacle touches the footprint placed at `pose`
    pub fn collides(&self, footprint: &Footprint, pose: ContinuousPose) -> bool {
        let reach = footprint.reach_mm();
        self.entries.iter().any(|entry| {
            entry.bounds.inflated(reach).contains(pose.x_mm, pose.y_mm)
                && footprint.collides_with(pose, &entry.rectangle)
        })
    }
}
