//! (x, y, theta) Lattice Environment
//!
//! This module implements the environment side of lattice based planning:
//! a discretized pose space, a library of motion primitives per heading,
//! rotated rectangle obstacles and lazy successor generation for a graph
//! search running on top of it.
//!
//! # Components
//!
//! - `discretization`: state id packing and continuous/lattice conversions
//! - `motion_primitive`, `primitive_library`: per heading primitive tables
//! - `path_segment`: lines, arcs and point turns a robot can drive
//! - `obstacle`: rotated rectangles and robot footprints
//! - `environment`: collision checks, obstacle management, `apply_action`
//! - `successor`: lazy forward and backward successor iteration
//! - `plan`: plan materialization and re-validation
//!
//! # Example
//!
//! ```no_run
//! use xytheta_lattice::common::DiscretePose;
//! use xytheta_lattice::path_planning::lattice::{Environment, Footprint, Plan, RotatedRectangle};
//!
//! let mut env = Environment::point_turn(10.0, 8, Footprint::Circle { radius_mm: 4.0 }).unwrap();
//! env.add_obstacle(RotatedRectangle::new(50.0, 0.0, 10.0, 40.0, 0.3)).unwrap();
//!
//! let start = env.discretization().state_to_state_id(DiscretePose::new(0, 0, 0)).unwrap();
//! for successor in env.get_successors(start, 0.0) {
//!     println!("action {} -> {} (g = {})", successor.action_id, successor.state_id, successor.g);
//! }
//!
//! let plan = Plan::with_actions(DiscretePose::new(0, 0, 0), vec![0, 0, 2]);
//! let path = env.to_executable_path(&plan).unwrap();
//! println!("{} segments", path.len());
//! ```

pub mod discretization;
pub mod environment;
pub mod motion_primitive;
pub mod obstacle;
pub mod path_segment;
pub mod plan;
pub mod primitive_library;
pub mod successor;

// Re-exports
pub use discretization::{
    normalize_angle, to_continuous, to_discrete, try_to_discrete, Discretization, DiscretizationConfig, HeadingTable,
    StateIdLayout,
};
pub use environment::{Environment, EnvironmentConfig, PathCheck};
pub use motion_primitive::{ActionType, MotionPrimitive, PrimitiveDefinition, RobotActionParams};
pub use obstacle::{Aabb, Footprint, ObstacleStore, RotatedRectangle};
pub use path_segment::{realize_segments, segments_from_samples, PathSegment, SegmentDefinition};
pub use plan::{ExecutablePath, Plan, PlanCheck, PlannedSegment};
pub use primitive_library::{LatticeDefinition, MotionPrimitiveLibrary};
pub use successor::{Successor, SuccessorIterator};
