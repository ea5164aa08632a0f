//! Error types for xytheta_lattice

use thiserror::Error;

/// Main error type for the lattice environment
#[derive(Error, Debug)]
pub enum LatticeError {
    /// Discretization parameters are unusable (resolution, bit widths)
    #[error("Invalid discretization: {0}")]
    InvalidDiscretization(String),

    /// Heading table is empty, too large, or has duplicate headings
    #[error("Invalid heading table: {0}")]
    InvalidHeadingTable(String),

    /// Pose does not fit into the configured state id bit widths
    #[error("State ({x}, {y}, {theta}) does not fit into {theta_bits} theta bits and {xy_bits} xy bits")]
    StateOutOfRange {
        x: i16,
        y: i16,
        theta: u8,
        theta_bits: u8,
        xy_bits: u8,
    },

    /// Primitive definitions reference a heading the table does not have
    #[error("Unknown starting heading {theta} (have {num_angles} headings)")]
    UnknownHeading { theta: usize, num_angles: usize },

    /// A declared heading has no primitive list
    #[error("No motion primitives defined for heading {theta}")]
    MissingHeading { theta: u8 },

    /// Headings disagree on how many primitives they carry
    #[error("Heading {theta} has {found} primitives, expected {expected}")]
    PrimitiveCountMismatch {
        theta: u8,
        expected: usize,
        found: usize,
    },

    /// Primitive order does not match action ids
    #[error("Primitive {index} at heading {theta} has action id {action_id}, expected {index}")]
    ActionIdMismatch {
        theta: u8,
        index: usize,
        action_id: u8,
    },

    /// Primitive references an action id missing from the action table
    #[error("Primitive {index} at heading {theta} uses unknown action id {action_id}")]
    UnknownActionType {
        theta: u8,
        index: usize,
        action_id: u8,
    },

    /// Primitive with missing or unusable numeric data
    #[error("Degenerate primitive {index} at heading {theta}: {reason}")]
    DegeneratePrimitive {
        theta: u8,
        index: usize,
        reason: String,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A plan references an action that does not exist at the running heading
    #[error("Plan action {index} (action id {action_id}) has no primitive at heading {theta}")]
    InvalidPlanAction {
        index: usize,
        theta: u8,
        action_id: u8,
    },

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for lattice operations
pub type LatticeResult<T> = Result<T, LatticeError>;
