//! Common types, traits, and error definitions for xytheta_lattice
//!
//! This module provides the foundational building blocks shared by the
//! lattice environment and its consumers.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
