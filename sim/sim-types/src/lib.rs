//! Plain data shared by the constraint stepping engine.
//!
//! - [`BodyId`], [`JointId`], [`GroupId`] - generational handles
//! - [`MassProperties`] - mass descriptor accepted by bodies
//! - [`Contact`] - contact descriptor produced by collision detection
//! - [`JointKind`], [`JointParam`], [`JointFeedback`] - joint vocabulary
//! - [`WorldConfig`], [`SolverConfig`] - global parameters
//! - [`SimError`] - the error type of every fallible operation
//!
//! These types carry no physics. The constraint rows live in
//! `sim-constraint`, the world and step pipeline in `sim-core`.
//!
//! # Example
//!
//! ```
//! use sim_types::{MassProperties, WorldConfig};
//! use nalgebra::Vector3;
//!
//! let config = WorldConfig::default().with_gravity(Vector3::new(0.0, -9.8, 0.0));
//! assert!(config.validate().is_ok());
//!
//! let mass = MassProperties::sphere(2.0, 0.5);
//! assert!(mass.validate().is_ok());
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,         // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,       // Error docs added where non-obvious
)]

mod body;
mod config;
mod contact;
pub mod error;
mod joint;

pub use body::{BodyId, MassProperties};
pub use config::{SolverConfig, WorldConfig};
pub use contact::{Contact, ContactGeom, SurfaceParams};
pub use error::SimError;
pub use joint::{GroupId, JointFeedback, JointId, JointKind, JointParam};

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Most rows a single joint may contribute to one step.
pub const MAX_ROWS_PER_JOINT: usize = 6;
