//! Rigid-body world and constraint stepping.
//!
//! This crate owns bodies, joints and constraint groups, and advances them
//! with a constraint-based step: every attached joint contributes Jacobian
//! rows (see [`sim_constraint`]), the rows are solved for constraint forces,
//! and bodies are integrated with semi-implicit Euler.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    World::step (stepper)                    │
//! │  frames → row counts → rows → solve → integrate → clear     │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           World                             │
//! │  bodies, persistent joints, groups, body/joint graph        │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Integrators                         │
//! │  quaternion update, rotation matrix resync                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use sim_core::World;
//! use sim_types::{JointKind, WorldConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let config = WorldConfig::default().with_gravity(Vector3::new(0.0, -9.8, 0.0));
//! let mut world = World::new(config).unwrap();
//!
//! // A pendulum hanging from a ball joint fixed to the environment.
//! let bob = world.create_body();
//! world.set_position(bob, Point3::new(1.0, 0.0, 0.0)).unwrap();
//! let pivot = world.create_joint(JointKind::Ball, None).unwrap();
//! world.attach(pivot, Some(bob), None).unwrap();
//! world.set_anchor(pivot, Point3::origin()).unwrap();
//!
//! for _ in 0..100 {
//!     world.step(0.01).unwrap();
//! }
//!
//! let r = world.body(bob).unwrap().position().coords.norm();
//! assert!((r - 1.0).abs() < 0.05);
//! ```
//!
//! # Constraint Groups
//!
//! Joints created in a group (typically contacts, rebuilt every step) are
//! released together:
//!
//! ```
//! use sim_core::World;
//! use sim_types::JointKind;
//!
//! let mut world = World::default();
//! let group = world.create_group(0);
//! let joint = world.create_joint(JointKind::Ball, Some(group)).unwrap();
//! world.empty_group(group).unwrap();
//! assert!(!world.contains_joint(joint));
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
)]

mod body;
pub mod integrators;
mod keys;
mod stepper;
mod world;

pub use body::{Body, Connection};
pub use stepper::StepReport;
pub use world::{World, ROTATION_TOLERANCE};

// Re-export the row and solver vocabulary for callers inspecting a step.
pub use sim_constraint::{JointFlags, SolverReport};

// Re-export common types from sim-types for convenience
pub use sim_types::{
    BodyId, Contact, ContactGeom, GroupId, JointFeedback, JointId, JointKind, JointParam,
    MassProperties, SimError, SolverConfig, SurfaceParams, WorldConfig,
};
