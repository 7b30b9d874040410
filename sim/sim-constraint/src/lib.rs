//! Row-based joint constraints for rigid-body stepping.
//!
//! Every joint turns into a handful of scalar velocity constraints ("rows")
//! at each step. A joint first reports how many rows it needs, then fills
//! their Jacobian blocks, right-hand side and force bounds.
//!
//! # Joint Types
//!
//! - [`BallJoint`]: shared anchor point, free rotation
//! - [`HingeJoint`]: one rotation axis, optional stops and motor
//! - [`SliderJoint`]: one translation axis, optional stops and motor
//! - [`ContactJoint`]: non-penetration and Coulomb friction at a point
//! - [`AngularMotorJoint`]: drives or limits rotation about one axis
//! - [`Hinge2Joint`]: steering axis plus wheel axis
//!
//! All six are gathered in the closed union [`JointData`], which forwards the
//! [`Constraint`] trait with a `match`, and stored as [`JointRecord`]s.
//! Group joints live in a [`JointArena`] that is emptied in O(1).
//!
//! # Step Problem
//!
//! [`ConstraintSystem`] fills the rows of every active joint (in parallel
//! with the `parallel` feature) and assembles
//!
//! ```text
//! A = J M⁻¹ Jᵀ + cfm / h
//! b = c / h - J (v / h + M⁻¹ f_ext)
//! ```
//!
//! which [`LcpSolver`] solves for the constraint forces with bounds
//! `lo <= λ <= hi`.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{BodyFrame, BodyPair, Constraint, HingeJoint, RowInfo};
//! use sim_types::JointParam;
//! use nalgebra::{Point3, Vector3};
//!
//! let body = BodyFrame::at_rest(Point3::new(0.0, 0.0, 1.0));
//! let pair = BodyPair::new(&body, None);
//!
//! let mut hinge = HingeJoint::default();
//! hinge.set_anchor(&pair, &Point3::origin()).unwrap();
//! hinge.set_axis(&pair, &Vector3::y()).unwrap();
//! hinge.set_param(JointParam::Vel, 1.0).unwrap();
//! hinge.set_param(JointParam::FMax, 10.0).unwrap();
//!
//! // Anchor and axis rows, plus one for the motor.
//! assert_eq!(hinge.row_info(&pair), RowInfo::new(5, 1));
//! ```

#![doc(html_root_url = "https://docs.rs/sim-constraint/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod arena;
mod ball;
mod contact;
mod hinge;
mod hinge2;
mod joint;
mod limits;
mod motor;
#[cfg(feature = "parallel")]
mod parallel;
mod row;
mod slider;
mod solver;
mod system;

pub use arena::JointArena;
pub use ball::BallJoint;
pub use contact::ContactJoint;
pub use hinge::HingeJoint;
pub use hinge2::Hinge2Joint;
pub use joint::{
    fill_fixed_orientation, plane_space, reference_rotation, relative_rotation, twist_angle,
    unit_axis, Anchors, Constraint, JointData, JointFlags, JointHeader, JointRecord,
};
pub use limits::{LimitMotor, Motion, StopState};
pub use motor::AngularMotorJoint;
#[cfg(feature = "parallel")]
pub use parallel::MIN_JOINTS_FOR_PARALLEL;
pub use row::{BodyFrame, BodyPair, Effort, Row, RowBlock, RowInfo, StepContext};
pub use slider::SliderJoint;
pub use solver::{LcpProblem, LcpSolver, SolverReport};
pub use system::{ConstraintSystem, JointEntry, JointSpan, Wrench};
