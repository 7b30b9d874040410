//! Angular motor: drives or limits rotation about one axis without holding
//! the bodies together.
//!
//! Usually paired with a ball joint to give it a powered or limited degree
//! of freedom.

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{JointKind, JointParam, Result};

use crate::joint::{reference_rotation, twist_angle, unit_axis, Constraint};
use crate::limits::{LimitMotor, Motion};
use crate::row::{BodyPair, RowBlock, RowInfo, StepContext};

/// Single-axis angular motor with optional stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularMotorJoint {
    /// Axis in the first body's frame.
    axis1: Vector3<f64>,
    rel0: UnitQuaternion<f64>,
    limot: LimitMotor,
}

impl Default for AngularMotorJoint {
    fn default() -> Self {
        Self {
            axis1: Vector3::z(),
            rel0: UnitQuaternion::identity(),
            limot: LimitMotor::default(),
        }
    }
}

impl AngularMotorJoint {
    /// Rotation of the first body relative to the second about the axis,
    /// zero when the axis was set.
    #[must_use]
    pub fn angle(&self, bodies: &BodyPair<'_>) -> f64 {
        twist_angle(bodies, &self.rel0, &self.axis1)
    }

    /// Time derivative of [`AngularMotorJoint::angle`].
    #[must_use]
    pub fn angle_rate(&self, bodies: &BodyPair<'_>) -> f64 {
        bodies
            .first
            .vector_to_world(&self.axis1)
            .dot(&bodies.relative_angular_velocity())
    }
}

impl Constraint for AngularMotorJoint {
    fn kind(&self) -> JointKind {
        JointKind::AngularMotor
    }

    fn row_info(&self, bodies: &BodyPair<'_>) -> RowInfo {
        let state = self.limot.stop_state(self.angle(bodies));
        RowInfo::new(0, usize::from(self.limot.needs_row(state)))
    }

    fn fill_rows(&self, ctx: &StepContext, bodies: &BodyPair<'_>, block: &mut RowBlock<'_>) {
        let axis = bodies.first.vector_to_world(&self.axis1);
        let state = self.limot.stop_state(self.angle(bodies));
        self.limot
            .fill_row(state, Motion::Angular, &axis, ctx, bodies, block, 0);
    }

    fn set_axis(&mut self, bodies: &BodyPair<'_>, axis: &Vector3<f64>) -> Result<()> {
        let axis = unit_axis(axis)?;
        self.axis1 = bodies.first.vector_to_local(&axis);
        self.rel0 = reference_rotation(bodies);
        Ok(())
    }

    fn axis(&self, bodies: &BodyPair<'_>) -> Result<Vector3<f64>> {
        Ok(bodies.first.vector_to_world(&self.axis1))
    }

    fn set_param(&mut self, param: JointParam, value: f64) -> Result<()> {
        self.limot.set_param(param, value)
    }

    fn param(&self, param: JointParam) -> Result<f64> {
        self.limot.param(param)
    }
}
