//! Slider joint: relative rotation locked, translation along one axis.

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{JointKind, JointParam, Result};

use crate::joint::{fill_fixed_orientation, plane_space, reference_rotation, unit_axis, Constraint};
use crate::limits::{LimitMotor, Motion};
use crate::row::{BodyPair, RowBlock, RowInfo, StepContext};

/// Prismatic joint.
///
/// Position is the displacement of the first body along the axis since the
/// axis was set. Rows: three locking relative rotation, two keeping the
/// first body on the axis line, one for stops or the motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderJoint {
    /// Axis in the first body's frame.
    axis1: Vector3<f64>,
    /// Relative orientation to hold.
    rel0: UnitQuaternion<f64>,
    /// First body origin in the second body's frame when the axis was set;
    /// world position without a second body.
    offset: Vector3<f64>,
    limot: LimitMotor,
}

impl Default for SliderJoint {
    fn default() -> Self {
        Self {
            axis1: Vector3::z(),
            rel0: UnitQuaternion::identity(),
            offset: Vector3::zeros(),
            limot: LimitMotor::default(),
        }
    }
}

impl SliderJoint {
    /// Displacement of the first body from where it sat when the axis was set.
    #[must_use]
    pub fn position(&self, bodies: &BodyPair<'_>) -> f64 {
        let ax1 = bodies.first.vector_to_world(&self.axis1);
        ax1.dot(&self.drift(bodies))
    }

    /// Time derivative of [`SliderJoint::position`].
    #[must_use]
    pub fn position_rate(&self, bodies: &BodyPair<'_>) -> f64 {
        bodies
            .first
            .vector_to_world(&self.axis1)
            .dot(&bodies.relative_linear_velocity())
    }

    /// Stop and motor parameters.
    #[must_use]
    pub fn limit_motor(&self) -> &LimitMotor {
        &self.limot
    }

    /// First body origin minus its reference point.
    fn drift(&self, bodies: &BodyPair<'_>) -> Vector3<f64> {
        let p1 = bodies.first.position.coords;
        match bodies.second {
            Some(b2) => p1 - b2.position.coords - b2.vector_to_world(&self.offset),
            None => p1 - self.offset,
        }
    }
}

impl Constraint for SliderJoint {
    fn kind(&self) -> JointKind {
        JointKind::Slider
    }

    fn row_info(&self, bodies: &BodyPair<'_>) -> RowInfo {
        let state = self.limot.stop_state(self.position(bodies));
        RowInfo::new(5, usize::from(self.limot.needs_row(state)))
    }

    fn fill_rows(&self, ctx: &StepContext, bodies: &BodyPair<'_>, block: &mut RowBlock<'_>) {
        fill_fixed_orientation(ctx, bodies, &self.rel0, block, 0);

        let ax1 = bodies.first.vector_to_world(&self.axis1);
        let (p, q) = plane_space(&ax1);
        let c = bodies
            .second
            .map_or_else(Vector3::zeros, |b2| b2.position - bodies.first.position);
        for (row, dir) in [(3, p), (4, q)] {
            let couple = 0.5 * c.cross(&dir);
            block.set_first(row, dir, couple);
            block.set_second(row, -dir, couple);
        }

        let err = -self.drift(bodies);
        let gain = ctx.gain();
        block.set_rhs(3, gain * p.dot(&err));
        block.set_rhs(4, gain * q.dot(&err));

        let state = self.limot.stop_state(self.position(bodies));
        self.limot
            .fill_row(state, Motion::Linear, &ax1, ctx, bodies, block, 5);
    }

    fn set_axis(&mut self, bodies: &BodyPair<'_>, axis: &Vector3<f64>) -> Result<()> {
        let axis = unit_axis(axis)?;
        self.axis1 = bodies.first.vector_to_local(&axis);
        self.rel0 = reference_rotation(bodies);
        self.offset = match bodies.second {
            Some(b2) => b2.point_to_local(&bodies.first.position),
            None => bodies.first.position.coords,
        };
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
