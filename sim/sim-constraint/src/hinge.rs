//! Hinge joint: shared anchor, one free rotation axis, optional stops and motor.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_types::{JointKind, JointParam, Result};

use crate::joint::{plane_space, reference_rotation, twist_angle, unit_axis, Anchors, Constraint};
use crate::limits::{LimitMotor, Motion};
use crate::row::{BodyPair, RowBlock, RowInfo, StepContext};

/// Hinge between two bodies, or between a body and the static world.
///
/// Rows: three for the anchor, two holding the axes aligned, and one more
/// when the angle is at a stop or the motor is powered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeJoint {
    anchors: Anchors,
    /// Axis in the first body's frame.
    axis1: Vector3<f64>,
    /// Axis in the second body's frame, or world frame.
    axis2: Vector3<f64>,
    /// Relative orientation at which the angle reads zero.
    rel0: UnitQuaternion<f64>,
    limot: LimitMotor,
}

impl Default for HingeJoint {
    fn default() -> Self {
        Self {
            anchors: Anchors::default(),
            axis1: Vector3::z(),
            axis2: Vector3::z(),
            rel0: UnitQuaternion::identity(),
            limot: LimitMotor::default(),
        }
    }
}

impl HingeJoint {
    /// Rotation of the first body relative to the second about the axis.
    #[must_use]
    pub fn angle(&self, bodies: &BodyPair<'_>) -> f64 {
        twist_angle(bodies, &self.rel0, &self.axis1)
    }

    /// Time derivative of [`HingeJoint::angle`].
    #[must_use]
    pub fn angle_rate(&self, bodies: &BodyPair<'_>) -> f64 {
        bodies
            .first
            .vector_to_world(&self.axis1)
            .dot(&bodies.relative_angular_velocity())
    }

    /// Stop and motor parameters.
    #[must_use]
    pub fn limit_motor(&self) -> &LimitMotor {
        &self.limot
    }
}

impl Constraint for HingeJoint {
    fn kind(&self) -> JointKind {
        JointKind::Hinge
    }

    fn row_info(&self, bodies: &BodyPair<'_>) -> RowInfo {
        let state = self.limot.stop_state(self.angle(bodies));
        RowInfo::new(5, usize::from(self.limot.needs_row(state)))
    }

    fn fill_rows(&self, ctx: &StepContext, bodies: &BodyPair<'_>, block: &mut RowBlock<'_>) {
        self.anchors.fill_rows(ctx, bodies, block, 0);

        // Angular velocity perpendicular to the axis must match on both bodies.
        let ax1 = bodies.first.vector_to_world(&self.axis1);
        let (p, q) = plane_space(&ax1);
        block.set_angular(3, p);
        block.set_angular(4, q);

        // Rotate the axes back together about ax1 × ax2 (small-angle).
        let ax2 = match bodies.second {
            Some(b2) => b2.vector_to_world(&self.axis2),
            None => self.axis2,
        };
        let b = ax1.cross(&ax2);
        let gain = ctx.gain();
        block.set_rhs(3, gain * b.dot(&p));
        block.set_rhs(4, gain * b.dot(&q));

        let state = self.limot.stop_state(self.angle(bodies));
        self.limot
            .fill_row(state, Motion::Angular, &ax1, ctx, bodies, block, 5);
    }

    fn set_anchor(&mut self, bodies: &BodyPair<'_>, anchor: &Point3<f64>) -> Result<()> {
        self.anchors.set(bodies, anchor)
    }

    fn anchor(&self, bodies: &BodyPair<'_>) -> Result<Point3<f64>> {
        Ok(self.anchors.world_first(bodies))
    }

    fn anchor2(&self, bodies: &BodyPair<'_>) -> Result<Point3<f64>> {
        Ok(self.anchors.world_second(bodies))
    }

    fn set_axis(&mut self, bodies: &BodyPair<'_>, axis: &Vector3<f64>) -> Result<()> {
        let axis = unit_axis(axis)?;
        self.axis1 = bodies.first.vector_to_local(&axis);
        self.axis2 = match bodies.second {
            Some(b2) => b2.vector_to_local(&axis),
            None => axis,
        };
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
