//! Hinge-2 joint: two hinges in series, as in a steerable wheel.
//!
//! Axis 1 is fixed to the first body (the steering axis), axis 2 to the
//! second (the wheel axle). The anchor is shared and the angle between the
//! two axes is held at its value when the axes were set. Axis 1 carries
//! stops and a motor; axis 2 carries a motor only, addressed with
//! [`JointParam::Vel2`] and [`JointParam::FMax2`].

use nalgebra::{Point3, Vector3};
use sim_types::{JointKind, JointParam, Result, SimError};

use crate::joint::{plane_space, unit_axis, Anchors, Constraint};
use crate::limits::{LimitMotor, Motion, StopState};
use crate::row::{BodyFrame, BodyPair, RowBlock, RowInfo, StepContext};

/// Below this the two axes count as parallel.
const PARALLEL_EPS: f64 = 1e-9;

/// Two-axis hinge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hinge2Joint {
    anchors: Anchors,
    /// Axis 1 in the first body's frame.
    axis1: Vector3<f64>,
    /// Axis 2 in the second body's frame, or world frame.
    axis2: Vector3<f64>,
    /// Cosine and sine of the angle between the axes to hold.
    c0: f64,
    s0: f64,
    /// Reference directions perpendicular to axis 1, first body frame; the
    /// axis-1 angle is measured from `v1` toward `v2`.
    v1: Vector3<f64>,
    v2: Vector3<f64>,
    limot1: LimitMotor,
    limot2: LimitMotor,
}

impl Default for Hinge2Joint {
    fn default() -> Self {
        Self {
            anchors: Anchors::default(),
            axis1: Vector3::z(),
            axis2: Vector3::y(),
            c0: 0.0,
            s0: 1.0,
            v1: Vector3::y(),
            v2: -Vector3::x(),
            limot1: LimitMotor::default(),
            limot2: LimitMotor::default(),
        }
    }
}

fn axis2_world(axis2: &Vector3<f64>, second: Option<&BodyFrame>) -> Vector3<f64> {
    second.map_or(*axis2, |b2| b2.vector_to_world(axis2))
}

impl Hinge2Joint {
    fn world_axes(&self, bodies: &BodyPair<'_>) -> (Vector3<f64>, Vector3<f64>) {
        (
            bodies.first.vector_to_world(&self.axis1),
            axis2_world(&self.axis2, bodies.second),
        )
    }

    /// Recompute the held angle and the angle-1 reference directions from
    /// the current pose.
    fn capture_reference(&mut self, bodies: &BodyPair<'_>) -> Result<()> {
        let (ax1, ax2) = self.world_axes(bodies);
        let cross = ax1.cross(&ax2);
        let s0 = cross.norm();
        if s0 < PARALLEL_EPS {
            return Err(SimError::degenerate_axis("hinge-2 axes are parallel"));
        }
        let c0 = ax1.dot(&ax2);
        let ax2p = (ax2 - ax1 * c0) / s0;
        self.c0 = c0;
        self.s0 = s0;
        self.v1 = bodies.first.vector_to_local(&ax2p);
        self.v2 = bodies.first.vector_to_local(&ax1.cross(&ax2p));
        Ok(())
    }

    /// Set axis 2, world frame.
    pub fn set_axis2(&mut self, bodies: &BodyPair<'_>, axis: &Vector3<f64>) -> Result<()> {
        let axis = unit_axis(axis)?;
        let mut next = *self;
        next.axis2 = match bodies.second {
            Some(b2) => b2.vector_to_local(&axis),
            None => axis,
        };
        next.capture_reference(bodies)?;
        *self = next;
        Ok(())
    }

    /// Axis 2, world frame.
    #[must_use]
    pub fn axis2(&self, bodies: &BodyPair<'_>) -> Vector3<f64> {
        axis2_world(&self.axis2, bodies.second)
    }

    /// Rotation about axis 1 since the axes were set.
    #[must_use]
    pub fn angle1(&self, bodies: &BodyPair<'_>) -> f64 {
        let a2 = bodies.first.vector_to_local(&self.axis2(bodies));
        -(self.v2.dot(&a2)).atan2(self.v1.dot(&a2))
    }

    /// Time derivative of [`Hinge2Joint::angle1`].
    #[must_use]
    pub fn angle1_rate(&self, bodies: &BodyPair<'_>) -> f64 {
        let (ax1, _) = self.world_axes(bodies);
        ax1.dot(&bodies.relative_angular_velocity())
    }

    /// Relative angular velocity about axis 2.
    #[must_use]
    pub fn angle2_rate(&self, bodies: &BodyPair<'_>) -> f64 {
        let (_, ax2) = self.world_axes(bodies);
        ax2.dot(&bodies.relative_angular_velocity())
    }

    /// Axis-1 stops and motor.
    #[must_use]
    pub fn limit_motor1(&self) -> &LimitMotor {
        &self.limot1
    }

    /// Axis-2 motor.
    #[must_use]
    pub fn limit_motor2(&self) -> &LimitMotor {
        &self.limot2
    }
}

impl Constraint for Hinge2Joint {
    fn kind(&self) -> JointKind {
        JointKind::Hinge2
    }

    fn row_info(&self, bodies: &BodyPair<'_>) -> RowInfo {
        let state = self.limot1.stop_state(self.angle1(bodies));
        let bounded =
            usize::from(self.limot1.needs_row(state)) + usize::from(self.limot2.is_powered());
        RowInfo::new(4, bounded)
    }

    fn fill_rows(&self, ctx: &StepContext, bodies: &BodyPair<'_>, block: &mut RowBlock<'_>) {
        self.anchors.fill_rows(ctx, bodies, block, 0);

        let (ax1, ax2) = self.world_axes(bodies);
        let cross = ax1.cross(&ax2);
        let s = cross.norm();
        let c = ax1.dot(&ax2);
        let q = if s > PARALLEL_EPS {
            cross / s
        } else {
            plane_space(&ax1).0
        };
        block.set_angular(3, q);
        block.set_rhs(3, ctx.gain() * (self.c0 * s - self.s0 * c));

        let state = self.limot1.stop_state(self.angle1(bodies));
        let mut row = 4;
        row += self
            .limot1
            .fill_row(state, Motion::Angular, &ax1, ctx, bodies, block, row);
        self.limot2
            .fill_row(StopState::Free, Motion::Angular, &ax2, ctx, bodies, block, row);
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
        let mut next = *self;
        next.axis1 = bodies.first.vector_to_local(&axis);
        next.capture_reference(bodies)?;
        *self = next;
        Ok(())
    }

    fn axis(&self, bodies: &BodyPair<'_>) -> Result<Vector3<f64>> {
        Ok(bodies.first.vector_to_world(&self.axis1))
    }

    fn set_param(&mut self, param: JointParam, value: f64) -> Result<()> {
        match param {
            JointParam::Vel2 => self.limot2.set_param(JointParam::Vel, value),
            JointParam::FMax2 => self.limot2.set_param(JointParam::FMax, value),
            other => self.limot1.set_param(other, value),
        }
    }

    fn param(&self, param: JointParam) -> Result<f64> {
        match param {
            JointParam::Vel2 => self.limot2.param(JointParam::Vel),
            JointParam::FMax2 => self.limot2.param(JointParam::FMax),
            other => self.limot1.param(other),
        }
    }
}
