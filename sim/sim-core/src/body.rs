//! Rigid bodies and their connection lists.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use sim_constraint::{BodyFrame, Wrench};
use sim_types::{BodyId, JointId, MassProperties, Result, SimError};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::integrators::{integrate_rotation, rotation_matrix};

/// One incident joint, stored in the list of the body it does not point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Connection {
    /// The joint.
    pub joint: JointId,
    /// The body at the other end, `None` for the static world.
    pub other: Option<BodyId>,
}

/// A rigid body in the simulation world.
///
/// The body origin is its centre of mass. Orientation is kept both as a
/// quaternion and as a rotation matrix; every mutation updates both.
#[derive(Debug, Clone)]
pub struct Body {
    id: BodyId,
    position: Point3<f64>,
    quaternion: UnitQuaternion<f64>,
    rotation: Matrix3<f64>,
    linear_velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    mass: MassProperties,
    inv_mass: f64,
    /// Inverse inertia, body frame.
    inv_inertia: Matrix3<f64>,
    /// Accumulated external force, world frame (cleared each step).
    force: Vector3<f64>,
    /// Accumulated external torque, world frame (cleared each step).
    torque: Vector3<f64>,
    user_data: u64,
    pub(crate) connections: SmallVec<[Connection; 4]>,
}

impl Body {
    /// A unit-mass body at the origin, at rest.
    #[must_use]
    pub(crate) fn new(id: BodyId) -> Self {
        Self {
            id,
            position: Point3::origin(),
            quaternion: UnitQuaternion::identity(),
            rotation: Matrix3::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            mass: MassProperties::default(),
            inv_mass: 1.0,
            inv_inertia: Matrix3::identity(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            user_data: 0,
            connections: SmallVec::new(),
        }
    }

    /// Handle of this body.
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Position of the centre of mass.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.position
    }

    /// Orientation as a quaternion.
    #[must_use]
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Orientation as a rotation matrix.
    #[must_use]
    pub fn rotation(&self) -> Matrix3<f64> {
        self.rotation
    }

    /// Linear velocity, world frame.
    #[must_use]
    pub fn linear_velocity(&self) -> Vector3<f64> {
        self.linear_velocity
    }

    /// Angular velocity, world frame.
    #[must_use]
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.angular_velocity
    }

    /// Mass descriptor.
    #[must_use]
    pub fn mass(&self) -> &MassProperties {
        &self.mass
    }

    /// Accumulated force for the coming step.
    #[must_use]
    pub fn force(&self) -> Vector3<f64> {
        self.force
    }

    /// Accumulated torque for the coming step.
    #[must_use]
    pub fn torque(&self) -> Vector3<f64> {
        self.torque
    }

    /// Opaque client value.
    #[must_use]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    /// Incident joints, possibly including stale entries from emptied
    /// groups until the next step.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Body-frame point to world frame.
    #[must_use]
    pub fn point_to_world(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Body-frame vector to world frame.
    #[must_use]
    pub fn vector_to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// World point to body frame.
    #[must_use]
    pub fn point_to_local(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.transpose() * (world - self.position))
    }

    /// Velocity of a world point moving with the body.
    #[must_use]
    pub fn point_velocity(&self, world: &Point3<f64>) -> Vector3<f64> {
        self.linear_velocity + self.angular_velocity.cross(&(world - self.position))
    }

    /// Inertia tensor in the world frame.
    #[must_use]
    pub fn world_inertia(&self) -> Matrix3<f64> {
        self.rotation * self.mass.inertia * self.rotation.transpose()
    }

    pub(crate) fn set_position(&mut self, position: Point3<f64>) {
        self.position = position;
    }

    pub(crate) fn set_quaternion(&mut self, q: UnitQuaternion<f64>) {
        self.quaternion = q;
        self.rotation = rotation_matrix(&q);
    }

    pub(crate) fn set_linear_velocity(&mut self, v: Vector3<f64>) {
        self.linear_velocity = v;
    }

    pub(crate) fn set_angular_velocity(&mut self, w: Vector3<f64>) {
        self.angular_velocity = w;
    }

    pub(crate) fn set_user_data(&mut self, data: u64) {
        self.user_data = data;
    }

    /// Replace the mass descriptor; the centre of mass must be the origin.
    pub(crate) fn set_mass(&mut self, mass: MassProperties) -> Result<()> {
        mass.validate()?;
        if mass.center_of_mass.norm() > 1e-12 {
            return Err(SimError::invalid_mass(
                "centre of mass must coincide with the body origin",
            ));
        }
        let inv_inertia = mass
            .inverse_inertia()
            .ok_or_else(|| SimError::invalid_mass("inertia tensor is singular"))?;
        self.mass = mass;
        self.inv_mass = mass.inverse_mass();
        self.inv_inertia = inv_inertia;
        Ok(())
    }

    pub(crate) fn add_force(&mut self, force: Vector3<f64>) {
        self.force += force;
    }

    pub(crate) fn add_torque(&mut self, torque: Vector3<f64>) {
        self.torque += torque;
    }

    /// Force applied at a world point: also adds `r × F`.
    pub(crate) fn add_force_at(&mut self, force: Vector3<f64>, point: &Point3<f64>) {
        self.force += force;
        self.torque += (point - self.position).cross(&force);
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
    }

    /// Read-only snapshot for row filling.
    #[must_use]
    pub(crate) fn frame(&self) -> BodyFrame {
        BodyFrame {
            position: self.position,
            quaternion: self.quaternion,
            rotation: self.rotation,
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
            inv_mass: self.inv_mass,
            inv_inertia: self.rotation * self.inv_inertia * self.rotation.transpose(),
        }
    }

    /// External wrench for this step: accumulators, gravity and, when
    /// enabled, the gyroscopic torque `-ω × (I ω)`.
    pub(crate) fn external_wrench(&self, gravity: &Vector3<f64>, gyroscopic: bool) -> Wrench {
        let mut torque = self.torque;
        if gyroscopic {
            let w = self.angular_velocity;
            torque -= w.cross(&(self.world_inertia() * w));
        }
        Wrench {
            force: self.force + gravity * self.mass.mass,
            torque,
        }
    }

    /// Semi-implicit Euler: velocities from the total wrench, then the pose
    /// from the new velocities.
    pub(crate) fn integrate(&mut self, total: &Wrench, h: f64) {
        let inv_inertia_world = self.rotation * self.inv_inertia * self.rotation.transpose();
        self.linear_velocity += total.force * (self.inv_mass * h);
        self.angular_velocity += inv_inertia_world * total.torque * h;

        self.position += self.linear_velocity * h;
        let q = integrate_rotation(&self.quaternion, &self.angular_velocity, h);
        self.set_quaternion(q);
    }

    /// Whether position, orientation and velocities are all finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|x| x.is_finite())
            && self.quaternion.coords.iter().all(|x| x.is_finite())
            && self.linear_velocity.iter().all(|x| x.is_finite())
            && self.angular_velocity.iter().all(|x| x.is_finite())
    }

    /// Drop incident nodes of `joint`.
    pub(crate) fn remove_connections(&mut self, joint: JointId) {
        self.connections.retain(|c| c.joint != joint);
    }
}
