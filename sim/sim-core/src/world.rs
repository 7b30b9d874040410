//! Simulation world: bodies, joints, groups and the body/joint graph.
//!
//! The [`World`] owns every body, persistent joint and constraint group.
//! All handles are generational, so a handle that outlived its object is
//! rejected with an `Invalid*Id` error instead of aliasing a new occupant.
//!
//! Joints attach to one or two bodies. Each attached body keeps a
//! [`Connection`] in its list pointing at the joint and at the body on the
//! other side, so graph queries walk a single list.

use hashbrown::HashMap;
use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use sim_constraint::{BodyFrame, BodyPair, JointArena, JointData, JointRecord, LcpSolver};
use sim_types::error::ensure_finite_vector;
use sim_types::{
    BodyId, Contact, GroupId, JointFeedback, JointId, JointKind, JointParam, MassProperties,
    Result, SimError, WorldConfig,
};
use tracing::debug;

use crate::body::{Body, Connection};
use crate::keys::{BodyKey, GroupKey, Handle, JointKey, SlotMap};
use crate::stepper::StepReport;

/// Largest entry of `RᵀR - I` accepted by [`World::set_rotation`].
pub const ROTATION_TOLERANCE: f64 = 1e-6;

/// Container for all simulation state.
#[derive(Debug, Clone)]
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) solver: LcpSolver,
    pub(crate) time: f64,
    pub(crate) step_count: u64,
    pub(crate) last_step: Option<StepReport>,
    pub(crate) last_step_size: Option<f64>,
    pub(crate) bodies: SlotMap<BodyKey, Body>,
    pub(crate) joints: SlotMap<JointKey, JointRecord>,
    pub(crate) groups: SlotMap<GroupKey, JointArena>,
    /// Constraint forces of the last step, per active joint.
    pub(crate) feedback: HashMap<JointId, JointFeedback>,
}

impl Default for World {
    fn default() -> Self {
        Self::with_valid_config(WorldConfig::default())
    }
}

/// Resolve a joint handle against persistent storage or its group arena.
pub(crate) fn lookup<'a>(
    joints: &'a SlotMap<JointKey, JointRecord>,
    groups: &'a SlotMap<GroupKey, JointArena>,
    id: JointId,
) -> Option<&'a JointRecord> {
    match id.group() {
        Some(group) => groups
            .get(group.key())
            .and_then(|arena| arena.get(id.index(), id.generation())),
        None => joints.get(id.key()),
    }
}

impl World {
    /// Create an empty world.
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: WorldConfig) -> Self {
        Self {
            solver: LcpSolver::new(config.solver),
            config,
            time: 0.0,
            step_count: 0,
            last_step: None,
            last_step_size: None,
            bodies: SlotMap::with_key(),
            joints: SlotMap::with_key(),
            groups: SlotMap::with_key(),
            feedback: HashMap::new(),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Replace the configuration after validating it.
    pub fn set_config(&mut self, config: WorldConfig) -> Result<()> {
        config.validate()?;
        self.solver = LcpSolver::new(config.solver);
        self.config = config;
        Ok(())
    }

    fn update_config(&mut self, f: impl FnOnce(&mut WorldConfig)) -> Result<()> {
        let mut config = self.config.clone();
        f(&mut config);
        self.set_config(config)
    }

    /// Set the gravity vector.
    pub fn set_gravity(&mut self, gravity: Vector3<f64>) -> Result<()> {
        self.update_config(|c| c.gravity = gravity)
    }

    /// Gravity vector.
    #[must_use]
    pub fn gravity(&self) -> Vector3<f64> {
        self.config.gravity
    }

    /// Set the global error-reduction parameter, in `[0, 1]`.
    pub fn set_erp(&mut self, erp: f64) -> Result<()> {
        self.update_config(|c| c.erp = erp)
    }

    /// Set the global constraint force mixing, `>= 0`.
    pub fn set_cfm(&mut self, cfm: f64) -> Result<()> {
        self.update_config(|c| c.cfm = cfm)
    }

    /// Simulated time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Size of the last completed step.
    #[must_use]
    pub fn last_step_size(&self) -> Option<f64> {
        self.last_step_size
    }

    /// Report of the last completed step.
    #[must_use]
    pub fn last_step(&self) -> Option<&StepReport> {
        self.last_step.as_ref()
    }

    // ==================== Bodies ====================

    /// Create a unit-mass body at the origin, at rest.
    pub fn create_body(&mut self) -> BodyId {
        let key = self
            .bodies
            .insert_with_key(|key| Body::new(BodyId::from_key(key)));
        BodyId::from_key(key)
    }

    /// Destroy a body. Every joint attached to it is detached first and
    /// stays alive, inert, until attached again.
    pub fn destroy_body(&mut self, id: BodyId) -> Result<()> {
        let connections = self.body(id)?.connections.clone();
        for connection in connections {
            let joint = connection.joint;
            let Some(record) = self.record_mut_opt(joint) else {
                continue;
            };
            record.clear_bodies();
            if let Some(other) = connection.other {
                if let Some(body) = self.bodies.get_mut(other.key()) {
                    body.remove_connections(joint);
                }
            }
            debug!(%joint, body = %id, "detached joint from destroyed body");
        }
        self.bodies.remove(id.key());
        Ok(())
    }

    /// Look up a body.
    pub fn body(&self, id: BodyId) -> Result<&Body> {
        self.bodies
            .get(id.key())
            .ok_or(SimError::InvalidBodyId(id.raw()))
    }

    fn body_mut(&mut self, id: BodyId) -> Result<&mut Body> {
        self.bodies
            .get_mut(id.key())
            .ok_or(SimError::InvalidBodyId(id.raw()))
    }

    /// Whether `id` refers to a live body.
    #[must_use]
    pub fn contains_body(&self, id: BodyId) -> bool {
        self.bodies.contains_key(id.key())
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Iterate over live bodies.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    /// Set the position of the body's centre of mass.
    pub fn set_position(&mut self, id: BodyId, position: Point3<f64>) -> Result<()> {
        ensure_finite_vector(&position.coords, "position")?;
        self.body_mut(id)?.set_position(position);
        Ok(())
    }

    /// Set the orientation from a rotation matrix. The quaternion is derived
    /// from it and the stored matrix re-derived from the quaternion.
    ///
    /// The matrix must be orthonormal with determinant +1 to within
    /// [`ROTATION_TOLERANCE`]; anything else is refused rather than projected.
    pub fn set_rotation(&mut self, id: BodyId, rotation: Matrix3<f64>) -> Result<()> {
        if !rotation.iter().all(|x| x.is_finite()) {
            return Err(SimError::NonFinite { what: "rotation" });
        }
        let drift = (rotation.transpose() * rotation - Matrix3::identity()).amax();
        if drift > ROTATION_TOLERANCE {
            return Err(SimError::invalid_rotation(format!(
                "matrix is not orthonormal (|RᵀR - I| = {drift:e})"
            )));
        }
        if rotation.determinant() < 0.0 {
            return Err(SimError::invalid_rotation("matrix is a reflection"));
        }
        let q = UnitQuaternion::from_matrix(&rotation);
        self.body_mut(id)?.set_quaternion(q);
        Ok(())
    }

    /// Set the orientation from a unit quaternion.
    pub fn set_quaternion(&mut self, id: BodyId, q: UnitQuaternion<f64>) -> Result<()> {
        if !q.coords.iter().all(|x| x.is_finite()) {
            return Err(SimError::NonFinite { what: "quaternion" });
        }
        self.body_mut(id)?.set_quaternion(q);
        Ok(())
    }

    /// Set the linear velocity, world frame.
    pub fn set_linear_velocity(&mut self, id: BodyId, v: Vector3<f64>) -> Result<()> {
        ensure_finite_vector(&v, "linear velocity")?;
        self.body_mut(id)?.set_linear_velocity(v);
        Ok(())
    }

    /// Set the angular velocity, world frame.
    pub fn set_angular_velocity(&mut self, id: BodyId, w: Vector3<f64>) -> Result<()> {
        ensure_finite_vector(&w, "angular velocity")?;
        self.body_mut(id)?.set_angular_velocity(w);
        Ok(())
    }

    /// Replace the mass descriptor. The centre of mass must be the origin.
    pub fn set_mass(&mut self, id: BodyId, mass: MassProperties) -> Result<()> {
        self.body_mut(id)?.set_mass(mass)
    }

    /// Mass descriptor.
    pub fn mass(&self, id: BodyId) -> Result<MassProperties> {
        Ok(*self.body(id)?.mass())
    }

    /// Store an opaque client value on the body.
    pub fn set_user_data(&mut self, id: BodyId, data: u64) -> Result<()> {
        self.body_mut(id)?.set_user_data(data);
        Ok(())
    }

    /// Opaque client value.
    pub fn user_data(&self, id: BodyId) -> Result<u64> {
        Ok(self.body(id)?.user_data())
    }

    // ==================== Forces ====================

    /// Add a world-frame force through the centre of mass.
    pub fn add_force(&mut self, id: BodyId, force: Vector3<f64>) -> Result<()> {
        ensure_finite_vector(&force, "force")?;
        self.body_mut(id)?.add_force(force);
        Ok(())
    }

    /// Add a world-frame torque.
    pub fn add_torque(&mut self, id: BodyId, torque: Vector3<f64>) -> Result<()> {
        ensure_finite_vector(&torque, "torque")?;
        self.body_mut(id)?.add_torque(torque);
        Ok(())
    }

    /// Add a body-frame force through the centre of mass.
    pub fn add_relative_force(&mut self, id: BodyId, force: Vector3<f64>) -> Result<()> {
        ensure_finite_vector(&force, "force")?;
        let body = self.body_mut(id)?;
        let world = body.vector_to_world(&force);
        body.add_force(world);
        Ok(())
    }

    /// Add a body-frame torque.
    pub fn add_relative_torque(&mut self, id: BodyId, torque: Vector3<f64>) -> Result<()> {
        ensure_finite_vector(&torque, "torque")?;
        let body = self.body_mut(id)?;
        let world = body.vector_to_world(&torque);
        body.add_torque(world);
        Ok(())
    }

    /// Add a world-frame force at a world point.
    pub fn add_force_at_position(
        &mut self,
        id: BodyId,
        force: Vector3<f64>,
        point: Point3<f64>,
    ) -> Result<()> {
        ensure_finite_vector(&force, "force")?;
        ensure_finite_vector(&point.coords, "point")?;
        self.body_mut(id)?.add_force_at(force, &point);
        Ok(())
    }

    /// Add a world-frame force at a body-frame point.
    pub fn add_force_at_relative_position(
        &mut self,
        id: BodyId,
        force: Vector3<f64>,
        point: Point3<f64>,
    ) -> Result<()> {
        ensure_finite_vector(&force, "force")?;
        ensure_finite_vector(&point.coords, "point")?;
        let body = self.body_mut(id)?;
        let world = body.point_to_world(&point);
        body.add_force_at(force, &world);
        Ok(())
    }

    /// Add a body-frame force at a body-frame point.
    pub fn add_relative_force_at_relative_position(
        &mut self,
        id: BodyId,
        force: Vector3<f64>,
        point: Point3<f64>,
    ) -> Result<()> {
        ensure_finite_vector(&force, "force")?;
        ensure_finite_vector(&point.coords, "point")?;
        let body = self.body_mut(id)?;
        let world_force = body.vector_to_world(&force);
        let world_point = body.point_to_world(&point);
        body.add_force_at(world_force, &world_point);
        Ok(())
    }

    /// World position of a body-frame point.
    pub fn point_position(&self, id: BodyId, local: Point3<f64>) -> Result<Point3<f64>> {
        Ok(self.body(id)?.point_to_world(&local))
    }

    /// Velocity of a world point moving with the body.
    pub fn point_velocity(&self, id: BodyId, point: Point3<f64>) -> Result<Vector3<f64>> {
        Ok(self.body(id)?.point_velocity(&point))
    }

    /// Velocity of a body-frame point, world frame.
    pub fn relative_point_velocity(&self, id: BodyId, local: Point3<f64>) -> Result<Vector3<f64>> {
        let body = self.body(id)?;
        Ok(body.point_velocity(&body.point_to_world(&local)))
    }

    // ==================== Joints ====================

    /// Create a detached joint of `kind`, persistent or in `group`.
    ///
    /// Contacts need a descriptor; use [`World::create_contact`].
    pub fn create_joint(&mut self, kind: JointKind, group: Option<GroupId>) -> Result<JointId> {
        let data = JointData::new(kind)?;
        self.insert_joint(data, group)
    }

    /// Create a detached contact joint from a collision descriptor.
    pub fn create_contact(&mut self, contact: Contact, group: Option<GroupId>) -> Result<JointId> {
        let data = JointData::contact(contact)?;
        self.insert_joint(data, group)
    }

    fn insert_joint(&mut self, data: JointData, group: Option<GroupId>) -> Result<JointId> {
        let record = JointRecord::new(data, group.is_some());
        match group {
            Some(group) => {
                let arena = self
                    .groups
                    .get_mut(group.key())
                    .ok_or(SimError::InvalidGroupId(group.raw()))?;
                let index = arena.alloc(record)?;
                Ok(JointId::grouped(group, index, arena.epoch()))
            }
            None => {
                Ok(JointId::from_key(self.joints.insert(record)))
            }
        }
    }

    /// Destroy a persistent joint. Group joints go away with their group.
    pub fn destroy_joint(&mut self, id: JointId) -> Result<()> {
        self.record(id)?;
        if id.in_group() {
            return Err(SimError::JointInGroup(id.raw()));
        }
        self.unlink(id);
        self.joints.remove(id.key());
        self.feedback.remove(&id);
        Ok(())
    }

    pub(crate) fn record(&self, id: JointId) -> Result<&JointRecord> {
        lookup(&self.joints, &self.groups, id).ok_or(SimError::InvalidJointId(id.raw()))
    }

    fn record_mut_opt(&mut self, id: JointId) -> Option<&mut JointRecord> {
        match id.group() {
            Some(group) => self
                .groups
                .get_mut(group.key())
                .and_then(|arena| arena.get_mut(id.index(), id.generation())),
            None => self.joints.get_mut(id.key()),
        }
    }

    fn record_mut(&mut self, id: JointId) -> Result<&mut JointRecord> {
        self.record_mut_opt(id)
            .ok_or(SimError::InvalidJointId(id.raw()))
    }

    /// Whether `id` refers to a live joint.
    #[must_use]
    pub fn contains_joint(&self, id: JointId) -> bool {
        lookup(&self.joints, &self.groups, id).is_some()
    }

    /// Remove the joint's nodes from the lists of its current bodies.
    fn unlink(&mut self, id: JointId) {
        let Ok(record) = self.record(id) else {
            return;
        };
        let (first, second) = record.bodies();
        for body in [first, second].into_iter().flatten() {
            if let Some(body) = self.bodies.get_mut(body.key()) {
                body.remove_connections(id);
            }
        }
    }

    /// Attach a joint to one or two bodies, replacing any previous
    /// attachment. `None` stands for the static environment.
    ///
    /// `(None, b)` and `(b, None)` behave identically.
    pub fn attach(
        &mut self,
        id: JointId,
        first: Option<BodyId>,
        second: Option<BodyId>,
    ) -> Result<()> {
        self.record(id)?;
        match (first, second) {
            (None, None) => return Err(SimError::EmptyAttachment(id.raw())),
            (Some(a), Some(b)) if a == b => return Err(SimError::SelfAttachment(id.raw())),
            _ => {}
        }
        for body in [first, second].into_iter().flatten() {
            self.body(body)?;
        }

        self.unlink(id);
        let record = self.record_mut(id)?;
        record.set_bodies(first, second);
        let (b1, b2) = record.bodies();

        if let Some(b1) = b1 {
            self.body_mut(b1)?.connections.push(Connection {
                joint: id,
                other: b2,
            });
        }
        if let Some(b2) = b2 {
            self.body_mut(b2)?.connections.push(Connection {
                joint: id,
                other: b1,
            });
        }
        Ok(())
    }

    /// Detach a joint from its bodies. The joint stays alive and inert.
    pub fn detach(&mut self, id: JointId) -> Result<()> {
        self.record(id)?;
        self.unlink(id);
        self.record_mut(id)?.clear_bodies();
        Ok(())
    }

    /// Attached bodies, a lone body always first.
    pub fn joint_bodies(&self, id: JointId) -> Result<(Option<BodyId>, Option<BodyId>)> {
        Ok(self.record(id)?.bodies())
    }

    /// Kind of a joint.
    pub fn joint_kind(&self, id: JointId) -> Result<JointKind> {
        Ok(self.record(id)?.kind())
    }

    /// Total live joints, persistent and grouped.
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
            + self
                .groups
                .values()
                .map(JointArena::len)
                .sum::<usize>()
    }

    fn frames(&self, id: JointId, record: &JointRecord) -> Result<(BodyFrame, Option<BodyFrame>)> {
        let (first, second) = record.bodies();
        let first = first.ok_or(SimError::JointNotAttached(id.raw()))?;
        let first = self.body(first)?.frame();
        let second = second.map(|b| self.body(b).map(Body::frame)).transpose()?;
        Ok((first, second))
    }

    /// Run a query on the joint data with its current bodies.
    fn read_joint<R>(
        &self,
        id: JointId,
        f: impl FnOnce(&JointData, &BodyPair<'_>) -> Result<R>,
    ) -> Result<R> {
        let record = self.record(id)?;
        let (first, second) = self.frames(id, record)?;
        f(&record.data, &BodyPair::new(&first, second.as_ref()))
    }

    /// Run an edit on a copy of the joint data and commit it only on success.
    fn edit_joint(
        &mut self,
        id: JointId,
        f: impl FnOnce(&mut JointData, &BodyPair<'_>) -> Result<()>,
    ) -> Result<()> {
        let record = *self.record(id)?;
        let (first, second) = self.frames(id, &record)?;
        let mut data = record.data;
        f(&mut data, &BodyPair::new(&first, second.as_ref()))?;
        self.record_mut(id)?.data = data;
        Ok(())
    }

    /// Set the anchor point, world frame. The joint must be attached.
    pub fn set_anchor(&mut self, id: JointId, anchor: Point3<f64>) -> Result<()> {
        ensure_finite_vector(&anchor.coords, "anchor")?;
        self.edit_joint(id, |data, pair| data.set_anchor(pair, &anchor))
    }

    /// Anchor point as seen from the first body, world frame.
    pub fn anchor(&self, id: JointId) -> Result<Point3<f64>> {
        self.read_joint(id, |data, pair| data.anchor(pair))
    }

    /// Anchor point as seen from the second body (or the world), world frame.
    /// Differs from [`World::anchor`] by the joint's positional error.
    pub fn anchor2(&self, id: JointId) -> Result<Point3<f64>> {
        self.read_joint(id, |data, pair| data.anchor2(pair))
    }

    /// Set the (first) axis, world frame.
    pub fn set_axis(&mut self, id: JointId, axis: Vector3<f64>) -> Result<()> {
        ensure_finite_vector(&axis, "axis")?;
        self.edit_joint(id, |data, pair| data.set_axis(pair, &axis))
    }

    /// The (first) axis, world frame, unit length.
    pub fn axis(&self, id: JointId) -> Result<Vector3<f64>> {
        self.read_joint(id, |data, pair| data.axis(pair))
    }

    /// Set the wheel axis of a hinge-2, world frame. Refused when parallel
    /// to the first axis.
    pub fn set_hinge2_axis2(&mut self, id: JointId, axis: Vector3<f64>) -> Result<()> {
        ensure_finite_vector(&axis, "axis")?;
        self.edit_joint(id, |data, pair| match data {
            JointData::Hinge2(joint) => joint.set_axis2(pair, &axis),
            other => Err(SimError::unsupported("set_hinge2_axis2", other.kind().name())),
        })
    }

    /// Wheel axis of a hinge-2, world frame.
    pub fn hinge2_axis2(&self, id: JointId) -> Result<Vector3<f64>> {
        self.read_joint(id, |data, pair| match data {
            JointData::Hinge2(joint) => Ok(joint.axis2(pair)),
            other => Err(SimError::unsupported("hinge2_axis2", other.kind().name())),
        })
    }

    /// Set one limit/motor parameter. Needs no attachment.
    pub fn set_param(&mut self, id: JointId, param: JointParam, value: f64) -> Result<()> {
        self.record_mut(id)?.data.set_param(param, value)
    }

    /// Read one limit/motor parameter.
    pub fn param(&self, id: JointId, param: JointParam) -> Result<f64> {
        self.record(id)?.data.param(param)
    }

    /// Set both stops at once; nothing changes when `lo > hi`.
    pub fn set_stops(&mut self, id: JointId, lo: f64, hi: f64) -> Result<()> {
        let record = self.record(id)?;
        let mut data = record.data;
        // Open the range first so the intermediate state is always valid.
        data.set_param(JointParam::LoStop, f64::NEG_INFINITY)?;
        data.set_param(JointParam::HiStop, hi)?;
        data.set_param(JointParam::LoStop, lo)?;
        self.record_mut(id)?.data = data;
        Ok(())
    }

    fn hinge_reading(
        &self,
        id: JointId,
        operation: &'static str,
        f: impl FnOnce(&sim_constraint::HingeJoint, &BodyPair<'_>) -> f64,
    ) -> Result<f64> {
        self.read_joint(id, |data, pair| match data {
            JointData::Hinge(joint) => Ok(f(joint, pair)),
            other => Err(SimError::unsupported(operation, other.kind().name())),
        })
    }

    /// Hinge angle relative to the angle when the axis was set.
    pub fn hinge_angle(&self, id: JointId) -> Result<f64> {
        self.hinge_reading(id, "hinge_angle", |j, pair| j.angle(pair))
    }

    /// Hinge angle rate.
    pub fn hinge_angle_rate(&self, id: JointId) -> Result<f64> {
        self.hinge_reading(id, "hinge_angle_rate", |j, pair| j.angle_rate(pair))
    }

    /// Slider displacement along its axis since the axis was set.
    pub fn slider_position(&self, id: JointId) -> Result<f64> {
        self.read_joint(id, |data, pair| match data {
            JointData::Slider(joint) => Ok(joint.position(pair)),
            other => Err(SimError::unsupported("slider_position", other.kind().name())),
        })
    }

    /// Slider displacement rate.
    pub fn slider_position_rate(&self, id: JointId) -> Result<f64> {
        self.read_joint(id, |data, pair| match data {
            JointData::Slider(joint) => Ok(joint.position_rate(pair)),
            other => Err(SimError::unsupported("slider_position_rate", other.kind().name())),
        })
    }

    /// Angular motor angle about its axis.
    pub fn angular_motor_angle(&self, id: JointId) -> Result<f64> {
        self.read_joint(id, |data, pair| match data {
            JointData::AngularMotor(joint) => Ok(joint.angle(pair)),
            other => Err(SimError::unsupported("angular_motor_angle", other.kind().name())),
        })
    }

    /// Angular motor rate about its axis.
    pub fn angular_motor_angle_rate(&self, id: JointId) -> Result<f64> {
        self.read_joint(id, |data, pair| match data {
            JointData::AngularMotor(joint) => Ok(joint.angle_rate(pair)),
            other => Err(SimError::unsupported(
                "angular_motor_angle_rate",
                other.kind().name(),
            )),
        })
    }

    /// Hinge-2 steering angle.
    pub fn hinge2_angle1(&self, id: JointId) -> Result<f64> {
        self.read_joint(id, |data, pair| match data {
            JointData::Hinge2(joint) => Ok(joint.angle1(pair)),
            other => Err(SimError::unsupported("hinge2_angle1", other.kind().name())),
        })
    }

    /// Hinge-2 steering rate.
    pub fn hinge2_angle1_rate(&self, id: JointId) -> Result<f64> {
        self.read_joint(id, |data, pair| match data {
            JointData::Hinge2(joint) => Ok(joint.angle1_rate(pair)),
            other => Err(SimError::unsupported("hinge2_angle1_rate", other.kind().name())),
        })
    }

    /// Hinge-2 wheel spin rate.
    pub fn hinge2_angle2_rate(&self, id: JointId) -> Result<f64> {
        self.read_joint(id, |data, pair| match data {
            JointData::Hinge2(joint) => Ok(joint.angle2_rate(pair)),
            other => Err(SimError::unsupported("hinge2_angle2_rate", other.kind().name())),
        })
    }

    /// Constraint forces the joint applied during the last step, or `None`
    /// if it contributed no rows.
    pub fn joint_feedback(&self, id: JointId) -> Result<Option<JointFeedback>> {
        self.record(id)?;
        Ok(self.feedback.get(&id).copied())
    }

    // ==================== Groups ====================

    /// Create a constraint group. `max_size_hint` is the arena capacity in
    /// bytes; 0 makes it growable.
    pub fn create_group(&mut self, max_size_hint: usize) -> GroupId {
        let key = self
            .groups
            .insert_with_key(|key| JointArena::new(GroupId::from_key(key), max_size_hint));
        GroupId::from_key(key)
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut JointArena> {
        self.groups
            .get_mut(id.key())
            .ok_or(SimError::InvalidGroupId(id.raw()))
    }

    /// Invalidate every joint in the group at once.
    ///
    /// No per-joint work happens: body lists keep stale nodes, which every
    /// traversal skips and the next step compacts. Feedback of the released
    /// joints stays unreachable because their handles no longer resolve.
    pub fn empty_group(&mut self, id: GroupId) -> Result<()> {
        let arena = self.group_mut(id)?;
        let released = arena.len();
        arena.reset();
        debug!(group = %id, released, "emptied constraint group");
        Ok(())
    }

    /// Empty the group and free its handle.
    pub fn destroy_group(&mut self, id: GroupId) -> Result<()> {
        self.empty_group(id)?;
        self.groups.remove(id.key());
        Ok(())
    }

    /// Joints currently allocated in the group.
    pub fn group_len(&self, id: GroupId) -> Result<usize> {
        self.groups
            .get(id.key())
            .map(JointArena::len)
            .ok_or(SimError::InvalidGroupId(id.raw()))
    }

    // ==================== Graph ====================

    /// Live connections of a body, stale nodes skipped.
    pub fn neighbors(&self, id: BodyId) -> Result<Vec<Connection>> {
        let body = self.body(id)?;
        Ok(body
            .connections
            .iter()
            .filter(|c| self.contains_joint(c.joint))
            .copied()
            .collect())
    }

    /// Whether a live joint connects `a` and `b`.
    pub fn connected(&self, a: BodyId, b: BodyId) -> Result<bool> {
        self.connected_where(a, b, |_| true)
    }

    /// Whether a live joint that is not of `kind` connects `a` and `b`.
    pub fn connected_excluding(&self, a: BodyId, b: BodyId, kind: JointKind) -> Result<bool> {
        self.connected_where(a, b, |record| record.kind() != kind)
    }

    fn connected_where(
        &self,
        a: BodyId,
        b: BodyId,
        accept: impl Fn(&JointRecord) -> bool,
    ) -> Result<bool> {
        let body = self.body(a)?;
        Ok(body.connections.iter().any(|c| {
            c.other == Some(b)
                && lookup(&self.joints, &self.groups, c.joint).is_some_and(&accept)
        }))
    }

    /// Drop connection nodes whose joint no longer exists.
    pub(crate) fn compact_connections(&mut self) {
        let (joints, groups) = (&self.joints, &self.groups);
        for body in self.bodies.values_mut() {
            body.connections
                .retain(|c| lookup(joints, groups, c.joint).is_some());
        }
    }
}
