//! The constraint trait, the closed joint union and shared row geometry.
//!
//! Every joint kind implements [`Constraint`]. The world stores joints as
//! [`JointRecord`]s whose [`JointData`] is a tagged union over the six kinds
//! and forwards the trait with a `match`, so no trait objects are involved
//! and records can be packed into a group arena by [`JointData::record_size`].

use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_types::{BodyId, Contact, JointKind, JointParam, Result, SimError};

use crate::row::{BodyPair, RowBlock, RowInfo, StepContext};
use crate::{
    AngularMotorJoint, BallJoint, ContactJoint, Hinge2Joint, HingeJoint, SliderJoint,
};

/// Behaviour shared by every joint kind.
///
/// Geometry setters take world-frame input and store it in body frames (or
/// in the world frame for an absent second body), so it stays attached to
/// the bodies as they move.
pub trait Constraint {
    /// The kind tag.
    fn kind(&self) -> JointKind;

    /// Reset every parameter to its default.
    fn init(&mut self)
    where
        Self: Default,
    {
        *self = Self::default();
    }

    /// Rows needed for the current body state.
    fn row_info(&self, bodies: &BodyPair<'_>) -> RowInfo;

    /// Write exactly `row_info(bodies).total()` rows into `block`.
    fn fill_rows(&self, ctx: &StepContext, bodies: &BodyPair<'_>, block: &mut RowBlock<'_>);

    /// Set the anchor point, world frame.
    fn set_anchor(&mut self, _bodies: &BodyPair<'_>, _anchor: &Point3<f64>) -> Result<()> {
        Err(SimError::unsupported("set_anchor", self.kind().name()))
    }

    /// Anchor point as seen from the first body, world frame.
    fn anchor(&self, _bodies: &BodyPair<'_>) -> Result<Point3<f64>> {
        Err(SimError::unsupported("anchor", self.kind().name()))
    }

    /// Anchor point as seen from the second body, world frame.
    fn anchor2(&self, _bodies: &BodyPair<'_>) -> Result<Point3<f64>> {
        Err(SimError::unsupported("anchor2", self.kind().name()))
    }

    /// Set the (first) axis, world frame. Need not be unit length.
    fn set_axis(&mut self, _bodies: &BodyPair<'_>, _axis: &Vector3<f64>) -> Result<()> {
        Err(SimError::unsupported("set_axis", self.kind().name()))
    }

    /// The (first) axis, world frame, unit length.
    fn axis(&self, _bodies: &BodyPair<'_>) -> Result<Vector3<f64>> {
        Err(SimError::unsupported("axis", self.kind().name()))
    }

    /// Set a stop or motor parameter.
    fn set_param(&mut self, _param: JointParam, _value: f64) -> Result<()> {
        Err(SimError::unsupported("set_param", self.kind().name()))
    }

    /// Read a stop or motor parameter.
    fn param(&self, _param: JointParam) -> Result<f64> {
        Err(SimError::unsupported("param", self.kind().name()))
    }
}

// ============================================================================
// Shared geometry
// ============================================================================

/// Normalise `axis`, rejecting zero-length and non-finite input.
pub fn unit_axis(axis: &Vector3<f64>) -> Result<Vector3<f64>> {
    sim_types::error::ensure_finite_vector(axis, "axis")?;
    axis.try_normalize(1e-12)
        .ok_or_else(|| SimError::degenerate_axis("axis has zero length"))
}

/// Two unit vectors spanning the plane perpendicular to unit `n`.
#[must_use]
pub fn plane_space(n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    if n.z.abs() > std::f64::consts::FRAC_1_SQRT_2 {
        // Pick p in the y-z plane.
        let a = n.y * n.y + n.z * n.z;
        let k = 1.0 / a.sqrt();
        let p = Vector3::new(0.0, -n.z * k, n.y * k);
        let q = Vector3::new(a * k, -n.x * p.z, n.x * p.y);
        (p, q)
    } else {
        // Pick p in the x-y plane.
        let a = n.x * n.x + n.y * n.y;
        let k = 1.0 / a.sqrt();
        let p = Vector3::new(-n.y * k, n.x * k, 0.0);
        let q = Vector3::new(-n.z * p.y, n.z * p.x, a * k);
        (p, q)
    }
}

/// Rotation of the second body relative to the first, measured against the
/// reference `rel0` captured when the joint geometry was set, expressed in
/// the first body's frame. Identity while the bodies keep their reference
/// orientation.
#[must_use]
pub fn relative_rotation(
    bodies: &BodyPair<'_>,
    rel0: &UnitQuaternion<f64>,
) -> UnitQuaternion<f64> {
    bodies.first.quaternion.inverse() * bodies.second_quaternion() * rel0.inverse()
}

/// Reference orientation for [`relative_rotation`] in the current pose.
#[must_use]
pub fn reference_rotation(bodies: &BodyPair<'_>) -> UnitQuaternion<f64> {
    bodies.first.quaternion.inverse() * bodies.second_quaternion()
}

/// Signed angle of the first body relative to the second about the unit
/// body-frame `axis`, in `(-π, π]`.
#[must_use]
pub fn twist_angle(bodies: &BodyPair<'_>, rel0: &UnitQuaternion<f64>, axis: &Vector3<f64>) -> f64 {
    let q = relative_rotation(bodies, rel0);
    let s = q.imag().dot(axis);
    let mut theta = 2.0 * s.atan2(q.w);
    if theta > std::f64::consts::PI {
        theta -= 2.0 * std::f64::consts::PI;
    } else if theta <= -std::f64::consts::PI {
        theta += 2.0 * std::f64::consts::PI;
    }
    // q rotates the second body onto the first's view; the joint angle is
    // the first body's rotation, hence the sign.
    -theta
}

/// Three angular rows `ω1 - ω2 = gain · err` holding the reference
/// orientation, starting at row `start`.
pub fn fill_fixed_orientation(
    ctx: &StepContext,
    bodies: &BodyPair<'_>,
    rel0: &UnitQuaternion<f64>,
    block: &mut RowBlock<'_>,
    start: usize,
) {
    let mut err = relative_rotation(bodies, rel0);
    if err.w < 0.0 {
        err = UnitQuaternion::new_unchecked(-err.into_inner());
    }
    // Small-angle: rotation θ about u has imaginary part ≈ θ/2 · u.
    let e = bodies.first.rotation * err.imag();
    let gain = ctx.gain();
    for (k, axis) in [Vector3::x(), Vector3::y(), Vector3::z()].into_iter().enumerate() {
        block.set_angular(start + k, axis);
        block.set_rhs(start + k, 2.0 * gain * e[k]);
    }
}

/// A point fixed in both bodies: body-frame offsets from each body origin.
///
/// Without a second body `second` holds the world-frame anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchors {
    /// Anchor in the first body's frame.
    pub first: Vector3<f64>,
    /// Anchor in the second body's frame, or world position.
    pub second: Vector3<f64>,
}

impl Default for Anchors {
    fn default() -> Self {
        Self {
            first: Vector3::zeros(),
            second: Vector3::zeros(),
        }
    }
}

impl Anchors {
    /// Store the world point `anchor` in each body's frame.
    pub fn set(&mut self, bodies: &BodyPair<'_>, anchor: &Point3<f64>) -> Result<()> {
        if !anchor.iter().all(|x| x.is_finite()) {
            return Err(SimError::NonFinite { what: "anchor" });
        }
        self.first = bodies.first.point_to_local(anchor);
        self.second = match bodies.second {
            Some(b2) => b2.point_to_local(anchor),
            None => anchor.coords,
        };
        Ok(())
    }

    /// Anchor as carried by the first body.
    #[must_use]
    pub fn world_first(&self, bodies: &BodyPair<'_>) -> Point3<f64> {
        bodies.first.point_to_world(&self.first)
    }

    /// Anchor as carried by the second body (or fixed in the world).
    #[must_use]
    pub fn world_second(&self, bodies: &BodyPair<'_>) -> Point3<f64> {
        match bodies.second {
            Some(b2) => b2.point_to_world(&self.second),
            None => Point3::from(self.second),
        }
    }

    /// Three rows making the anchor velocities equal, starting at `start`.
    pub fn fill_rows(
        &self,
        ctx: &StepContext,
        bodies: &BodyPair<'_>,
        block: &mut RowBlock<'_>,
        start: usize,
    ) {
        let r1 = bodies.first.vector_to_world(&self.first);
        let r2 = bodies.second.map(|b2| b2.vector_to_world(&self.second));
        let gap = self.world_second(bodies) - self.world_first(bodies);
        let gain = ctx.gain();

        for (k, e) in [Vector3::x(), Vector3::y(), Vector3::z()].into_iter().enumerate() {
            // v + ω × r projected on e is e·v + (r × e)·ω
            block.set_first(start + k, e, r1.cross(&e));
            if let Some(r2) = &r2 {
                block.set_second(start + k, -e, -r2.cross(&e));
            }
            block.set_rhs(start + k, gain * gap[k]);
        }
    }
}

// ============================================================================
// Records
// ============================================================================

bitflags::bitflags! {
    /// Flag set carried by every joint record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JointFlags: u8 {
        /// The joint was allocated in a group arena.
        const IN_GROUP = 0b0000_0001;
        /// The client attached `(None, body)`; the body was moved to slot 0.
        const REVERSED = 0b0000_0010;
    }
}

/// Forward a method call to whichever variant `$data` holds.
macro_rules! dispatch {
    ($data:expr, $j:ident => $call:expr) => {
        match $data {
            JointData::Ball($j) => $call,
            JointData::Hinge($j) => $call,
            JointData::Slider($j) => $call,
            JointData::Contact($j) => $call,
            JointData::AngularMotor($j) => $call,
            JointData::Hinge2($j) => $call,
        }
    };
}

/// Tagged union over the six joint kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointData {
    /// Ball-and-socket.
    Ball(BallJoint),
    /// Hinge.
    Hinge(HingeJoint),
    /// Slider.
    Slider(SliderJoint),
    /// Contact.
    Contact(ContactJoint),
    /// Angular motor.
    AngularMotor(AngularMotorJoint),
    /// Hinge-2.
    Hinge2(Hinge2Joint),
}

impl JointData {
    /// A freshly initialised joint of `kind`. Contacts need a descriptor and
    /// are built with [`JointData::contact`].
    pub fn new(kind: JointKind) -> Result<Self> {
        let mut data = match kind {
            JointKind::Ball => Self::Ball(BallJoint::default()),
            JointKind::Hinge => Self::Hinge(HingeJoint::default()),
            JointKind::Slider => Self::Slider(SliderJoint::default()),
            JointKind::AngularMotor => Self::AngularMotor(AngularMotorJoint::default()),
            JointKind::Hinge2 => Self::Hinge2(Hinge2Joint::default()),
            JointKind::Contact => {
                return Err(SimError::unsupported("create without a descriptor", "contact"))
            }
        };
        data.init();
        Ok(data)
    }

    /// A contact joint from a validated descriptor.
    pub fn contact(contact: Contact) -> Result<Self> {
        Ok(Self::Contact(ContactJoint::new(contact)?))
    }

    /// Arena bytes a record of `kind` occupies.
    #[must_use]
    pub const fn record_size(kind: JointKind) -> usize {
        let payload = match kind {
            JointKind::Ball => std::mem::size_of::<BallJoint>(),
            JointKind::Hinge => std::mem::size_of::<HingeJoint>(),
            JointKind::Slider => std::mem::size_of::<SliderJoint>(),
            JointKind::Contact => std::mem::size_of::<ContactJoint>(),
            JointKind::AngularMotor => std::mem::size_of::<AngularMotorJoint>(),
            JointKind::Hinge2 => std::mem::size_of::<Hinge2Joint>(),
        };
        std::mem::size_of::<JointHeader>() + payload
    }

    /// Reset the variant to its defaults, keeping its kind.
    pub fn init(&mut self) {
        match self {
            Self::Ball(j) => j.init(),
            Self::Hinge(j) => j.init(),
            Self::Slider(j) => j.init(),
            Self::AngularMotor(j) => j.init(),
            Self::Hinge2(j) => j.init(),
            // Contacts are defined by their descriptor.
            Self::Contact(_) => {}
        }
    }

    /// The kind tag.
    #[must_use]
    pub fn kind(&self) -> JointKind {
        dispatch!(self, j => j.kind())
    }

    /// See [`Constraint::row_info`].
    #[must_use]
    pub fn row_info(&self, bodies: &BodyPair<'_>) -> RowInfo {
        dispatch!(self, j => j.row_info(bodies))
    }

    /// See [`Constraint::fill_rows`].
    pub fn fill_rows(&self, ctx: &StepContext, bodies: &BodyPair<'_>, block: &mut RowBlock<'_>) {
        dispatch!(self, j => j.fill_rows(ctx, bodies, block));
    }

    /// See [`Constraint::set_anchor`].
    pub fn set_anchor(&mut self, bodies: &BodyPair<'_>, anchor: &Point3<f64>) -> Result<()> {
        dispatch!(self, j => j.set_anchor(bodies, anchor))
    }

    /// See [`Constraint::anchor`].
    pub fn anchor(&self, bodies: &BodyPair<'_>) -> Result<Point3<f64>> {
        dispatch!(self, j => j.anchor(bodies))
    }

    /// See [`Constraint::anchor2`].
    pub fn anchor2(&self, bodies: &BodyPair<'_>) -> Result<Point3<f64>> {
        dispatch!(self, j => j.anchor2(bodies))
    }

    /// See [`Constraint::set_axis`].
    pub fn set_axis(&mut self, bodies: &BodyPair<'_>, axis: &Vector3<f64>) -> Result<()> {
        dispatch!(self, j => j.set_axis(bodies, axis))
    }

    /// See [`Constraint::axis`].
    pub fn axis(&self, bodies: &BodyPair<'_>) -> Result<Vector3<f64>> {
        dispatch!(self, j => j.axis(bodies))
    }

    /// See [`Constraint::set_param`].
    pub fn set_param(&mut self, param: JointParam, value: f64) -> Result<()> {
        dispatch!(self, j => j.set_param(param, value))
    }

    /// See [`Constraint::param`].
    pub fn param(&self, param: JointParam) -> Result<f64> {
        dispatch!(self, j => j.param(param))
    }
}

/// Bookkeeping shared by every record, independent of the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JointHeader {
    /// Flag set.
    pub flags: JointFlags,
    /// Attached bodies, normalised so a lone body sits in slot 0.
    pub bodies: [Option<BodyId>; 2],
}

/// A joint as stored by the world or a group arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointRecord {
    /// Flags and attachment.
    pub header: JointHeader,
    /// Kind-specific data.
    pub data: JointData,
}

impl JointRecord {
    /// Wrap joint data in a detached record.
    #[must_use]
    pub fn new(data: JointData, in_group: bool) -> Self {
        let mut header = JointHeader::default();
        header.flags.set(JointFlags::IN_GROUP, in_group);
        Self { header, data }
    }

    /// The kind tag.
    #[must_use]
    pub fn kind(&self) -> JointKind {
        self.data.kind()
    }

    /// Attached bodies in normalised order.
    #[must_use]
    pub fn bodies(&self) -> (Option<BodyId>, Option<BodyId>) {
        (self.header.bodies[0], self.header.bodies[1])
    }

    /// Whether at least one body is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.header.bodies[0].is_some()
    }

    /// Whether the client attached in swapped order.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.header.flags.contains(JointFlags::REVERSED)
    }

    /// Whether the record lives in a group arena.
    #[must_use]
    pub fn in_group(&self) -> bool {
        self.header.flags.contains(JointFlags::IN_GROUP)
    }

    /// Record the attachment, moving a lone second body into slot 0.
    pub fn set_bodies(&mut self, first: Option<BodyId>, second: Option<BodyId>) {
        let (slots, reversed) = match (first, second) {
            (None, Some(b)) => ([Some(b), None], true),
            (a, b) => ([a, b], false),
        };
        self.header.bodies = slots;
        self.header.flags.set(JointFlags::REVERSED, reversed);
        if let JointData::Contact(c) = &mut self.data {
            c.set_reversed(reversed);
        }
    }

    /// Forget both bodies.
    pub fn clear_bodies(&mut self) {
        self.set_bodies(None, None);
    }
}
