//! The row contract between joints and the step solver.
//!
//! A joint first reports how many rows it needs ([`RowInfo`]), then fills
//! exactly that many rows through a [`RowBlock`]. Each row is one scalar
//! velocity constraint
//!
//! ```text
//! J1l·v1 + J1a·ω1 + J2l·v2 + J2a·ω2 = rhs,   lo <= λ <= hi
//! ```
//!
//! Unbounded rows (`lo = -∞`, `hi = +∞`) come first, bounded rows after.
//! Joints only ever see read-only [`BodyFrame`] snapshots; forces they want
//! applied directly (motor efforts at a stop) go through [`Effort`].

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use sim_types::MAX_ROWS_PER_JOINT;

/// Read-only snapshot of a body taken at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyFrame {
    /// Position of the body origin (its centre of mass).
    pub position: Point3<f64>,
    /// Orientation as a quaternion.
    pub quaternion: UnitQuaternion<f64>,
    /// Orientation as a rotation matrix, kept equal to `quaternion`.
    pub rotation: Matrix3<f64>,
    /// Linear velocity, world frame.
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity, world frame.
    pub angular_velocity: Vector3<f64>,
    /// Inverse mass.
    pub inv_mass: f64,
    /// Inverse inertia, world frame.
    pub inv_inertia: Matrix3<f64>,
}

impl BodyFrame {
    /// Build a snapshot, rotating the body-frame inverse inertia into the world.
    #[must_use]
    pub fn new(
        position: Point3<f64>,
        quaternion: UnitQuaternion<f64>,
        linear_velocity: Vector3<f64>,
        angular_velocity: Vector3<f64>,
        inv_mass: f64,
        inv_inertia_body: &Matrix3<f64>,
    ) -> Self {
        let rotation = *quaternion.to_rotation_matrix().matrix();
        Self {
            position,
            quaternion,
            rotation,
            linear_velocity,
            angular_velocity,
            inv_mass,
            inv_inertia: rotation * inv_inertia_body * rotation.transpose(),
        }
    }

    /// A unit-mass body at rest, identity orientation.
    #[must_use]
    pub fn at_rest(position: Point3<f64>) -> Self {
        Self::new(
            position,
            UnitQuaternion::identity(),
            Vector3::zeros(),
            Vector3::zeros(),
            1.0,
            &Matrix3::identity(),
        )
    }

    /// Body-frame vector to world frame.
    #[must_use]
    pub fn vector_to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Body-frame point to world frame.
    #[must_use]
    pub fn point_to_world(&self, local: &Vector3<f64>) -> Point3<f64> {
        self.position + self.rotation * local
    }

    /// World vector to body frame.
    #[must_use]
    pub fn vector_to_local(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * world
    }

    /// World point to body frame.
    #[must_use]
    pub fn point_to_local(&self, world: &Point3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * (world - self.position)
    }

    /// Velocity of a world-frame point rigidly attached to the body.
    #[must_use]
    pub fn point_velocity(&self, world: &Point3<f64>) -> Vector3<f64> {
        self.linear_velocity + self.angular_velocity.cross(&(world - self.position))
    }
}

/// The bodies a joint is attached to, in normalised order.
#[derive(Debug, Clone, Copy)]
pub struct BodyPair<'a> {
    /// First body; always present for a joint that takes part in a step.
    pub first: &'a BodyFrame,
    /// Second body, absent when the joint connects to the static world.
    pub second: Option<&'a BodyFrame>,
}

impl<'a> BodyPair<'a> {
    /// Pair a body with an optional second one.
    #[must_use]
    pub const fn new(first: &'a BodyFrame, second: Option<&'a BodyFrame>) -> Self {
        Self { first, second }
    }

    /// Relative angular velocity `ω1 - ω2`.
    #[must_use]
    pub fn relative_angular_velocity(&self) -> Vector3<f64> {
        let w2 = self.second.map_or_else(Vector3::zeros, |b| b.angular_velocity);
        self.first.angular_velocity - w2
    }

    /// Relative linear velocity `v1 - v2` of the body origins.
    #[must_use]
    pub fn relative_linear_velocity(&self) -> Vector3<f64> {
        let v2 = self.second.map_or_else(Vector3::zeros, |b| b.linear_velocity);
        self.first.linear_velocity - v2
    }

    /// Orientation of the second body, identity when absent.
    #[must_use]
    pub fn second_quaternion(&self) -> UnitQuaternion<f64> {
        self.second
            .map_or_else(UnitQuaternion::identity, |b| b.quaternion)
    }
}

/// Row counts reported by a joint for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowInfo {
    /// Rows with no force bounds, placed first.
    pub unbounded: usize,
    /// Rows with bounds or a friction dependency, placed after.
    pub bounded: usize,
}

impl RowInfo {
    /// Create row counts.
    #[must_use]
    pub const fn new(unbounded: usize, bounded: usize) -> Self {
        Self { unbounded, bounded }
    }

    /// Total rows.
    #[must_use]
    pub const fn total(self) -> usize {
        self.unbounded + self.bounded
    }

    /// Whether the joint contributes nothing this step.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.total() == 0
    }

    /// Whether the counts respect the per-joint limit.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.total() <= MAX_ROWS_PER_JOINT
    }
}

/// Step-wide values joints need while filling rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// Inverse step size.
    pub fps: f64,
    /// World error-reduction parameter.
    pub erp: f64,
    /// Cap on contact correcting velocity.
    pub contact_max_correcting_vel: f64,
    /// Penetration ignored by contact rows.
    pub contact_surface_layer: f64,
}

impl StepContext {
    /// Context for a step of size `h` with the given ERP and no contact tuning.
    #[must_use]
    pub fn new(h: f64, erp: f64) -> Self {
        Self {
            fps: 1.0 / h,
            erp,
            contact_max_correcting_vel: f64::INFINITY,
            contact_surface_layer: 0.0,
        }
    }

    /// Error-correction gain `fps * erp`.
    #[must_use]
    pub fn gain(&self) -> f64 {
        self.fps * self.erp
    }
}

/// One Jacobian row with its right-hand side and bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    /// Linear block for the first body.
    pub j1_linear: Vector3<f64>,
    /// Angular block for the first body.
    pub j1_angular: Vector3<f64>,
    /// Linear block for the second body.
    pub j2_linear: Vector3<f64>,
    /// Angular block for the second body.
    pub j2_angular: Vector3<f64>,
    /// Desired constraint velocity.
    pub rhs: f64,
    /// Extra constraint force mixing on this row.
    pub cfm: f64,
    /// Lower force bound.
    pub lo: f64,
    /// Upper force bound.
    pub hi: f64,
    /// Row (within the same joint) whose multiplier scales `lo`/`hi`.
    pub findex: Option<usize>,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            j1_linear: Vector3::zeros(),
            j1_angular: Vector3::zeros(),
            j2_linear: Vector3::zeros(),
            j2_angular: Vector3::zeros(),
            rhs: 0.0,
            cfm: 0.0,
            lo: f64::NEG_INFINITY,
            hi: f64::INFINITY,
            findex: None,
        }
    }
}

impl Row {
    /// `J·v` for the given bodies.
    #[must_use]
    pub fn velocity(&self, bodies: &BodyPair<'_>) -> f64 {
        let b1 = bodies.first;
        let mut v = self.j1_linear.dot(&b1.linear_velocity)
            + self.j1_angular.dot(&b1.angular_velocity);
        if let Some(b2) = bodies.second {
            v += self.j2_linear.dot(&b2.linear_velocity) + self.j2_angular.dot(&b2.angular_velocity);
        }
        v
    }
}

/// Forces a joint applies directly, outside the solved multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Effort {
    /// Force on the first body.
    pub force1: Vector3<f64>,
    /// Torque on the first body.
    pub torque1: Vector3<f64>,
    /// Force on the second body.
    pub force2: Vector3<f64>,
    /// Torque on the second body.
    pub torque2: Vector3<f64>,
}

impl Effort {
    /// Whether nothing was added.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.force1 == Vector3::zeros()
            && self.torque1 == Vector3::zeros()
            && self.force2 == Vector3::zeros()
            && self.torque2 == Vector3::zeros()
    }
}

/// The rows one joint owns for the current step.
///
/// The block is sized from the joint's [`RowInfo`], so a joint cannot write
/// past its extent, and second-body blocks are dropped when the joint has a
/// single body.
#[derive(Debug)]
pub struct RowBlock<'a> {
    rows: &'a mut [Row],
    has_second: bool,
    effort: &'a mut Effort,
}

impl<'a> RowBlock<'a> {
    /// Wrap a zeroed row slice.
    pub fn new(rows: &'a mut [Row], has_second: bool, effort: &'a mut Effort) -> Self {
        Self {
            rows,
            has_second,
            effort,
        }
    }

    /// Number of rows in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the block has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a second body exists.
    #[must_use]
    pub fn has_second(&self) -> bool {
        self.has_second
    }

    /// Read back a row.
    #[must_use]
    pub fn row(&self, i: usize) -> &Row {
        &self.rows[i]
    }

    /// Set the first body's Jacobian blocks.
    pub fn set_first(&mut self, i: usize, linear: Vector3<f64>, angular: Vector3<f64>) {
        let row = &mut self.rows[i];
        row.j1_linear = linear;
        row.j1_angular = angular;
    }

    /// Set the second body's Jacobian blocks; ignored without a second body.
    pub fn set_second(&mut self, i: usize, linear: Vector3<f64>, angular: Vector3<f64>) {
        if self.has_second {
            let row = &mut self.rows[i];
            row.j2_linear = linear;
            row.j2_angular = angular;
        }
    }

    /// Angular-only row `axis·(ω1 - ω2)`.
    pub fn set_angular(&mut self, i: usize, axis: Vector3<f64>) {
        self.set_first(i, Vector3::zeros(), axis);
        self.set_second(i, Vector3::zeros(), -axis);
    }

    /// Set the desired constraint velocity.
    pub fn set_rhs(&mut self, i: usize, rhs: f64) {
        self.rows[i].rhs = rhs;
    }

    /// Set the extra constraint force mixing.
    pub fn set_cfm(&mut self, i: usize, cfm: f64) {
        self.rows[i].cfm = cfm;
    }

    /// Set force bounds.
    pub fn set_bounds(&mut self, i: usize, lo: f64, hi: f64) {
        let row = &mut self.rows[i];
        row.lo = lo;
        row.hi = hi;
    }

    /// Make row `i`'s bounds proportional to the multiplier of row `of`.
    pub fn set_friction_index(&mut self, i: usize, of: usize) {
        debug_assert!(of < i, "friction rows must follow the row they depend on");
        self.rows[i].findex = Some(of);
    }

    /// Apply `torque` to the first body and its reaction to the second.
    pub fn add_torque_pair(&mut self, torque: Vector3<f64>) {
        self.effort.torque1 += torque;
        if self.has_second {
            self.effort.torque2 -= torque;
        }
    }

    /// Apply `force` to the first body and its reaction to the second.
    pub fn add_force_pair(&mut self, force: Vector3<f64>) {
        self.effort.force1 += force;
        if self.has_second {
            self.effort.force2 -= force;
        }
    }

    /// Add a torque to each body independently.
    pub fn add_torques(&mut self, torque1: Vector3<f64>, torque2: Vector3<f64>) {
        self.effort.torque1 += torque1;
        if self.has_second {
            self.effort.torque2 += torque2;
        }
    }
}
