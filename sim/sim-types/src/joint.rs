//! Joint and group handles, joint kinds, parameters and feedback.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Generational handle to a constraint group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupId {
    index: u32,
    generation: u32,
}

impl GroupId {
    /// Create a handle from its slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the owning world.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Packed representation (generation in the high 32 bits).
    #[must_use]
    pub const fn raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Group({}v{})", self.index, self.generation)
    }
}

/// Handle to a joint.
///
/// A persistent joint lives in the world's joint storage and `generation` is
/// the slot generation. A group joint lives in its group's arena: `index` is
/// the record position and `generation` is the arena epoch at allocation, so
/// emptying the group invalidates every handle it issued at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointId {
    index: u32,
    generation: u32,
    group: Option<GroupId>,
}

impl JointId {
    /// Handle to a persistent joint.
    #[must_use]
    pub const fn persistent(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            group: None,
        }
    }

    /// Handle to a joint allocated in `group` during arena epoch `epoch`.
    #[must_use]
    pub const fn grouped(group: GroupId, index: u32, epoch: u32) -> Self {
        Self {
            index,
            generation: epoch,
            group: Some(group),
        }
    }

    /// Slot or record index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation, or arena epoch for group joints.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Owning group, if any.
    #[must_use]
    pub const fn group(self) -> Option<GroupId> {
        self.group
    }

    /// Whether the joint was allocated in a group.
    #[must_use]
    pub const fn in_group(self) -> bool {
        self.group.is_some()
    }

    /// Packed index and generation, used in error reports.
    #[must_use]
    pub const fn raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

impl std::fmt::Display for JointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.group {
            Some(group) => write!(f, "Joint({}@{}e{})", self.index, group, self.generation),
            None => write!(f, "Joint({}v{})", self.index, self.generation),
        }
    }
}

/// The closed set of constraint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointKind {
    /// Ball-and-socket: anchors coincide, rotation free.
    Ball,
    /// Single rotation axis.
    Hinge,
    /// Single translation axis.
    Slider,
    /// Non-penetration plus friction at one contact point.
    Contact,
    /// Motorised or limited rotation about one axis, no positional rows.
    AngularMotor,
    /// Two hinge axes in series, as in a steered wheel.
    Hinge2,
}

impl JointKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Ball,
        Self::Hinge,
        Self::Slider,
        Self::Contact,
        Self::AngularMotor,
        Self::Hinge2,
    ];

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ball => "ball",
            Self::Hinge => "hinge",
            Self::Slider => "slider",
            Self::Contact => "contact",
            Self::AngularMotor => "angular motor",
            Self::Hinge2 => "hinge-2",
        }
    }

    /// Whether the kind has a limit/motor parameter block.
    #[must_use]
    pub const fn has_limit_motor(self) -> bool {
        !matches!(self, Self::Ball | Self::Contact)
    }
}

impl std::fmt::Display for JointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Addressable limit/motor parameters.
///
/// `Vel2` and `FMax2` address the motor on the second axis of a hinge-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointParam {
    /// Lower stop (angle or distance).
    LoStop,
    /// Upper stop (angle or distance).
    HiStop,
    /// Motor target velocity.
    Vel,
    /// Maximum motor force or torque; zero switches the motor off.
    FMax,
    /// Share of the motor effort applied when the joint sits at a stop.
    FudgeFactor,
    /// Restitution of the stops in `[0, 1]`.
    Bounce,
    /// Error reduction used by stop rows; negative means the world ERP.
    StopErp,
    /// Constraint force mixing added to stop rows.
    StopCfm,
    /// Second-axis motor target velocity.
    Vel2,
    /// Second-axis maximum motor torque.
    FMax2,
}

/// Constraint forces a joint applied during the last step, world frame.
///
/// `force2`/`torque2` stay zero for a joint with a single body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointFeedback {
    /// Force on the first body.
    pub force1: Vector3<f64>,
    /// Torque on the first body.
    pub torque1: Vector3<f64>,
    /// Force on the second body.
    pub force2: Vector3<f64>,
    /// Torque on the second body.
    pub torque2: Vector3<f64>,
}
