//! Error types for world, body and joint operations.

use thiserror::Error;

/// Errors that can occur while building or stepping a world.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A body handle is stale or was never issued.
    #[error("invalid body ID: {0:#x}")]
    InvalidBodyId(u64),

    /// A joint handle is stale, was never issued, or its group was emptied.
    #[error("invalid joint ID: {0:#x}")]
    InvalidJointId(u64),

    /// A group handle is stale or was never issued.
    #[error("invalid group ID: {0:#x}")]
    InvalidGroupId(u64),

    /// `attach` was called with no body on either side.
    #[error("joint {0:#x} must be attached to at least one body")]
    EmptyAttachment(u64),

    /// `attach` was called with the same body on both sides.
    #[error("joint {0:#x} cannot connect a body to itself")]
    SelfAttachment(u64),

    /// A joint reported more rows than a single constraint may own.
    #[error("joint {joint:#x} reported {rows} rows (maximum {max})")]
    TooManyRows {
        /// Offending joint.
        joint: u64,
        /// Rows it asked for.
        rows: usize,
        /// Upper bound per joint.
        max: usize,
    },

    /// A fixed-capacity group cannot hold another joint record.
    #[error("group {group:#x} is full: {needed} bytes needed, {available} available")]
    GroupFull {
        /// The group that ran out of space.
        group: u64,
        /// Size of the record that was requested.
        needed: usize,
        /// Bytes left in the arena.
        available: usize,
    },

    /// Group joints are released only by emptying or destroying their group.
    #[error("joint {0:#x} belongs to a group and cannot be destroyed on its own")]
    JointInGroup(u64),

    /// Query needs the joint to be attached to at least one body.
    #[error("joint {0:#x} is not attached to any body")]
    JointNotAttached(u64),

    /// Requested lower stop is above the upper stop.
    #[error("invalid stops: lo {lo} > hi {hi}")]
    InvalidStops {
        /// Lower stop.
        lo: f64,
        /// Upper stop.
        hi: f64,
    },

    /// Operation is not meaningful for this joint kind.
    #[error("{operation} is not supported by {kind} joints")]
    Unsupported {
        /// The operation that was refused.
        operation: &'static str,
        /// The joint kind name.
        kind: &'static str,
    },

    /// An axis was zero length or otherwise degenerate.
    #[error("degenerate axis: {reason}")]
    DegenerateAxis {
        /// Description of the problem.
        reason: String,
    },

    /// A NaN or infinite value was passed in.
    #[error("non-finite value for {what}")]
    NonFinite {
        /// Which input was rejected.
        what: &'static str,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Simulation diverged (`NaN` or `Inf` detected after a step).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A rotation matrix was not a proper rotation.
    #[error("invalid rotation: {reason}")]
    InvalidRotation {
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create an invalid rotation error.
    #[must_use]
    pub fn invalid_rotation(reason: impl Into<String>) -> Self {
        Self::InvalidRotation {
            reason: reason.into(),
        }
    }

    /// Create a degenerate axis error.
    #[must_use]
    pub fn degenerate_axis(reason: impl Into<String>) -> Self {
        Self::DegenerateAxis {
            reason: reason.into(),
        }
    }

    /// Create an unsupported operation error.
    #[must_use]
    pub const fn unsupported(operation: &'static str, kind: &'static str) -> Self {
        Self::Unsupported { operation, kind }
    }

    /// Check if this error comes from a stale or unknown handle.
    #[must_use]
    pub fn is_invalid_handle(&self) -> bool {
        matches!(
            self,
            Self::InvalidBodyId(_) | Self::InvalidJointId(_) | Self::InvalidGroupId(_)
        )
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

/// Reject a NaN or infinite scalar.
pub fn ensure_finite(value: f64, what: &'static str) -> crate::Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::NonFinite { what })
    }
}

/// Reject a vector with any NaN or infinite component.
pub fn ensure_finite_vector(v: &nalgebra::Vector3<f64>, what: &'static str) -> crate::Result<()> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(SimError::NonFinite { what })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::InvalidBodyId(0x2a);
        assert!(err.to_string().contains("0x2a"));

        let err = SimError::TooManyRows {
            joint: 3,
            rows: 7,
            max: 6,
        };
        assert!(err.to_string().contains("7 rows"));

        let err = SimError::unsupported("set_axis", "ball");
        assert_eq!(err.to_string(), "set_axis is not supported by ball joints");
    }

    #[test]
    fn test_error_predicates() {
        assert!(SimError::InvalidJointId(1).is_invalid_handle());
        assert!(SimError::InvalidGroupId(1).is_invalid_handle());
        assert!(!SimError::JointInGroup(1).is_invalid_handle());

        let err = SimError::diverged("NaN in velocity");
        assert!(err.is_diverged());
        assert!(!err.is_config_error());

        let err = SimError::invalid_config("bad value");
        assert!(err.is_config_error());
        assert!(!err.is_diverged());
    }

    #[test]
    fn test_finite_guards() {
        assert!(ensure_finite(1.0, "x").is_ok());
        assert_eq!(
            ensure_finite(f64::NAN, "erp"),
            Err(SimError::NonFinite { what: "erp" })
        );
        let v = nalgebra::Vector3::new(0.0, f64::INFINITY, 0.0);
        assert!(ensure_finite_vector(&v, "force").is_err());
    }
}
