//! Orientation integration.
//!
//! Bodies advance with semi-implicit Euler (see `Body::integrate`):
//!
//! ```text
//! v(t+h) = v(t) + M⁻¹ (f_ext + f_c) * h
//! x(t+h) = x(t) + v(t+h) * h
//! ```
//!
//! The orientation follows the same scheme with the quaternion derivative
//! `q̇ = ½ (0, ω) ⊗ q`, renormalised after every update.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Advance `rotation` by world angular velocity `omega` over `dt`.
///
/// First-order update followed by normalisation. A degenerate result (which
/// only a non-finite `omega` can produce) leaves the orientation unchanged.
#[must_use]
pub fn integrate_rotation(
    rotation: &UnitQuaternion<f64>,
    omega: &Vector3<f64>,
    dt: f64,
) -> UnitQuaternion<f64> {
    if omega.norm_squared() == 0.0 {
        return *rotation;
    }

    let q = rotation.quaternion();
    let w = Quaternion::from_parts(0.0, *omega);
    let dq = (w * q) * (0.5 * dt);
    let next = q + dq;

    UnitQuaternion::try_new(next, f64::EPSILON).unwrap_or(*rotation)
}

/// Rotation matrix of a unit quaternion.
#[must_use]
pub fn rotation_matrix(rotation: &UnitQuaternion<f64>) -> Matrix3<f64> {
    *rotation.to_rotation_matrix().matrix()
}
