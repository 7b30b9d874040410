//! Body handles and mass descriptors.

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Generational handle to a body owned by a world.
///
/// The slot index is reused after the body is destroyed, the generation is
/// not: a handle kept past `destroy_body` is rejected instead of silently
/// aliasing the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId {
    index: u32,
    generation: u32,
}

impl BodyId {
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

    /// Rebuild a handle from [`BodyId::raw`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({}v{})", self.index, self.generation)
    }
}

/// Mass properties of a rigid body.
///
/// The inertia tensor is expressed about the centre of mass in body
/// coordinates. Worlds require the centre of mass to sit at the body origin,
/// so `center_of_mass` is kept only so descriptors built elsewhere can be
/// checked before they are accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass in kg.
    pub mass: f64,
    /// Centre of mass offset from the body origin, body frame.
    pub center_of_mass: Vector3<f64>,
    /// Inertia tensor about the centre of mass, body frame (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl Default for MassProperties {
    /// Unit mass with identity inertia.
    fn default() -> Self {
        Self::new(1.0, Vector3::zeros(), Matrix3::identity())
    }
}

impl MassProperties {
    /// Create mass properties with given values.
    #[must_use]
    pub const fn new(mass: f64, center_of_mass: Vector3<f64>, inertia: Matrix3<f64>) -> Self {
        Self {
            mass,
            center_of_mass,
            inertia,
        }
    }

    /// Solid sphere: `I = 2/5 m r²` on every axis.
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self::new(mass, Vector3::zeros(), Matrix3::from_diagonal_element(i))
    }

    /// Solid box given its half extents.
    #[must_use]
    pub fn box_shape(mass: f64, half_extents: Vector3<f64>) -> Self {
        let full = half_extents * 2.0;
        let sq = full.component_mul(&full);
        let diag = Vector3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0);
        Self::new(mass, Vector3::zeros(), Matrix3::from_diagonal(&diag))
    }

    /// Solid cylinder with its axis along body Z.
    #[must_use]
    pub fn cylinder(mass: f64, radius: f64, half_height: f64) -> Self {
        let r2 = radius * radius;
        let len2 = 4.0 * half_height * half_height;
        let side = mass * (3.0 * r2 + len2) / 12.0;
        let axial = 0.5 * mass * r2;
        Self::new(
            mass,
            Vector3::zeros(),
            Matrix3::from_diagonal(&Vector3::new(side, side, axial)),
        )
    }

    /// Scale the mass and inertia so the total mass becomes `new_mass`.
    #[must_use]
    pub fn adjusted(mut self, new_mass: f64) -> Self {
        if self.mass > 0.0 {
            let s = new_mass / self.mass;
            self.inertia *= s;
        }
        self.mass = new_mass;
        self
    }

    /// Inverse mass. Only meaningful after [`MassProperties::validate`].
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        1.0 / self.mass
    }

    /// Inverse inertia tensor, `None` if singular.
    #[must_use]
    pub fn inverse_inertia(&self) -> Option<Matrix3<f64>> {
        self.inertia.try_inverse()
    }

    /// Check that the descriptor describes a physical dynamic body.
    ///
    /// Mass must be positive and finite; inertia must be finite, symmetric
    /// and positive definite.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "mass must be positive and finite, got {}",
                self.mass
            )));
        }

        if !self.center_of_mass.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass(
                "center of mass must be finite",
            ));
        }

        if !self.inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass("inertia must be finite"));
        }

        let asym = (self.inertia - self.inertia.transpose()).abs().max();
        if asym > 1e-9 * self.inertia.abs().max().max(1.0) {
            return Err(crate::SimError::invalid_mass("inertia must be symmetric"));
        }

        if self.inertia.symmetric_eigenvalues().iter().any(|&e| e <= 0.0) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive definite",
            ));
        }

        Ok(())
    }
}
