//! Contact descriptors handed to the engine by collision detection.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Geometry of one contact point.
///
/// `normal` points from the second body toward the first; `depth` is the
/// penetration along it (positive when overlapping).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactGeom {
    /// Contact point, world frame.
    pub position: Point3<f64>,
    /// Unit contact normal, world frame.
    pub normal: Vector3<f64>,
    /// Penetration depth.
    pub depth: f64,
}

impl ContactGeom {
    /// Create contact geometry.
    #[must_use]
    pub const fn new(position: Point3<f64>, normal: Vector3<f64>, depth: f64) -> Self {
        Self {
            position,
            normal,
            depth,
        }
    }
}

/// Surface parameters for one contact.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfaceParams {
    /// Coulomb friction coefficient. `0` disables friction, infinity never slips.
    pub mu: f64,
    /// Separate coefficient for the second friction direction.
    pub mu2: Option<f64>,
    /// Restitution in `[0, 1]`.
    pub bounce: f64,
    /// Minimum approach speed for restitution to apply.
    pub bounce_vel: f64,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            mu: 0.5,
            mu2: None,
            bounce: 0.0,
            bounce_vel: 0.0,
        }
    }
}

impl SurfaceParams {
    /// Frictionless, inelastic surface.
    #[must_use]
    pub fn frictionless() -> Self {
        Self {
            mu: 0.0,
            ..Self::default()
        }
    }

    /// Surface with friction `mu` on both directions.
    #[must_use]
    pub fn with_friction(mu: f64) -> Self {
        Self {
            mu,
            ..Self::default()
        }
    }

    /// Set a separate coefficient for the second friction direction.
    #[must_use]
    pub fn with_mu2(mut self, mu2: f64) -> Self {
        self.mu2 = Some(mu2);
        self
    }

    /// Enable restitution above `bounce_vel`.
    #[must_use]
    pub fn with_bounce(mut self, bounce: f64, bounce_vel: f64) -> Self {
        self.bounce = bounce;
        self.bounce_vel = bounce_vel;
        self
    }

    /// Coefficient used by the second friction row.
    #[must_use]
    pub fn second_mu(&self) -> f64 {
        self.mu2.unwrap_or(self.mu)
    }
}

/// A complete contact descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contact {
    /// Point, normal and depth.
    pub geom: ContactGeom,
    /// Friction and restitution.
    pub surface: SurfaceParams,
    /// First friction direction; derived from the normal when absent.
    pub friction_dir: Option<Vector3<f64>>,
}

impl Contact {
    /// Create a contact with the default surface.
    #[must_use]
    pub fn new(geom: ContactGeom) -> Self {
        Self {
            geom,
            surface: SurfaceParams::default(),
            friction_dir: None,
        }
    }

    /// Set the surface parameters.
    #[must_use]
    pub fn with_surface(mut self, surface: SurfaceParams) -> Self {
        self.surface = surface;
        self
    }

    /// Set the first friction direction.
    #[must_use]
    pub fn with_friction_dir(mut self, dir: Vector3<f64>) -> Self {
        self.friction_dir = Some(dir);
        self
    }

    /// Check the descriptor before it becomes a joint.
    pub fn validate(&self) -> crate::Result<()> {
        let g = &self.geom;
        if !g.position.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::NonFinite {
                what: "contact position",
            });
        }
        crate::error::ensure_finite_vector(&g.normal, "contact normal")?;
        crate::error::ensure_finite(g.depth, "contact depth")?;
        if g.normal.norm_squared() < 1e-12 {
            return Err(crate::SimError::degenerate_axis("contact normal is zero"));
        }

        let s = &self.surface;
        if s.mu.is_nan() || s.mu < 0.0 || s.second_mu().is_nan() || s.second_mu() < 0.0 {
            return Err(crate::SimError::invalid_config(
                "friction coefficients must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&s.bounce) {
            return Err(crate::SimError::invalid_config(
                "bounce must be between 0 and 1",
            ));
        }
        crate::error::ensure_finite(s.bounce_vel, "bounce velocity")?;

        if let Some(dir) = &self.friction_dir {
            crate::error::ensure_finite_vector(dir, "friction direction")?;
            let tangential = dir - g.normal * (dir.dot(&g.normal) / g.normal.norm_squared());
            if tangential.norm_squared() < 1e-12 {
                return Err(crate::SimError::degenerate_axis(
                    "friction direction is parallel to the normal",
                ));
            }
        }

        Ok(())
    }
}
