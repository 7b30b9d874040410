//! World and solver configuration.
//!
//! Defaults follow the usual constraint-engine conventions: no gravity until
//! the client sets one, ERP 0.2 and a tiny CFM for conditioning.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ensure_finite_vector};

/// Global parameters of a world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldConfig {
    /// Gravity acceleration applied to every body (m/s²).
    pub gravity: Vector3<f64>,
    /// Error-reduction parameter in `[0, 1]`: share of positional error
    /// corrected per step.
    pub erp: f64,
    /// Constraint force mixing added to the system diagonal.
    pub cfm: f64,
    /// Include the gyroscopic torque `-ω × (I ω)` in the external forces.
    pub gyroscopic: bool,
    /// Cap on the separating speed contact rows may request to fix penetration.
    pub contact_max_correcting_vel: f64,
    /// Penetration tolerated before contact rows start correcting it.
    pub contact_surface_layer: f64,
    /// Iterative solver settings.
    pub solver: SolverConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::zeros(),
            erp: 0.2,
            cfm: 1e-10,
            gyroscopic: true,
            contact_max_correcting_vel: f64::INFINITY,
            contact_surface_layer: 0.0,
            solver: SolverConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Earth gravity along -Z.
    #[must_use]
    pub fn earth() -> Self {
        Self::default().with_gravity(Vector3::new(0.0, 0.0, -9.81))
    }

    /// Set the gravity vector.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the error-reduction parameter.
    #[must_use]
    pub fn with_erp(mut self, erp: f64) -> Self {
        self.erp = erp;
        self
    }

    /// Set constraint force mixing.
    #[must_use]
    pub fn with_cfm(mut self, cfm: f64) -> Self {
        self.cfm = cfm;
        self
    }

    /// Enable or disable the gyroscopic term.
    #[must_use]
    pub fn with_gyroscopic(mut self, enabled: bool) -> Self {
        self.gyroscopic = enabled;
        self
    }

    /// Cap the correcting velocity of contact rows.
    #[must_use]
    pub fn with_contact_max_correcting_vel(mut self, vel: f64) -> Self {
        self.contact_max_correcting_vel = vel;
        self
    }

    /// Set the contact surface layer depth.
    #[must_use]
    pub fn with_contact_surface_layer(mut self, depth: f64) -> Self {
        self.contact_surface_layer = depth;
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        ensure_finite_vector(&self.gravity, "gravity")?;
        ensure_finite(self.erp, "erp")?;
        ensure_finite(self.cfm, "cfm")?;

        if !(0.0..=1.0).contains(&self.erp) {
            return Err(crate::SimError::invalid_config(format!(
                "erp must be between 0 and 1, got {}",
                self.erp
            )));
        }

        if self.cfm < 0.0 {
            return Err(crate::SimError::invalid_config("cfm cannot be negative"));
        }

        if self.contact_max_correcting_vel.is_nan() || self.contact_max_correcting_vel < 0.0 {
            return Err(crate::SimError::invalid_config(
                "contact_max_correcting_vel cannot be negative",
            ));
        }

        ensure_finite(self.contact_surface_layer, "contact_surface_layer")?;
        if self.contact_surface_layer < 0.0 {
            return Err(crate::SimError::invalid_config(
                "contact_surface_layer cannot be negative",
            ));
        }

        self.solver.validate()
    }
}

/// Settings for the block Gauss-Seidel LCP solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Maximum number of sweeps over the bounded rows.
    pub max_iterations: usize,
    /// Sweeps stop once the largest multiplier change falls below this.
    pub tolerance: f64,
    /// Successive over-relaxation factor for bounded rows, in `(0, 2)`.
    pub sor_factor: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            sor_factor: 1.0,
        }
    }
}

impl SolverConfig {
    /// Few sweeps with mild over-relaxation.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-5,
            sor_factor: 1.2,
        }
    }

    /// Many sweeps, tight tolerance.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-12,
            sor_factor: 1.0,
        }
    }

    /// Set the sweep budget.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the SOR factor.
    #[must_use]
    pub const fn with_sor_factor(mut self, factor: f64) -> Self {
        self.sor_factor = factor;
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "tolerance must be positive",
            ));
        }

        if !(self.sor_factor > 0.0 && self.sor_factor < 2.0) {
            return Err(crate::SimError::invalid_config(
                "sor_factor must be in (0, 2)",
            ));
        }

        Ok(())
    }
}
