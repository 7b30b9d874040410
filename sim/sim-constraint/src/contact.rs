//! Contact joint: non-penetration and Coulomb friction at one point.
//!
//! Row 0 pushes along the normal with a non-negative multiplier. Up to two
//! friction rows follow, each bounded by `mu` times the normal multiplier
//! through the friction index.

use nalgebra::Vector3;
use sim_types::{Contact, JointKind, Result, SimError};

use crate::joint::{plane_space, Constraint};
use crate::row::{BodyPair, RowBlock, RowInfo, StepContext};

/// A contact descriptor turned into constraint rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactJoint {
    contact: Contact,
    /// Unit normal as given by the descriptor.
    normal: Vector3<f64>,
    /// The client attached `(None, body)`: flip the normal so it still
    /// points toward the body they named first.
    reversed: bool,
}

impl ContactJoint {
    /// Validate the descriptor and build the joint.
    pub fn new(contact: Contact) -> Result<Self> {
        contact.validate()?;
        let normal = contact
            .geom
            .normal
            .try_normalize(1e-12)
            .ok_or_else(|| SimError::degenerate_axis("contact normal is zero"))?;
        Ok(Self {
            contact,
            normal,
            reversed: false,
        })
    }

    /// The descriptor this joint was built from.
    #[must_use]
    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub(crate) fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    /// Normal pointing toward the first stored body.
    #[must_use]
    pub fn effective_normal(&self) -> Vector3<f64> {
        if self.reversed {
            -self.normal
        } else {
            self.normal
        }
    }

    /// Friction coefficients of the rows in use, in row order.
    fn friction_coefficients(&self) -> [Option<f64>; 2] {
        let s = &self.contact.surface;
        let used = |mu: f64| (mu > 0.0).then_some(mu);
        [used(s.mu), used(s.second_mu())]
    }

    fn friction_directions(&self, n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
        let given = self.contact.friction_dir.and_then(|d| {
            let tangential = d - n * d.dot(n);
            tangential.try_normalize(1e-12)
        });
        match given {
            Some(t1) => (t1, n.cross(&t1)),
            None => plane_space(n),
        }
    }
}

impl Constraint for ContactJoint {
    fn kind(&self) -> JointKind {
        JointKind::Contact
    }

    fn row_info(&self, _bodies: &BodyPair<'_>) -> RowInfo {
        let friction = self.friction_coefficients().iter().flatten().count();
        RowInfo::new(0, 1 + friction)
    }

    fn fill_rows(&self, ctx: &StepContext, bodies: &BodyPair<'_>, block: &mut RowBlock<'_>) {
        let n = self.effective_normal();
        let point = self.contact.geom.position;
        let c1 = point - bodies.first.position;
        let c2 = bodies.second.map(|b2| point - b2.position);

        let set_direction = |block: &mut RowBlock<'_>, row: usize, dir: &Vector3<f64>| {
            block.set_first(row, *dir, c1.cross(dir));
            if let Some(c2) = &c2 {
                block.set_second(row, -dir, -c2.cross(dir));
            }
        };

        set_direction(block, 0, &n);
        let depth = (self.contact.geom.depth - ctx.contact_surface_layer).max(0.0);
        let mut rhs = (ctx.gain() * depth).min(ctx.contact_max_correcting_vel);

        let surface = &self.contact.surface;
        if surface.bounce > 0.0 {
            // Negative for an approaching contact.
            let outgoing = block.row(0).velocity(bodies);
            if surface.bounce_vel >= 0.0 && -outgoing > surface.bounce_vel {
                rhs = rhs.max(-surface.bounce * outgoing);
            }
        }
        block.set_rhs(0, rhs);
        block.set_bounds(0, 0.0, f64::INFINITY);

        let (t1, t2) = self.friction_directions(&n);
        let mut row = 1;
        for (mu, dir) in self.friction_coefficients().into_iter().zip([t1, t2]) {
            let Some(mu) = mu else { continue };
            set_direction(block, row, &dir);
            if mu.is_finite() {
                block.set_bounds(row, -mu, mu);
                block.set_friction_index(row, 0);
            }
            row += 1;
        }
    }
}
