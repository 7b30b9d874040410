//! The step pipeline.
//!
//! [`World::step`] advances every body by one fixed step:
//!
//! 1. snapshot bodies into read-only frames
//! 2. count rows per attached joint (rejecting joints that ask for too many)
//! 3. fill the rows, possibly in parallel
//! 4. assemble and solve for the constraint forces
//! 5. integrate with semi-implicit Euler and clear the accumulators
//!
//! Nothing is mutated before the row counts are known to be valid, so a
//! failed step leaves the world as it was.
//!
//! # Example
//!
//! ```
//! use sim_core::World;
//! use sim_types::WorldConfig;
//! use nalgebra::{Point3, Vector3};
//!
//! let config = WorldConfig::default().with_gravity(Vector3::new(0.0, -9.8, 0.0));
//! let mut world = World::new(config).unwrap();
//! let body = world.create_body();
//! world.set_position(body, Point3::new(0.0, 10.0, 0.0)).unwrap();
//!
//! for _ in 0..100 {
//!     world.step(0.01).unwrap();
//! }
//! assert!(world.body(body).unwrap().position().y < 10.0);
//! ```

use hashbrown::HashMap;
use sim_constraint::{
    BodyPair, ConstraintSystem, JointEntry, JointRecord, SolverReport, StepContext, Wrench,
};
use sim_types::{BodyId, JointId, Result, SimError, MAX_ROWS_PER_JOINT};
use tracing::{error, trace};

use crate::keys::Handle;
use crate::world::World;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Summary of one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepReport {
    /// Joints that contributed at least one row.
    pub active_joints: usize,
    /// Rows solved exactly.
    pub unbounded_rows: usize,
    /// Rows with force bounds.
    pub bounded_rows: usize,
    /// Solver outcome.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub solver: SolverReport,
}

impl World {
    /// Advance the simulation by `step_size` seconds.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidTimestep`] for a non-positive or non-finite step
    /// - [`SimError::TooManyRows`] if a joint asks for more rows than allowed;
    ///   the world is left untouched
    /// - [`SimError::Diverged`] if a body ends the step with non-finite state
    pub fn step(&mut self, step_size: f64) -> Result<StepReport> {
        if !step_size.is_finite() || step_size <= 0.0 {
            return Err(SimError::InvalidTimestep(step_size));
        }

        let gravity = self.config.gravity;
        let gyroscopic = self.config.gyroscopic;
        let mut index_of: HashMap<BodyId, usize> = HashMap::with_capacity(self.bodies.len());
        let mut frames = Vec::with_capacity(self.bodies.len());
        let mut external = Vec::with_capacity(self.bodies.len());
        for body in self.bodies.values() {
            index_of.insert(body.id(), frames.len());
            frames.push(body.frame());
            external.push(body.external_wrench(&gravity, gyroscopic));
        }

        let active = self.active_joints();
        let mut ids = Vec::with_capacity(active.len());
        let mut entries = Vec::with_capacity(active.len());
        for (id, record) in &active {
            let (Some(first), second) = record.bodies() else {
                continue;
            };
            let Some(&first) = index_of.get(&first) else {
                continue;
            };
            let second = second.and_then(|b| index_of.get(&b).copied());
            let pair = BodyPair::new(&frames[first], second.map(|i| &frames[i]));
            let info = record.data.row_info(&pair);
            if !info.is_valid() {
                return Err(SimError::TooManyRows {
                    joint: id.raw(),
                    rows: info.total(),
                    max: MAX_ROWS_PER_JOINT,
                });
            }
            if info.total() == 0 {
                continue;
            }
            ids.push(*id);
            entries.push(JointEntry {
                data: &record.data,
                first,
                second,
                info,
            });
        }
        self.compact_connections();

        let fps = step_size.recip();
        let ctx = StepContext {
            fps,
            erp: self.config.erp,
            contact_max_correcting_vel: self.config.contact_max_correcting_vel,
            contact_surface_layer: self.config.contact_surface_layer,
        };
        let system = ConstraintSystem::linearize(&ctx, &frames, &entries);
        system.add_efforts(&mut external);
        trace!(
            joints = entries.len(),
            unbounded = system.unbounded_rows(),
            bounded = system.bounded_rows(),
            "linearized constraints"
        );

        let problem = system.assemble(&frames, &external, fps, self.config.cfm);
        let (lambda, solver) = self.solver.solve(&problem);
        let lambda = system.to_row_order(&lambda);
        let constraint = system.body_forces(&lambda, frames.len());

        self.feedback.clear();
        for (k, id) in ids.iter().enumerate() {
            self.feedback.insert(*id, system.feedback(k, &lambda));
        }

        for (body, (ext, fc)) in self
            .bodies
            .values_mut()
            .zip(external.iter().zip(&constraint))
        {
            let total = Wrench {
                force: ext.force + fc.force,
                torque: ext.torque + fc.torque,
            };
            body.integrate(&total, step_size);
            body.clear_forces();
        }

        self.time += step_size;
        self.step_count += 1;
        self.last_step_size = Some(step_size);

        let report = StepReport {
            active_joints: entries.len(),
            unbounded_rows: system.unbounded_rows(),
            bounded_rows: system.bounded_rows(),
            solver,
        };
        self.last_step = Some(report);

        if let Some(body) = self.bodies().find(|b| !b.is_finite()) {
            let id = body.id();
            error!(body = %id, step = self.step_count, "non-finite body state");
            return Err(SimError::diverged(format!(
                "{id} has non-finite state after step {}",
                self.step_count
            )));
        }

        Ok(report)
    }

    /// Copies of every joint attached to at least one body.
    fn active_joints(&self) -> Vec<(JointId, JointRecord)> {
        let persistent = self
            .joints
            .iter()
            .map(|(key, record)| (JointId::from_key(key), *record));
        let grouped = self.groups.values().flat_map(|arena| {
            let group = arena.group();
            let epoch = arena.epoch();
            arena
                .iter()
                .map(move |(index, record)| (JointId::grouped(group, index, epoch), *record))
        });
        persistent
            .chain(grouped)
            .filter(|(_, record)| record.is_attached())
            .collect()
    }
}
