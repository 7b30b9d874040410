//! Ball-and-socket joint: one shared point, free rotation.

use nalgebra::Point3;
use sim_types::{JointKind, Result};

use crate::joint::{Anchors, Constraint};
use crate::row::{BodyPair, RowBlock, RowInfo, StepContext};

/// Keeps an anchor point coincident on both bodies with three unbounded rows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BallJoint {
    anchors: Anchors,
}

impl Constraint for BallJoint {
    fn kind(&self) -> JointKind {
        JointKind::Ball
    }

    fn row_info(&self, _bodies: &BodyPair<'_>) -> RowInfo {
        RowInfo::new(3, 0)
    }

    fn fill_rows(&self, ctx: &StepContext, bodies: &BodyPair<'_>, block: &mut RowBlock<'_>) {
        self.anchors.fill_rows(ctx, bodies, block, 0);
    }

    fn set_anchor(&mut self, bodies: &BodyPair<'_>, anchor: &Point3<f64>) -> Result<()> {
        self.anchors.set(bodies, anchor)
    }

    fn anchor(&self, bodies: &BodyPair<'_>) -> Result<Point3<f64>> {
        Ok(self.anchors.world_first(bodies))
    }

    fn anchor2(&self, bodies: &BodyPair<'_>) -> Result<Point3<f64>> {
        Ok(self.anchors.world_second(bodies))
    }
}
