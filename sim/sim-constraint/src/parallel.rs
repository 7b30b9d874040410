//! Parallel row filling using rayon.
//!
//! Linearisation is the only stage of a step that runs on several threads.
//! Each joint reads the immutable body snapshots and writes its own row
//! slice and effort slot, so tasks share nothing mutable.
//!
//! # Minimum Threshold
//!
//! Below [`MIN_JOINTS_FOR_PARALLEL`] joints the rows are filled on the
//! calling thread; for a handful of joints rayon's scheduling costs more
//! than the work.
//!
//! Assembly and the solve stay sequential, so results do not depend on
//! thread scheduling.

use rayon::prelude::*;

use crate::row::{BodyFrame, StepContext};
use crate::system::RowTask;

/// Joint count at which row filling is spread over the rayon pool.
pub const MIN_JOINTS_FOR_PARALLEL: usize = 64;

/// Fill every task, in parallel when there are enough of them.
pub(crate) fn fill_tasks(ctx: &StepContext, bodies: &[BodyFrame], tasks: Vec<RowTask<'_, '_>>) {
    if tasks.len() < MIN_JOINTS_FOR_PARALLEL {
        for task in tasks {
            task.fill(ctx, bodies);
        }
        return;
    }

    tasks
        .into_par_iter()
        .for_each(|task| task.fill(ctx, bodies));
}
