//! Linearisation of the active joints and assembly of the step problem.
//!
//! Rows are stored per joint, each joint owning a contiguous slice of
//! `row_info().total()` rows. The assembled problem orders every unbounded
//! row before every bounded one, which is the form [`LcpSolver`] expects.
//!
//! [`LcpSolver`]: crate::LcpSolver

use nalgebra::{DVector, Vector3};
use sim_types::JointFeedback;

use crate::joint::JointData;
use crate::row::{BodyFrame, BodyPair, Effort, Row, RowBlock, RowInfo, StepContext};
use crate::solver::LcpProblem;

/// A force and torque on one body, world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wrench {
    /// Force through the body origin.
    pub force: Vector3<f64>,
    /// Torque.
    pub torque: Vector3<f64>,
}

impl Default for Wrench {
    fn default() -> Self {
        Self {
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        }
    }
}

/// A joint taking part in this step, with body indices into the frame slice.
#[derive(Debug, Clone, Copy)]
pub struct JointEntry<'a> {
    /// Joint data.
    pub data: &'a JointData,
    /// Index of the first body.
    pub first: usize,
    /// Index of the second body, if any.
    pub second: Option<usize>,
    /// Row counts already queried for this step.
    pub info: RowInfo,
}

/// Where one joint's rows live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointSpan {
    /// First row.
    pub start: usize,
    /// Row counts.
    pub info: RowInfo,
    /// Index of the first body.
    pub first: usize,
    /// Index of the second body.
    pub second: Option<usize>,
}

impl JointSpan {
    fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.info.total()
    }
}

/// One joint's slice of rows together with what it needs to fill them.
pub(crate) struct RowTask<'t, 'j> {
    pub(crate) entry: &'t JointEntry<'j>,
    pub(crate) rows: &'t mut [Row],
    pub(crate) effort: &'t mut Effort,
}

impl RowTask<'_, '_> {
    pub(crate) fn fill(self, ctx: &StepContext, bodies: &[BodyFrame]) {
        let second = self.entry.second.map(|i| &bodies[i]);
        let pair = BodyPair::new(&bodies[self.entry.first], second);
        let mut block = RowBlock::new(self.rows, second.is_some(), self.effort);
        self.entry.data.fill_rows(ctx, &pair, &mut block);
    }
}

/// Every row of the current step.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSystem {
    rows: Vec<Row>,
    spans: Vec<JointSpan>,
    efforts: Vec<Effort>,
    /// Problem order: unbounded rows first.
    order: Vec<usize>,
    nub: usize,
}

impl ConstraintSystem {
    /// Fill the rows of every joint in `joints`.
    #[must_use]
    pub fn linearize(ctx: &StepContext, bodies: &[BodyFrame], joints: &[JointEntry<'_>]) -> Self {
        let mut spans = Vec::with_capacity(joints.len());
        let mut start = 0;
        for entry in joints {
            spans.push(JointSpan {
                start,
                info: entry.info,
                first: entry.first,
                second: entry.second,
            });
            start += entry.info.total();
        }

        let mut rows = vec![Row::default(); start];
        let mut efforts = vec![Effort::default(); joints.len()];
        {
            let mut rest = rows.as_mut_slice();
            let mut tasks = Vec::with_capacity(joints.len());
            for (entry, effort) in joints.iter().zip(efforts.iter_mut()) {
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(entry.info.total());
                rest = tail;
                tasks.push(RowTask {
                    entry,
                    rows: head,
                    effort,
                });
            }

            #[cfg(feature = "parallel")]
            crate::parallel::fill_tasks(ctx, bodies, tasks);
            #[cfg(not(feature = "parallel"))]
            for task in tasks {
                task.fill(ctx, bodies);
            }
        }

        let mut order = Vec::with_capacity(rows.len());
        for span in &spans {
            order.extend(span.start..span.start + span.info.unbounded);
        }
        let nub = order.len();
        for span in &spans {
            order.extend(span.start + span.info.unbounded..span.start + span.info.total());
        }

        Self {
            rows,
            spans,
            efforts,
            order,
            nub,
        }
    }

    /// All rows, joint by joint.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row extent of each joint, in input order.
    #[must_use]
    pub fn spans(&self) -> &[JointSpan] {
        &self.spans
    }

    /// Number of unbounded rows.
    #[must_use]
    pub fn unbounded_rows(&self) -> usize {
        self.nub
    }

    /// Number of bounded rows.
    #[must_use]
    pub fn bounded_rows(&self) -> usize {
        self.rows.len() - self.nub
    }

    /// Add the feed-forward efforts joints requested to `external`.
    pub fn add_efforts(&self, external: &mut [Wrench]) {
        for (span, effort) in self.spans.iter().zip(&self.efforts) {
            if effort.is_zero() {
                continue;
            }
            external[span.first].force += effort.force1;
            external[span.first].torque += effort.torque1;
            if let Some(b2) = span.second {
                external[b2].force += effort.force2;
                external[b2].torque += effort.torque2;
            }
        }
    }

    /// Build `A = J M⁻¹ Jᵀ + cfm/h` and `b = c/h - J (v/h + M⁻¹ f_ext)`.
    ///
    /// `cfm` is the world value; rows add their own on top of it. The
    /// multipliers solving the problem are constraint forces.
    #[must_use]
    pub fn assemble(
        &self,
        bodies: &[BodyFrame],
        external: &[Wrench],
        fps: f64,
        cfm: f64,
    ) -> LcpProblem {
        let n = self.rows.len();
        let mut problem = LcpProblem::unbounded(n);
        problem.nub = self.nub;

        // Body index of each row's slots, and M⁻¹ Jᵀ per slot.
        let slots: Vec<[(Option<usize>, Wrench); 2]> = self
            .spans
            .iter()
            .flat_map(|span| {
                span.rows().map(move |r| (r, span.first, span.second))
            })
            .map(|(r, b1, b2)| {
                let row = &self.rows[r];
                let f1 = &bodies[b1];
                let first = Wrench {
                    force: row.j1_linear * f1.inv_mass,
                    torque: f1.inv_inertia * row.j1_angular,
                };
                let second = b2.map_or_else(Wrench::default, |i| {
                    let f2 = &bodies[i];
                    Wrench {
                        force: row.j2_linear * f2.inv_mass,
                        torque: f2.inv_inertia * row.j2_angular,
                    }
                });
                [(Some(b1), first), (b2, second)]
            })
            .collect();

        let mut position = vec![0; n];
        for (p, &r) in self.order.iter().enumerate() {
            position[r] = p;
        }

        for (p, &i) in self.order.iter().enumerate() {
            for (q, &j) in self.order.iter().enumerate().skip(p) {
                let mut sum = 0.0;
                for (body, m_jt) in &slots[i] {
                    let Some(body) = *body else { continue };
                    for (slot, (other, _)) in slots[j].iter().enumerate() {
                        if *other == Some(body) {
                            let row = &self.rows[j];
                            let (lin, ang) = if slot == 0 {
                                (row.j1_linear, row.j1_angular)
                            } else {
                                (row.j2_linear, row.j2_angular)
                            };
                            sum += lin.dot(&m_jt.force) + ang.dot(&m_jt.torque);
                        }
                    }
                }
                problem.a[(p, q)] = sum;
                problem.a[(q, p)] = sum;
            }

            let row = &self.rows[i];
            problem.a[(p, p)] += (cfm + row.cfm) * fps;

            let mut jv = 0.0;
            for (slot, (body, _)) in slots[i].iter().enumerate() {
                let Some(body) = *body else { continue };
                let frame = &bodies[body];
                let ext = &external[body];
                let lin = frame.linear_velocity * fps + ext.force * frame.inv_mass;
                let ang = frame.angular_velocity * fps + frame.inv_inertia * ext.torque;
                jv += if slot == 0 {
                    row.j1_linear.dot(&lin) + row.j1_angular.dot(&ang)
                } else {
                    row.j2_linear.dot(&lin) + row.j2_angular.dot(&ang)
                };
            }
            problem.b[p] = row.rhs * fps - jv;
            problem.lo[p] = row.lo;
            problem.hi[p] = row.hi;
        }

        for span in &self.spans {
            for r in span.rows() {
                if let Some(f) = self.rows[r].findex {
                    problem.findex[position[r]] = Some(position[span.start + f]);
                }
            }
        }
        problem
    }

    /// Multipliers in problem order to row order.
    #[must_use]
    pub fn to_row_order(&self, lambda: &DVector<f64>) -> Vec<f64> {
        let mut out = vec![0.0; self.rows.len()];
        for (p, &r) in self.order.iter().enumerate() {
            out[r] = lambda[p];
        }
        out
    }

    /// Constraint wrench `Jᵀλ` on every body.
    #[must_use]
    pub fn body_forces(&self, lambda: &[f64], body_count: usize) -> Vec<Wrench> {
        let mut out = vec![Wrench::default(); body_count];
        for (k, span) in self.spans.iter().enumerate() {
            let fb = self.feedback(k, lambda);
            out[span.first].force += fb.force1;
            out[span.first].torque += fb.torque1;
            if let Some(b2) = span.second {
                out[b2].force += fb.force2;
                out[b2].torque += fb.torque2;
            }
        }
        out
    }

    /// Constraint forces joint `k` applied, from row-order multipliers.
    #[must_use]
    pub fn feedback(&self, k: usize, lambda: &[f64]) -> JointFeedback {
        let span = &self.spans[k];
        let mut fb = JointFeedback::default();
        for r in span.rows() {
            let row = &self.rows[r];
            let l = lambda[r];
            fb.force1 += row.j1_linear * l;
            fb.torque1 += row.j1_angular * l;
            if span.second.is_some() {
                fb.force2 += row.j2_linear * l;
                fb.torque2 += row.j2_angular * l;
            }
        }
        fb
    }
}
