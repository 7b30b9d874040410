//! Mixed LCP solver for the assembled constraint system.
//!
//! The problem is
//!
//! ```text
//! A·λ = b + w,   lo <= λ <= hi,   complementarity between λ and w
//! ```
//!
//! with the first `nub` rows unbounded. It is solved by block Gauss-Seidel:
//! every sweep solves the unbounded block exactly by Cholesky (with the
//! bounded multipliers held fixed), then relaxes each bounded row with
//! projected Gauss-Seidel and successive over-relaxation. Friction rows take
//! their bounds from the current multiplier of the row named by their
//! friction index.
//!
//! Sweeps stop when the largest multiplier change drops below the tolerance
//! or the budget runs out. Running out is not an error: the best multipliers
//! found are returned and the report says they did not converge.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use sim_types::SolverConfig;
use tracing::{debug, warn};

/// Pivots below this make the unbounded block count as singular.
const MIN_PIVOT: f64 = 1e-14;

/// One assembled step problem, rows permuted so unbounded rows come first.
#[derive(Debug, Clone)]
pub struct LcpProblem {
    /// `J M⁻¹ Jᵀ` plus constraint force mixing on the diagonal.
    pub a: DMatrix<f64>,
    /// Right-hand side.
    pub b: DVector<f64>,
    /// Lower bounds; for friction rows, `-mu`.
    pub lo: DVector<f64>,
    /// Upper bounds; for friction rows, `mu`.
    pub hi: DVector<f64>,
    /// Problem index of the row scaling each friction row's bounds.
    pub findex: Vec<Option<usize>>,
    /// Number of leading unbounded rows.
    pub nub: usize,
}

impl LcpProblem {
    /// An empty problem of `n` rows, every row unbounded.
    #[must_use]
    pub fn unbounded(n: usize) -> Self {
        Self {
            a: DMatrix::zeros(n, n),
            b: DVector::zeros(n),
            lo: DVector::from_element(n, f64::NEG_INFINITY),
            hi: DVector::from_element(n, f64::INFINITY),
            findex: vec![None; n],
            nub: n,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.b.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Bounds of row `i` given the current multipliers.
    fn bounds(&self, i: usize, lambda: &DVector<f64>) -> (f64, f64) {
        match self.findex[i] {
            Some(f) => {
                let limit = self.hi[i].abs() * lambda[f].abs();
                (-limit, limit)
            }
            None => (self.lo[i], self.hi[i]),
        }
    }
}

/// Outcome of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverReport {
    /// Rows in the problem.
    pub rows: usize,
    /// Sweeps performed.
    pub iterations: usize,
    /// Largest multiplier change in the final sweep.
    pub residual: f64,
    /// Whether the tolerance was met.
    pub converged: bool,
}

/// Block Gauss-Seidel solver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LcpSolver {
    config: SolverConfig,
}

impl LcpSolver {
    /// Create a solver.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// The solver configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve `problem` and return the multipliers in problem order.
    pub fn solve(&self, problem: &LcpProblem) -> (DVector<f64>, SolverReport) {
        let n = problem.len();
        let nub = problem.nub.min(n);
        let mut lambda = DVector::zeros(n);
        let mut report = SolverReport {
            rows: n,
            ..SolverReport::default()
        };
        if n == 0 {
            report.converged = true;
            return (lambda, report);
        }

        // Factor the unbounded block once; its matrix does not change.
        let factor = if nub > 0 {
            let factor = factor_unbounded(problem, nub);
            if factor.is_none() {
                debug!(nub, "unbounded block not positive definite, relaxing it row by row");
            }
            factor
        } else {
            None
        };

        if nub == n {
            if let Some(factor) = &factor {
                lambda.copy_from(&problem.b);
                factor.solve_mut(&mut lambda);
                report.iterations = 1;
                report.converged = true;
                return (lambda, report);
            }
        }

        let mut scratch = DVector::zeros(nub);
        if self.config.max_iterations == 0 {
            // No sweep budget: the unbounded block alone is the best we have.
            if let Some(factor) = &factor {
                solve_unbounded(problem, factor, &mut lambda, &mut scratch);
            }
            warn!(rows = n, "constraint solver has no sweep budget");
            return (lambda, report);
        }

        for sweep in 0..self.config.max_iterations {
            let mut delta: f64 = 0.0;

            match &factor {
                Some(factor) => delta = delta.max(solve_unbounded(problem, factor, &mut lambda, &mut scratch)),
                None => {
                    for i in 0..nub {
                        delta = delta.max(self.relax_row(problem, i, &mut lambda));
                    }
                }
            }
            for i in nub..n {
                delta = delta.max(self.relax_row(problem, i, &mut lambda));
            }

            report.iterations = sweep + 1;
            report.residual = delta;
            if delta < self.config.tolerance {
                report.converged = true;
                break;
            }
        }

        if !report.converged {
            warn!(
                rows = n,
                iterations = report.iterations,
                residual = report.residual,
                "constraint solver did not converge"
            );
        }
        (lambda, report)
    }

    /// Projected Gauss-Seidel update of row `i` with SOR; returns the change.
    fn relax_row(&self, problem: &LcpProblem, i: usize, lambda: &mut DVector<f64>) -> f64 {
        let a = &problem.a;
        let a_ii = a[(i, i)];
        if a_ii.abs() < MIN_PIVOT {
            return 0.0;
        }
        let mut sum = 0.0;
        for j in 0..problem.len() {
            if j != i {
                sum += a[(i, j)] * lambda[j];
            }
        }
        let x_gs = (problem.b[i] - sum) / a_ii;
        let omega = self.config.sor_factor;
        let relaxed = (1.0 - omega).mul_add(lambda[i], omega * x_gs);

        let (lo, hi) = problem.bounds(i, lambda);
        let clamped = relaxed.max(lo).min(hi);
        let change = (clamped - lambda[i]).abs();
        lambda[i] = clamped;
        change
    }
}

/// Solve the unbounded block with the bounded multipliers fixed; returns the
/// largest change.
fn solve_unbounded(
    problem: &LcpProblem,
    factor: &Cholesky<f64, Dyn>,
    lambda: &mut DVector<f64>,
    scratch: &mut DVector<f64>,
) -> f64 {
    let nub = scratch.len();
    let n = problem.len();
    for i in 0..nub {
        let mut rhs = problem.b[i];
        for j in nub..n {
            rhs -= problem.a[(i, j)] * lambda[j];
        }
        scratch[i] = rhs;
    }
    factor.solve_mut(scratch);

    let mut delta: f64 = 0.0;
    for i in 0..nub {
        delta = delta.max((scratch[i] - lambda[i]).abs());
        lambda[i] = scratch[i];
    }
    delta
}

/// Factor the leading `nub × nub` block, refusing near-singular pivots the
/// plain factorisation would still accept.
fn factor_unbounded(problem: &LcpProblem, nub: usize) -> Option<Cholesky<f64, Dyn>> {
    let block = problem.a.view((0, 0), (nub, nub)).into_owned();
    let factor = Cholesky::new(block)?;
    factor
        .l_dirty()
        .diagonal()
        .iter()
        .all(|&pivot| pivot * pivot > MIN_PIVOT)
        .then_some(factor)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spd3() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0])
    }

    #[test]
    fn test_unbounded_block_factors() {
        let mut problem = LcpProblem::unbounded(3);
        problem.a = spd3();
        assert!(factor_unbounded(&problem, 3).is_some());
        assert!(factor_unbounded(&problem, 2).is_some());
    }

    #[test]
    fn test_indefinite_block_is_relaxed() {
        // No Cholesky factor exists, so the rows are relaxed one by one.
        let mut problem = LcpProblem::unbounded(2);
        problem.a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(factor_unbounded(&problem, 2).is_none());

        problem.a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1e-20]);
        assert!(factor_unbounded(&problem, 2).is_none());
    }

    #[test]
    fn test_unbounded_system_is_exact() {
        let mut problem = LcpProblem::unbounded(3);
        problem.a = spd3();
        problem.b = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        let (lambda, report) = LcpSolver::default().solve(&problem);
        assert!(report.converged);
        assert_relative_eq!(&problem.a * &lambda, problem.b, epsilon = 1e-12);
    }

    #[test]
    fn test_bounds_are_respected() {
        // A unilateral row asked to pull: the multiplier stays at zero.
        let mut problem = LcpProblem::unbounded(1);
        problem.a[(0, 0)] = 2.0;
        problem.b[0] = -4.0;
        problem.lo[0] = 0.0;
        problem.nub = 0;

        let (lambda, report) = LcpSolver::default().solve(&problem);
        assert!(report.converged);
        assert_eq!(lambda[0], 0.0);

        problem.b[0] = 4.0;
        let (lambda, _) = LcpSolver::default().solve(&problem);
        assert_relative_eq!(lambda[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_friction_bounded_by_normal() {
        // Row 0 normal, row 1 friction with mu = 0.5 wanting far more force.
        let mut problem = LcpProblem::unbounded(2);
        problem.a = DMatrix::identity(2, 2);
        problem.b = DVector::from_vec(vec![2.0, 10.0]);
        problem.lo = DVector::from_vec(vec![0.0, -0.5]);
        problem.hi = DVector::from_vec(vec![f64::INFINITY, 0.5]);
        problem.findex[1] = Some(0);
        problem.nub = 0;

        let (lambda, report) = LcpSolver::default().solve(&problem);
        assert!(report.converged);
        assert_relative_eq!(lambda[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(lambda[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_budget_reports_non_convergence() {
        let mut problem = LcpProblem::unbounded(2);
        problem.a = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        problem.b = DVector::from_vec(vec![1.0, 1.0]);
        problem.lo[1] = 0.0;
        problem.nub = 1;

        let solver = LcpSolver::new(SolverConfig::default().with_max_iterations(0));
        let (lambda, report) = solver.solve(&problem);
        assert!(!report.converged);
        assert_eq!(report.iterations, 0);
        // The unbounded row is still solved with the bounded one at zero.
        assert_relative_eq!(lambda[0], 0.5, epsilon = 1e-12);
        assert_eq!(lambda[1], 0.0);
    }

    #[test]
    fn test_mixed_problem_converges() {
        let mut problem = LcpProblem::unbounded(3);
        problem.a = spd3();
        problem.b = DVector::from_vec(vec![1.0, -1.0, 2.0]);
        problem.lo[2] = 0.0;
        problem.nub = 2;

        let (lambda, report) = LcpSolver::default().solve(&problem);
        assert!(report.converged);
        assert!(lambda[2] >= 0.0);
        let w = &problem.a * &lambda - &problem.b;
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], 0.0, epsilon = 1e-6);
    }
}
