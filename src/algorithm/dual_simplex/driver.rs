//! # The solve driver
//!
//! Ties the pieces together: derives the working copy, runs the enabled
//! preparation passes, hands the problem to the dual simplex and maps the
//! solution back to the original variable space (unscaled, unpermuted,
//! untransposed).
use log::debug;

use crate::algorithm::dual_simplex::basis::{Basis, MOVE_ZERO, NONBASIC};
use crate::algorithm::dual_simplex::model::SimplexLp;
use crate::algorithm::dual_simplex::options::SolverOptions;
use crate::algorithm::dual_simplex::prep;
use crate::algorithm::dual_simplex::solver::DualSimplex;
use crate::data::linear_program::elements::{is_infinite, SolveStatus};
use crate::data::linear_program::model::LpProblem;
use crate::data::linear_program::solution::SolveResult;

/// Solve a linear program with the revised dual simplex, starting from the
/// all-logicals basis.
pub fn solve(problem: &LpProblem, options: &SolverOptions) -> SolveResult {
    solve_with_basis(problem, options, None)
}

/// Solve from a caller-supplied basis (e.g. a crash basis or a warm
/// start).
pub fn solve_with_basis(
    problem: &LpProblem,
    options: &SolverOptions,
    initial_basis: Option<Basis>,
) -> SolveResult {
    if !problem.dimensions_ok() {
        return SolveResult {
            status: SolveStatus::Failed,
            iterations: 0,
            objective: 0.0,
            dual_objective: 0.0,
            primal: vec![0.0; problem.num_col],
            row_duals: vec![0.0; problem.num_row],
        };
    }
    if problem.num_row == 0 {
        return solve_without_rows(problem);
    }

    let mut lp = SimplexLp::from_problem(problem);
    if options.transpose_lp {
        prep::transpose(&mut lp);
    }
    if options.scale_lp {
        prep::scale(&mut lp);
    }
    if options.permute_lp {
        prep::permute(&mut lp);
    }
    if options.tighten_lp {
        prep::tighten(&mut lp);
    }

    let mut simplex = DualSimplex::new(lp, options, initial_basis);
    let mut status = simplex.run();
    debug!(
        "solve finished: {} after {} iterations",
        status, simplex.iteration_count
    );

    let transposed = simplex.lp.flags.is_transposed;
    if transposed {
        // The working problem was the dual: its infeasibility means the
        // original is unbounded and vice versa.
        status = match status {
            SolveStatus::Infeasible => SolveStatus::Unbounded,
            SolveStatus::Unbounded => SolveStatus::Infeasible,
            other => other,
        };
    }

    let (primal, row_duals) = recover_solution(problem, &simplex, transposed);
    let (objective, dual_objective) = if transposed {
        // The working problem minimized the negated dual objective.
        let objective = primal
            .iter()
            .zip(problem.col_cost.iter())
            .map(|(&x, &c)| x * c)
            .sum::<f64>()
            + problem.offset;
        (objective, -simplex.reported_dual_objective() + problem.offset)
    } else {
        (
            simplex.compute_primal_objective() + simplex.lp.offset,
            simplex.reported_dual_objective(),
        )
    };

    SolveResult {
        status,
        iterations: simplex.iteration_count,
        objective,
        dual_objective,
        primal,
        row_duals,
    }
}

/// Values of the working problem's variables, mapped to the original
/// space.
fn recover_solution(
    problem: &LpProblem,
    simplex: &DualSimplex,
    transposed: bool,
) -> (Vec<f64>, Vec<f64>) {
    let lp = &simplex.lp;
    let basis = &simplex.basis;

    // Working values per working column, unscaled and unpermuted.
    let mut row_of_basic = vec![usize::MAX; lp.num_tot()];
    for r in 0..lp.num_row {
        row_of_basic[basis.basic_index[r]] = r;
    }
    let mut working_primal = vec![0.0; lp.num_col];
    for j in 0..lp.num_col {
        let scaled = if basis.nonbasic_flag[j] == NONBASIC {
            basis.work_value[j]
        } else {
            basis.base_value[row_of_basic[j]]
        };
        working_primal[lp.col_permutation[j]] = scaled * lp.scale.col[j];
    }

    // Working row duals, unscaled: the dual of a logical is the negated
    // row multiplier.
    let mut working_duals = vec![0.0; lp.num_row];
    for r in 0..lp.num_row {
        let pi = -basis.work_dual[lp.num_col + r];
        working_duals[r] = lp.sense * lp.scale.cost * lp.scale.row[r] * pi;
    }

    if !transposed {
        (working_primal, working_duals)
    } else {
        // The working problem was the dual: its row multipliers carry the
        // original primal values, its variable values the original row
        // multipliers.
        debug_assert_eq!(lp.num_row, problem.num_col);
        let primal = working_duals.iter().map(|&pi| -pi).collect();
        (primal, working_primal)
    }
}

/// With no rows, every column simply rests on a bound.
fn solve_without_rows(problem: &LpProblem) -> SolveResult {
    let primal = (0..problem.num_col)
        .map(|j| {
            let lower = problem.col_lower[j];
            let upper = problem.col_upper[j];
            if !is_infinite(-lower) {
                lower
            } else if !is_infinite(upper) {
                upper
            } else {
                0.0
            }
        })
        .collect();
    SolveResult {
        status: SolveStatus::Optimal,
        iterations: 0,
        objective: problem.offset,
        dual_objective: problem.offset,
        primal,
        row_duals: Vec::new(),
    }
}

/// Builder for a caller-supplied initial basis in the original variable
/// space; checks the basic count before the solver ever sees it.
pub fn basis_from_flags(
    problem: &LpProblem,
    nonbasic_flag: Vec<i8>,
    nonbasic_move: Option<Vec<i8>>,
) -> Option<Basis> {
    let moves =
        nonbasic_move.unwrap_or_else(|| vec![MOVE_ZERO; problem.num_col + problem.num_row]);
    Basis::from_nonbasic_flags(problem.num_col, problem.num_row, nonbasic_flag, moves).ok()
}
