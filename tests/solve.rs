//! End-to-end solves of small problems with known outcomes.
use approx::assert_abs_diff_eq;

use dualis::algorithm::dual_simplex::driver::solve;
use dualis::algorithm::dual_simplex::options::{DualEdgeWeightStrategy, SolverOptions};
use dualis::data::linear_program::elements::{Objective, SolveStatus, INF};
use dualis::data::linear_program::model::LpProblem;

fn problem(
    num_col: usize,
    num_row: usize,
    columns: Vec<Vec<(usize, f64)>>,
    col_cost: Vec<f64>,
    col_bounds: Vec<(f64, f64)>,
    row_bounds: Vec<(f64, f64)>,
    objective: Objective,
) -> LpProblem {
    let mut a_start = Vec::with_capacity(num_col + 1);
    let mut a_index = Vec::new();
    let mut a_value = Vec::new();
    for column in &columns {
        a_start.push(a_index.len());
        for &(row, value) in column {
            a_index.push(row);
            a_value.push(value);
        }
    }
    a_start.push(a_index.len());
    LpProblem {
        num_col,
        num_row,
        a_start,
        a_index,
        a_value,
        col_cost,
        col_lower: col_bounds.iter().map(|&(l, _)| l).collect(),
        col_upper: col_bounds.iter().map(|&(_, u)| u).collect(),
        row_lower: row_bounds.iter().map(|&(l, _)| l).collect(),
        row_upper: row_bounds.iter().map(|&(_, u)| u).collect(),
        objective,
        offset: 0.0,
        model_name: "test".to_string(),
        col_names: (0..num_col).map(|j| format!("x{}", j)).collect(),
        row_names: (0..num_row).map(|i| format!("r{}", i)).collect(),
    }
}

/// min -x0 - 2 x1 subject to x0 + x1 <= 4, x1 <= 3, x >= 0.
/// Optimum at (1, 3) with objective -7.
fn small_optimal() -> LpProblem {
    problem(
        2,
        2,
        vec![vec![(0, 1.0)], vec![(0, 1.0), (1, 1.0)]],
        vec![-1.0, -2.0],
        vec![(0.0, INF), (0.0, INF)],
        vec![(-INF, 4.0), (-INF, 3.0)],
        Objective::Minimize,
    )
}

#[test]
fn optimal_small_problem() {
    let result = solve(&small_optimal(), &SolverOptions::default());
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.objective, -7.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.primal[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.primal[1], 3.0, epsilon = 1e-6);
    assert!(result.iterations > 0);
}

#[test]
fn primal_and_dual_objectives_agree_at_the_optimum() {
    let result = solve(&small_optimal(), &SolverOptions::default());
    assert_abs_diff_eq!(result.objective, result.dual_objective, epsilon = 1e-5);
}

#[test]
fn prep_passes_do_not_change_the_optimum() {
    let mut options = SolverOptions::default();
    options.scale_lp = true;
    options.permute_lp = true;
    options.tighten_lp = true;
    let result = solve(&small_optimal(), &options);
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.objective, -7.0, epsilon = 1e-6);
}

#[test]
fn dantzig_pricing_finds_the_same_optimum() {
    let mut options = SolverOptions::default();
    options.dual_edge_weight_strategy = DualEdgeWeightStrategy::Dantzig;
    let result = solve(&small_optimal(), &options);
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.objective, -7.0, epsilon = 1e-6);
}

#[test]
fn maximization_flips_the_sense() {
    // max 3 x0 + 2 x1 subject to x0 + x1 <= 4, x0 <= 2: optimum (2, 2).
    let problem = problem(
        2,
        2,
        vec![vec![(0, 1.0), (1, 1.0)], vec![(0, 1.0)]],
        vec![3.0, 2.0],
        vec![(0.0, INF), (0.0, INF)],
        vec![(-INF, 4.0), (-INF, 2.0)],
        Objective::Maximize,
    );
    let result = solve(&problem, &SolverOptions::default());
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.objective, 10.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.primal[0], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.primal[1], 2.0, epsilon = 1e-6);
}

#[test]
fn unbounded_problem_is_detected() {
    // min -x subject to x >= 1, x >= 0 unbounded above.
    let problem = problem(
        1,
        1,
        vec![vec![(0, 1.0)]],
        vec![-1.0],
        vec![(0.0, INF)],
        vec![(1.0, INF)],
        Objective::Minimize,
    );
    let result = solve(&problem, &SolverOptions::default());
    assert_eq!(result.status, SolveStatus::Unbounded);
}

#[test]
fn infeasible_problem_is_detected() {
    // min x subject to x >= 2 while x <= 1.
    let problem = problem(
        1,
        1,
        vec![vec![(0, 1.0)]],
        vec![1.0],
        vec![(0.0, 1.0)],
        vec![(2.0, INF)],
        Objective::Minimize,
    );
    let result = solve(&problem, &SolverOptions::default());
    assert_eq!(result.status, SolveStatus::Infeasible);
}

#[test]
fn equality_row_with_boxed_columns() {
    // min x0 + x1 subject to x0 + x1 = 1, both in [0, 1].
    let problem = problem(
        2,
        1,
        vec![vec![(0, 1.0)], vec![(0, 1.0)]],
        vec![1.0, 1.0],
        vec![(0.0, 1.0), (0.0, 1.0)],
        vec![(1.0, 1.0)],
        Objective::Minimize,
    );
    let result = solve(&problem, &SolverOptions::default());
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.objective, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.primal[0] + result.primal[1], 1.0, epsilon = 1e-6);
}

#[test]
fn empty_row_set_returns_immediately() {
    let problem = problem(
        2,
        0,
        vec![vec![], vec![]],
        vec![1.0, -1.0],
        vec![(0.0, 5.0), (2.0, 3.0)],
        vec![],
        Objective::Minimize,
    );
    let mut options = SolverOptions::default();
    options.transpose_lp = true;
    let result = solve(&problem, &options);
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_eq!(result.iterations, 0);
    assert_eq!(result.objective, 0.0);
    assert_eq!(result.primal, vec![0.0, 2.0]);
}

#[test]
fn fixed_variable_never_moves() {
    // min x0 + x1 with x1 fixed at 5, x0 + x1 >= 6.
    let problem = problem(
        2,
        1,
        vec![vec![(0, 1.0)], vec![(0, 1.0)]],
        vec![1.0, 1.0],
        vec![(0.0, INF), (5.0, 5.0)],
        vec![(6.0, INF)],
        Objective::Minimize,
    );
    let result = solve(&problem, &SolverOptions::default());
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.primal[1], 5.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.objective, 6.0, epsilon = 1e-6);
}

#[test]
fn iteration_limit_is_respected() {
    let mut options = SolverOptions::default();
    options.iteration_limit = 0;
    let result = solve(&small_optimal(), &options);
    assert_eq!(result.status, SolveStatus::ReachedIterationLimit);
}

#[test]
fn time_limit_is_respected() {
    let mut options = SolverOptions::default();
    options.time_limit = 0.0;
    let result = solve(&small_optimal(), &options);
    assert_eq!(result.status, SolveStatus::OutOfTime);
}

#[test]
fn dual_objective_bound_exits_early() {
    let mut options = SolverOptions::default();
    options.dual_objective_value_upper_bound = -100.0;
    let result = solve(&small_optimal(), &options);
    assert_eq!(result.status, SolveStatus::ReachedDualObjectiveBound);
}

#[test]
fn offset_is_carried_into_the_objective() {
    let mut with_offset = small_optimal();
    with_offset.offset = 2.5;
    let result = solve(&with_offset, &SolverOptions::default());
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.objective, -4.5, epsilon = 1e-6);
}

#[test]
fn degenerate_objective_free_problem() {
    // All costs zero: any feasible basis is optimal.
    let problem = problem(
        2,
        1,
        vec![vec![(0, 1.0)], vec![(0, 1.0)]],
        vec![0.0, 0.0],
        vec![(0.0, INF), (0.0, INF)],
        vec![(-INF, 4.0)],
        Objective::Minimize,
    );
    let result = solve(&problem, &SolverOptions::default());
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.objective, 0.0, epsilon = 1e-9);
}
