//! # Solve results
//!
//! What a solve reports back: a status, iteration count, objective values
//! and, when available, the primal and dual vectors in the original
//! (unscaled, unpermuted) variable space.
use crate::data::linear_program::elements::SolveStatus;
use crate::data::linear_program::model::LpProblem;

/// Outcome of a dual simplex run.
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub status: SolveStatus,
    /// Accepted pivots.
    pub iterations: usize,
    /// Primal objective value in the original problem space.
    pub objective: f64,
    pub dual_objective: f64,
    /// Primal values per original column; what the current basis implies on
    /// cancel-type statuses.
    pub primal: Vec<f64>,
    /// Dual values per original row.
    pub row_duals: Vec<f64>,
}

impl SolveResult {
    /// `(name, value)` pairs for all columns, named as in the original
    /// problem.
    pub fn named_values<'a>(&'a self, problem: &'a LpProblem) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        problem
            .col_names
            .iter()
            .map(String::as_str)
            .zip(self.primal.iter().copied())
    }
}
