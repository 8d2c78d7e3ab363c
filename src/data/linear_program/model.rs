//! # The user-facing problem description
//!
//! Immutable once handed to the solver; the algorithm works on its own
//! scaled and possibly permuted copy.
use crate::data::linear_program::elements::Objective;

/// A linear program `min c'x` subject to `l_r <= Ax <= u_r` and
/// `l_c <= x <= u_c`, with the constraint matrix in compressed column
/// form. Bounds at magnitude [`crate::data::linear_program::elements::INF`]
/// and beyond are infinite.
#[derive(Debug, Clone)]
pub struct LpProblem {
    pub num_col: usize,
    pub num_row: usize,

    /// Column starts, `num_col + 1` entries.
    pub a_start: Vec<usize>,
    pub a_index: Vec<usize>,
    pub a_value: Vec<f64>,

    pub col_cost: Vec<f64>,
    pub col_lower: Vec<f64>,
    pub col_upper: Vec<f64>,
    pub row_lower: Vec<f64>,
    pub row_upper: Vec<f64>,

    pub objective: Objective,
    /// Constant added to the objective value.
    pub offset: f64,

    pub model_name: String,
    pub col_names: Vec<String>,
    pub row_names: Vec<String>,
}

impl LpProblem {
    pub fn num_tot(&self) -> usize {
        self.num_col + self.num_row
    }

    /// Cheap structural consistency check on the dimensions.
    pub fn dimensions_ok(&self) -> bool {
        self.a_start.len() == self.num_col + 1
            && self.a_index.len() == *self.a_start.last().unwrap_or(&0)
            && self.a_value.len() == self.a_index.len()
            && self.col_cost.len() == self.num_col
            && self.col_lower.len() == self.num_col
            && self.col_upper.len() == self.num_col
            && self.row_lower.len() == self.num_row
            && self.row_upper.len() == self.num_row
            && self.a_index.iter().all(|&i| i < self.num_row)
    }
}
