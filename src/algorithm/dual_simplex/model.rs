//! # The solver's working copy of the problem
//!
//! The solver never mutates the user's [`LpProblem`]; it derives a
//! [`SimplexLp`] that the preparation passes transpose, scale, permute and
//! tighten in place. A flag set records which passes ran and which derived
//! data (basis, matrix copies, factorization, primal/dual values) are
//! currently valid.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::linear_program::elements::Objective;
use crate::data::linear_program::model::LpProblem;

/// Seed of the stream driving the column permutation.
const PERMUTATION_STREAM_SEED: u64 = 0x9e3779b97f4a7c15;
/// Seed of the stream driving cost perturbation.
const PERTURBATION_STREAM_SEED: u64 = 0x6a09e667f3bcc909;

/// Scaling factors relating the working copy to the original problem:
/// `A'[i][j] = A[i][j] * col[j] * row[i]`, costs multiplied by
/// `col[j] * cost`, column bounds divided by `col[j]`, row bounds
/// multiplied by `row[i]`.
#[derive(Debug, Clone)]
pub struct Scale {
    pub col: Vec<f64>,
    pub row: Vec<f64>,
    pub cost: f64,
}

impl Scale {
    pub fn identity(num_col: usize, num_row: usize) -> Self {
        Self {
            col: vec![1.0; num_col],
            row: vec![1.0; num_row],
            cost: 1.0,
        }
    }
}

/// Which preparation passes ran and which derived state is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusFlags {
    pub is_transposed: bool,
    pub is_scaled: bool,
    pub is_permuted: bool,
    pub is_tightened: bool,

    pub has_basis: bool,
    pub has_matrix_col_wise: bool,
    pub has_matrix_row_wise: bool,
    pub has_factor: bool,
    pub has_invert: bool,
    pub has_fresh_invert: bool,
    pub has_fresh_rebuild: bool,
    pub has_dse_weights: bool,
    pub has_basic_primals: bool,
    pub has_nonbasic_duals: bool,
    pub has_dual_objective: bool,
}

impl StatusFlags {
    /// Every structural change to the working copy invalidates all derived
    /// state.
    pub fn invalidate_derived(&mut self) {
        self.has_basis = false;
        self.has_matrix_col_wise = false;
        self.has_matrix_row_wise = false;
        self.has_factor = false;
        self.has_invert = false;
        self.has_fresh_invert = false;
        self.has_fresh_rebuild = false;
        self.has_dse_weights = false;
        self.has_basic_primals = false;
        self.has_nonbasic_duals = false;
        self.has_dual_objective = false;
    }
}

/// The working copy: same shape as [`LpProblem`] plus scaling factors,
/// status flags and the deterministic random vectors.
#[derive(Debug, Clone)]
pub struct SimplexLp {
    pub num_col: usize,
    pub num_row: usize,

    pub a_start: Vec<usize>,
    pub a_index: Vec<usize>,
    pub a_value: Vec<f64>,

    pub col_cost: Vec<f64>,
    pub col_lower: Vec<f64>,
    pub col_upper: Vec<f64>,
    pub row_lower: Vec<f64>,
    pub row_upper: Vec<f64>,

    /// `+1` minimize, `-1` maximize; applied when work costs are set up.
    pub sense: f64,
    pub offset: f64,

    pub scale: Scale,
    pub flags: StatusFlags,

    /// Column `i` of the working copy is column `col_permutation[i]` of the
    /// pre-permutation copy. Identity until the permute pass runs.
    pub col_permutation: Vec<usize>,
    /// One uniform `[0, 1)` draw per extended variable; consumed by cost
    /// perturbation. Regenerated identically on every solve.
    pub random_value: Vec<f64>,
}

impl SimplexLp {
    pub fn from_problem(problem: &LpProblem) -> Self {
        let num_col = problem.num_col;
        let num_row = problem.num_row;
        let mut lp = Self {
            num_col,
            num_row,
            a_start: problem.a_start.clone(),
            a_index: problem.a_index.clone(),
            a_value: problem.a_value.clone(),
            col_cost: problem.col_cost.clone(),
            col_lower: problem.col_lower.clone(),
            col_upper: problem.col_upper.clone(),
            row_lower: problem.row_lower.clone(),
            row_upper: problem.row_upper.clone(),
            sense: problem.objective.sense(),
            offset: problem.offset,
            scale: Scale::identity(num_col, num_row),
            flags: StatusFlags::default(),
            col_permutation: (0..num_col).collect(),
            random_value: Vec::new(),
        };
        lp.initialise_random_vectors();
        lp
    }

    pub fn num_tot(&self) -> usize {
        self.num_col + self.num_row
    }

    pub fn is_maximization(&self) -> bool {
        self.sense == Objective::Maximize.sense()
    }

    /// (Re-)generate the per-variable random reals. Sized to the current
    /// dimensions, so the transpose pass re-runs this.
    pub fn initialise_random_vectors(&mut self) {
        let mut perturbation_stream = StdRng::seed_from_u64(PERTURBATION_STREAM_SEED);
        self.random_value = (0..self.num_tot())
            .map(|_| perturbation_stream.gen::<f64>())
            .collect();
    }

    /// A fresh instance of the permutation stream; the permute pass draws
    /// its Fisher-Yates swaps from this.
    pub fn permutation_stream(&self) -> StdRng {
        StdRng::seed_from_u64(PERMUTATION_STREAM_SEED)
    }
}
