//! # The simplex basis
//!
//! Partitions the `num_col + num_row` extended variables (structural
//! columns first, one logical slack per row after them) into `num_row`
//! basic and the rest nonbasic, and owns every per-variable working array
//! the iteration touches. The whole mutation set of a pivot --
//! `basic_index`, `nonbasic_flag`, `nonbasic_move`, `work_value` -- lives
//! in this one structure and changes through [`Basis::update_pivots`]
//! alone, so no caller can observe a half-applied basis change.
use log::warn;

use crate::algorithm::dual_simplex::model::SimplexLp;
use crate::data::linear_program::elements::is_infinite;

/// `nonbasic_flag` values.
pub const NONBASIC: i8 = 1;
pub const BASIC: i8 = 0;

/// `nonbasic_move` values: the direction a nonbasic variable may move.
pub const MOVE_UP: i8 = 1;
pub const MOVE_DOWN: i8 = -1;
pub const MOVE_ZERO: i8 = 0;

/// Perturbation base relative to the cost magnitude measure.
const PERTURBATION_BASE: f64 = 5e-7;

/// A supplied basis that does not contain exactly `num_row` basic
/// variables.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidBasis {
    pub num_basic: usize,
    pub num_row: usize,
}

#[derive(Debug, Clone)]
pub struct Basis {
    num_col: usize,
    num_row: usize,

    /// 1 = nonbasic, 0 = basic, per extended variable.
    pub nonbasic_flag: Vec<i8>,
    /// +1 at lower bound, -1 at upper bound, 0 fixed/free/basic.
    pub nonbasic_move: Vec<i8>,
    /// Variable occupying each row position of the basis matrix.
    pub basic_index: Vec<usize>,

    pub work_cost: Vec<f64>,
    pub work_shift: Vec<f64>,
    pub work_dual: Vec<f64>,
    pub work_lower: Vec<f64>,
    pub work_upper: Vec<f64>,
    pub work_range: Vec<f64>,
    pub work_value: Vec<f64>,

    pub base_lower: Vec<f64>,
    pub base_upper: Vec<f64>,
    pub base_value: Vec<f64>,

    pub num_basic_logicals: usize,
    pub costs_perturbed: bool,
}

impl Basis {
    fn allocate(num_col: usize, num_row: usize) -> Self {
        let num_tot = num_col + num_row;
        Self {
            num_col,
            num_row,
            nonbasic_flag: vec![NONBASIC; num_tot],
            nonbasic_move: vec![MOVE_ZERO; num_tot],
            basic_index: vec![0; num_row],
            work_cost: vec![0.0; num_tot],
            work_shift: vec![0.0; num_tot],
            work_dual: vec![0.0; num_tot],
            work_lower: vec![0.0; num_tot],
            work_upper: vec![0.0; num_tot],
            work_range: vec![0.0; num_tot],
            work_value: vec![0.0; num_tot],
            base_lower: vec![0.0; num_row],
            base_upper: vec![0.0; num_row],
            base_value: vec![0.0; num_row],
            num_basic_logicals: 0,
            costs_perturbed: false,
        }
    }

    /// The all-logicals basis: every slack basic, every structural
    /// nonbasic.
    pub fn logical(num_col: usize, num_row: usize) -> Self {
        let mut basis = Self::allocate(num_col, num_row);
        for row in 0..num_row {
            let var = num_col + row;
            basis.basic_index[row] = var;
            basis.nonbasic_flag[var] = BASIC;
        }
        basis.num_basic_logicals = num_row;
        basis
    }

    /// Build from caller-supplied nonbasic flags (and optional moves),
    /// deriving `basic_index` by scanning the flags in variable order.
    pub fn from_nonbasic_flags(
        num_col: usize,
        num_row: usize,
        nonbasic_flag: Vec<i8>,
        nonbasic_move: Vec<i8>,
    ) -> Result<Self, InvalidBasis> {
        debug_assert_eq!(nonbasic_flag.len(), num_col + num_row);
        let mut basis = Self::allocate(num_col, num_row);
        basis.nonbasic_flag = nonbasic_flag;
        basis.nonbasic_move = nonbasic_move;

        let mut num_basic = 0;
        for var in 0..num_col + num_row {
            if basis.nonbasic_flag[var] == BASIC {
                if num_basic < num_row {
                    basis.basic_index[num_basic] = var;
                    if var >= num_col {
                        basis.num_basic_logicals += 1;
                    }
                }
                num_basic += 1;
            }
        }
        if num_basic != num_row {
            return Err(InvalidBasis { num_basic, num_row });
        }
        Ok(basis)
    }

    pub fn num_col(&self) -> usize {
        self.num_col
    }

    pub fn num_row(&self) -> usize {
        self.num_row
    }

    pub fn num_tot(&self) -> usize {
        self.num_col + self.num_row
    }

    /// Fill the work arrays for a phase: costs (optionally perturbed),
    /// bounds and nonbasic values.
    pub fn populate_work_arrays(&mut self, lp: &SimplexLp, phase: u8, perturb: bool) {
        self.initialise_cost(lp, perturb);
        self.initialise_bound(lp, phase);
        self.initialise_value();
    }

    /// Copy the phase-2 costs, applying the optimization sense, and
    /// optionally perturb them.
    pub fn initialise_cost(&mut self, lp: &SimplexLp, perturb: bool) {
        for j in 0..self.num_col {
            self.work_cost[j] = lp.sense * lp.col_cost[j];
            self.work_shift[j] = 0.0;
        }
        for var in self.num_col..self.num_tot() {
            self.work_cost[var] = 0.0;
            self.work_shift[var] = 0.0;
        }
        self.costs_perturbed = false;
        if !perturb {
            return;
        }
        self.perturb_costs(lp);
    }

    /// Structured cost perturbation: each column moves away from its bound
    /// pattern by a random amount proportional to its cost magnitude;
    /// logicals get a symmetric noise at roundoff level.
    fn perturb_costs(&mut self, lp: &SimplexLp) {
        self.costs_perturbed = true;

        let mut bigc = (0..self.num_col)
            .map(|j| self.work_cost[j].abs())
            .fold(0.0_f64, f64::max);
        if bigc > 100.0 {
            bigc = bigc.sqrt().sqrt();
        }

        // With almost no boxed variables a large base would drown the
        // original costs.
        let mut boxed = 0usize;
        for j in 0..self.num_col {
            if lp.col_upper[j] - lp.col_lower[j] < 1e30 {
                boxed += 1;
            }
        }
        for i in 0..self.num_row {
            if lp.row_upper[i] - lp.row_lower[i] < 1e30 {
                boxed += 1;
            }
        }
        if (boxed as f64) < 0.01 * self.num_tot() as f64 {
            bigc = bigc.min(1.0);
        }

        let base = PERTURBATION_BASE * bigc;
        for j in 0..self.num_col {
            let lower = lp.col_lower[j];
            let upper = lp.col_upper[j];
            let xpert = (self.work_cost[j].abs() + 1.0) * base * (1.0 + lp.random_value[j]);
            if is_infinite(-lower) && is_infinite(upper) {
                // Free: no perturbation.
            } else if is_infinite(upper) {
                self.work_cost[j] += xpert;
            } else if is_infinite(-lower) {
                self.work_cost[j] -= xpert;
            } else if lower != upper {
                self.work_cost[j] += if self.work_cost[j] >= 0.0 { xpert } else { -xpert };
            }
        }
        for var in self.num_col..self.num_tot() {
            self.work_cost[var] += (0.5 - lp.random_value[var]) * 1e-12;
        }
    }

    /// Set the working bounds and ranges. Phase 2 copies the scaled bounds
    /// (rows sign-inverted: the slack is the negative row activity);
    /// phase 1 replaces them by the dual-feasibility-driving surrogates.
    pub fn initialise_bound(&mut self, lp: &SimplexLp, phase: u8) {
        for j in 0..self.num_col {
            self.work_lower[j] = lp.col_lower[j];
            self.work_upper[j] = lp.col_upper[j];
        }
        for i in 0..self.num_row {
            let var = self.num_col + i;
            self.work_lower[var] = -lp.row_upper[i];
            self.work_upper[var] = -lp.row_lower[i];
        }
        for var in 0..self.num_tot() {
            self.work_range[var] = self.work_upper[var] - self.work_lower[var];
        }
        if phase == 2 {
            return;
        }

        for var in 0..self.num_tot() {
            if is_infinite(-self.work_lower[var]) && is_infinite(self.work_upper[var]) {
                // Free logicals stay free; they should never leave the
                // basis.
                if var >= self.num_col {
                    continue;
                }
                self.work_lower[var] = -1000.0;
                self.work_upper[var] = 1000.0;
            } else if is_infinite(-self.work_lower[var]) {
                self.work_lower[var] = -1.0;
                self.work_upper[var] = 0.0;
            } else if is_infinite(self.work_upper[var]) {
                self.work_lower[var] = 0.0;
                self.work_upper[var] = 1.0;
            } else {
                self.work_lower[var] = 0.0;
                self.work_upper[var] = 0.0;
            }
            self.work_range[var] = self.work_upper[var] - self.work_lower[var];
        }
    }

    /// Set `work_value` and `nonbasic_move` for every variable from the
    /// working bounds, keeping the resting bound of boxed variables when a
    /// valid move direction is already present.
    pub fn initialise_value(&mut self) {
        for var in 0..self.num_tot() {
            if self.nonbasic_flag[var] == NONBASIC {
                if self.work_lower[var] == self.work_upper[var] {
                    self.work_value[var] = self.work_lower[var];
                    self.nonbasic_move[var] = MOVE_ZERO;
                } else if !is_infinite(-self.work_lower[var]) {
                    if !is_infinite(self.work_upper[var]) {
                        // Boxed: respect an existing direction.
                        match self.nonbasic_move[var] {
                            MOVE_UP => self.work_value[var] = self.work_lower[var],
                            MOVE_DOWN => self.work_value[var] = self.work_upper[var],
                            _ => {
                                self.nonbasic_move[var] = MOVE_UP;
                                self.work_value[var] = self.work_lower[var];
                            }
                        }
                    } else {
                        self.work_value[var] = self.work_lower[var];
                        self.nonbasic_move[var] = MOVE_UP;
                    }
                } else if !is_infinite(self.work_upper[var]) {
                    self.work_value[var] = self.work_upper[var];
                    self.nonbasic_move[var] = MOVE_DOWN;
                } else {
                    self.work_value[var] = 0.0;
                    self.nonbasic_move[var] = MOVE_ZERO;
                }
            } else {
                self.nonbasic_move[var] = MOVE_ZERO;
            }
        }
    }

    /// Move a boxed nonbasic variable to its other bound.
    pub fn flip_bound(&mut self, var: usize) {
        let mv = -self.nonbasic_move[var];
        self.nonbasic_move[var] = mv;
        self.work_value[var] = if mv == MOVE_UP {
            self.work_lower[var]
        } else {
            self.work_upper[var]
        };
    }

    /// Which bound the leaving variable settles on: `-1` for the lower
    /// bound, `+1` for the upper, `0` for fixed. A free variable leaving
    /// the basis has no bound to settle on; the choice of the upper
    /// direction is deterministic.
    pub fn source_out_from_bound(&self, var: usize) -> i8 {
        if self.work_lower[var] == self.work_upper[var] {
            return 0;
        }
        if !is_infinite(-self.work_lower[var]) {
            -1
        } else {
            if is_infinite(self.work_upper[var]) {
                warn!("free variable {} is leaving the basis", var);
            }
            1
        }
    }

    /// The basis change of a pivot, applied as one step: the entering
    /// variable takes over row `row_out`, the leaving variable settles on
    /// the bound selected by `source_out`.
    ///
    /// Returns the leaving variable and the change of the updated dual
    /// objective value.
    pub fn update_pivots(&mut self, col_in: usize, row_out: usize, source_out: i8) -> (usize, f64) {
        let col_out = self.basic_index[row_out];

        self.basic_index[row_out] = col_in;
        self.nonbasic_flag[col_in] = BASIC;
        self.nonbasic_move[col_in] = MOVE_ZERO;
        self.base_lower[row_out] = self.work_lower[col_in];
        self.base_upper[row_out] = self.work_upper[col_in];

        self.nonbasic_flag[col_out] = NONBASIC;
        if self.work_lower[col_out] == self.work_upper[col_out] {
            self.work_value[col_out] = self.work_lower[col_out];
            self.nonbasic_move[col_out] = MOVE_ZERO;
        } else if source_out == -1 {
            self.work_value[col_out] = self.work_lower[col_out];
            self.nonbasic_move[col_out] = MOVE_UP;
        } else {
            self.work_value[col_out] = self.work_upper[col_out];
            self.nonbasic_move[col_out] = MOVE_DOWN;
        }
        let dual_objective_delta = self.work_value[col_out] * self.work_dual[col_out];

        if col_out < self.num_col {
            self.num_basic_logicals += 1;
        }
        if col_in < self.num_col {
            self.num_basic_logicals -= 1;
        }

        debug_assert!(self.is_consistent());
        (col_out, dual_objective_delta)
    }

    /// Record a cost shift on `var`: the dual moves to `new_dual` and the
    /// cost moves with it, with the deviation remembered in `work_shift`.
    pub fn shift_cost(&mut self, var: usize, new_dual: f64) {
        let shift = new_dual - self.work_dual[var];
        self.work_dual[var] = new_dual;
        self.work_cost[var] += shift;
        self.work_shift[var] += shift;
        self.costs_perturbed = true;
    }

    /// The invariants that must hold whenever a basis exists; cheap enough
    /// to gate behind `debug_assert!` at every pivot.
    pub fn is_consistent(&self) -> bool {
        let num_basic = self
            .nonbasic_flag
            .iter()
            .filter(|&&flag| flag == BASIC)
            .count();
        if num_basic != self.num_row {
            return false;
        }
        if !(0..self.num_row).all(|r| self.nonbasic_flag[self.basic_index[r]] == BASIC) {
            return false;
        }
        (0..self.num_tot()).all(|var| {
            self.work_range[var] == self.work_upper[var] - self.work_lower[var]
        })
    }

    /// The (move, value) table for nonbasic variables; separate from
    /// [`Basis::is_consistent`] because phase transitions legitimately
    /// break it until values are re-populated.
    pub fn nonbasic_values_consistent(&self) -> bool {
        (0..self.num_tot()).all(|var| {
            if self.nonbasic_flag[var] != NONBASIC {
                return true;
            }
            let lower = self.work_lower[var];
            let upper = self.work_upper[var];
            let value = self.work_value[var];
            let mv = self.nonbasic_move[var];
            if lower == upper {
                mv == MOVE_ZERO && value == lower
            } else if !is_infinite(-lower) && !is_infinite(upper) {
                (mv == MOVE_UP && value == lower) || (mv == MOVE_DOWN && value == upper)
            } else if !is_infinite(-lower) {
                mv == MOVE_UP && value == lower
            } else if !is_infinite(upper) {
                mv == MOVE_DOWN && value == upper
            } else {
                mv == MOVE_ZERO && value == 0.0
            }
        })
    }
}

#[cfg(test)]
mod test {
    use crate::data::linear_program::elements::{Objective, INF};
    use crate::data::linear_program::model::LpProblem;

    use super::*;

    fn bounds_problem() -> LpProblem {
        // One variable of each bound pattern: boxed, lower, upper, free,
        // fixed.
        LpProblem {
            num_col: 5,
            num_row: 1,
            a_start: vec![0, 1, 2, 3, 4, 5],
            a_index: vec![0; 5],
            a_value: vec![1.0; 5],
            col_cost: vec![1.0, -2.0, 3.0, 0.0, 5.0],
            col_lower: vec![0.0, 1.0, -INF, -INF, 2.0],
            col_upper: vec![4.0, INF, 0.0, INF, 2.0],
            row_lower: vec![-INF],
            row_upper: vec![10.0],
            objective: Objective::Minimize,
            offset: 0.0,
            model_name: "bounds".to_string(),
            col_names: (0..5).map(|j| format!("x{}", j)).collect(),
            row_names: vec!["r0".to_string()],
        }
    }

    fn populated_logical_basis(phase: u8, perturb: bool) -> (crate::algorithm::dual_simplex::model::SimplexLp, Basis) {
        let problem = bounds_problem();
        let lp = crate::algorithm::dual_simplex::model::SimplexLp::from_problem(&problem);
        let mut basis = Basis::logical(lp.num_col, lp.num_row);
        basis.populate_work_arrays(&lp, phase, perturb);
        (lp, basis)
    }

    #[test]
    fn logical_basis_is_consistent() {
        let (_, basis) = populated_logical_basis(2, false);
        assert!(basis.is_consistent());
        assert!(basis.nonbasic_values_consistent());
        assert_eq!(basis.num_basic_logicals, 1);
        assert_eq!(basis.basic_index, vec![5]);
    }

    #[test]
    fn values_follow_the_bound_table() {
        let (_, basis) = populated_logical_basis(2, false);
        // Boxed: at lower, moving up.
        assert_eq!(basis.nonbasic_move[0], MOVE_UP);
        assert_eq!(basis.work_value[0], 0.0);
        // Lower only.
        assert_eq!(basis.nonbasic_move[1], MOVE_UP);
        assert_eq!(basis.work_value[1], 1.0);
        // Upper only.
        assert_eq!(basis.nonbasic_move[2], MOVE_DOWN);
        assert_eq!(basis.work_value[2], 0.0);
        // Free.
        assert_eq!(basis.nonbasic_move[3], MOVE_ZERO);
        assert_eq!(basis.work_value[3], 0.0);
        // Fixed.
        assert_eq!(basis.nonbasic_move[4], MOVE_ZERO);
        assert_eq!(basis.work_value[4], 2.0);
    }

    #[test]
    fn logical_bounds_are_inverted_row_bounds() {
        let (_, basis) = populated_logical_basis(2, false);
        assert_eq!(basis.work_lower[5], -10.0);
        assert!(is_infinite(basis.work_upper[5]));
    }

    #[test]
    fn phase_one_bounds_are_surrogates() {
        let (_, basis) = populated_logical_basis(1, false);
        // Boxed becomes fixed at zero.
        assert_eq!((basis.work_lower[0], basis.work_upper[0]), (0.0, 0.0));
        // Lower-only becomes (0, 1).
        assert_eq!((basis.work_lower[1], basis.work_upper[1]), (0.0, 1.0));
        // Upper-only becomes (-1, 0).
        assert_eq!((basis.work_lower[2], basis.work_upper[2]), (-1.0, 0.0));
        // Free becomes (-1000, 1000).
        assert_eq!(
            (basis.work_lower[3], basis.work_upper[3]),
            (-1000.0, 1000.0)
        );
        assert!(basis.is_consistent());
    }

    #[test]
    fn perturbation_respects_bound_patterns() {
        let (lp, unperturbed) = populated_logical_basis(2, false);
        let mut perturbed = Basis::logical(lp.num_col, lp.num_row);
        perturbed.populate_work_arrays(&lp, 2, true);

        assert!(perturbed.costs_perturbed);
        // Lower-only: perturbed upward.
        assert!(perturbed.work_cost[1] > unperturbed.work_cost[1]);
        // Upper-only: perturbed downward.
        assert!(perturbed.work_cost[2] < unperturbed.work_cost[2]);
        // Free: untouched.
        assert_eq!(perturbed.work_cost[3], unperturbed.work_cost[3]);
        // Fixed: untouched.
        assert_eq!(perturbed.work_cost[4], unperturbed.work_cost[4]);
        // Boxed: moved away from zero along its sign.
        assert!(perturbed.work_cost[0] > unperturbed.work_cost[0]);
    }

    #[test]
    fn flip_swaps_bound_and_direction() {
        let (_, mut basis) = populated_logical_basis(2, false);
        basis.flip_bound(0);
        assert_eq!(basis.nonbasic_move[0], MOVE_DOWN);
        assert_eq!(basis.work_value[0], 4.0);
        basis.flip_bound(0);
        assert_eq!(basis.nonbasic_move[0], MOVE_UP);
        assert_eq!(basis.work_value[0], 0.0);
    }

    #[test]
    fn update_pivots_swaps_roles_atomically() {
        let (_, mut basis) = populated_logical_basis(2, false);
        basis.work_dual[5] = 0.5;

        let (col_out, delta) = basis.update_pivots(0, 0, -1);
        assert_eq!(col_out, 5);
        assert_eq!(basis.basic_index[0], 0);
        assert_eq!(basis.nonbasic_flag[0], BASIC);
        assert_eq!(basis.nonbasic_flag[5], NONBASIC);
        // The logical settles on its lower working bound.
        assert_eq!(basis.work_value[5], -10.0);
        assert_eq!(basis.nonbasic_move[5], MOVE_UP);
        assert_eq!(delta, -10.0 * 0.5);
        assert_eq!(basis.num_basic_logicals, 0);
        assert!(basis.is_consistent());
    }

    #[test]
    fn source_out_picks_a_direction_for_free_variables() {
        let (_, basis) = populated_logical_basis(2, false);
        assert_eq!(basis.source_out_from_bound(4), 0);
        assert_eq!(basis.source_out_from_bound(0), -1);
        assert_eq!(basis.source_out_from_bound(2), 1);
        assert_eq!(basis.source_out_from_bound(3), 1);
    }

    #[test]
    fn rejects_wrong_basic_count() {
        let flags = vec![NONBASIC; 6];
        let result = Basis::from_nonbasic_flags(5, 1, flags, vec![MOVE_ZERO; 6]);
        assert_eq!(
            result.unwrap_err(),
            InvalidBasis {
                num_basic: 0,
                num_row: 1
            }
        );
    }
}
