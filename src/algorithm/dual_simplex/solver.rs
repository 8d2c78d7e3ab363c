//! # The dual simplex iteration
//!
//! One outer rebuild phase and many inner pivot iterations. A rebuild
//! refactorizes the basis matrix and recomputes duals, primals and the
//! dual objective from scratch; the inner loop then repeats CHUZR (leaving
//! row by weighted primal infeasibility), BTRAN, PRICE, CHUZC (entering
//! column by a two-pass ratio test with bound flipping), FTRAN and the
//! update of duals, primals, edge weights, basis and factorization, until
//! a rebuild is due or the phase terminates.
use std::time::Instant;

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::algorithm::dual_simplex::basis::{Basis, MOVE_DOWN, MOVE_UP, NONBASIC};
use crate::algorithm::dual_simplex::factor::{Factor, UpdateHint};
use crate::algorithm::dual_simplex::model::SimplexLp;
use crate::algorithm::dual_simplex::options::{DualEdgeWeightStrategy, PriceStrategy, SolverOptions};
use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::vector::SparseVector;
use crate::data::linear_program::elements::{is_infinite, SolveStatus};

/// Base tolerance below which a pivot element is abandoned.
const PIVOT_TOLERANCE: f64 = 1e-9;
/// Relative disagreement between the priced and the FTRAN'd pivot value
/// that forces a rebuild.
const PIVOT_AGREEMENT_TOLERANCE: f64 = 1e-7;
/// Consecutive abandoned pivots before the solve is declared singular.
const ABANDONED_PIVOT_LIMIT: usize = 10;
/// Phase-1 objective residual below which the basis counts as dual
/// feasible.
const PHASE1_OBJECTIVE_TOLERANCE: f64 = 1e-7;
/// Rounds of unperturb-and-reverify after a phase-2 optimum.
const CLEANUP_ROUND_LIMIT: usize = 3;
/// Smoothing factor of the running density estimates behind the
/// FTRAN/BTRAN hints.
const DENSITY_SMOOTHING: f64 = 0.95;
/// Floor factor of an updated steepest-edge weight relative to its
/// pivotal lower bound.
const DSE_WEIGHT_FLOOR: f64 = 1e-4;

/// Seed of the stream drawn on by dual corrections.
const CORRECTION_STREAM_SEED: u64 = 0xbb67ae8584caa73b;

/// How an inner pivot loop ended.
enum Inner {
    /// No primal-infeasible row: the phase looks optimal.
    Optimal,
    /// The ratio test found no entering column for a valid leaving row.
    RatioTestFailed,
    /// A rebuild is due (update limit, abandoned pivot, numerical doubt).
    Rebuild,
}

/// How a phase ended, short of a terminal status.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PhaseOutcome {
    Optimal,
    RatioTestFailed,
}

/// Outcome of the ratio test.
enum Chuzc {
    Empty,
    Pivot {
        col_in: usize,
        alpha_row: f64,
        flips: Vec<usize>,
    },
}

#[derive(Clone, Copy)]
struct Candidate {
    var: usize,
    alpha: f64,
    ratio: f64,
    flip_gain: f64,
    boxed: bool,
}

/// The dual simplex over one prepared problem. Owns the working copy, the
/// basis, both matrix orientations and the factorization; everything a
/// pivot mutates is reachable only through this structure, so the
/// BTRAN-PRICE-CHUZC-FTRAN-update sequence is atomic to any observer.
pub struct DualSimplex<'a> {
    pub lp: SimplexLp,
    options: &'a SolverOptions,
    pub basis: Basis,
    matrix: SparseMatrix,
    factor: Factor,

    /// Dual steepest-edge weights per row; all ones under Dantzig pricing.
    edge_weights: Vec<f64>,

    // Work vectors reused across iterations without reallocation.
    row_ep: SparseVector,
    row_ap: SparseVector,
    column: SparseVector,
    dse_column: SparseVector,
    flip_column: SparseVector,

    row_ep_density: f64,
    column_density: f64,

    pub iteration_count: usize,
    /// Dual objective of the working (scaled, sensed) problem as of the
    /// last rebuild.
    dual_objective: f64,
    updated_dual_objective: f64,

    rebuild_needed: bool,
    rank_repaired_this_phase: bool,
    consecutive_abandoned: usize,
    cleanup_rounds: usize,

    start: Instant,
    correction_stream: StdRng,
}

impl<'a> DualSimplex<'a> {
    pub fn new(lp: SimplexLp, options: &'a SolverOptions, basis: Option<Basis>) -> Self {
        let basis = basis.unwrap_or_else(|| Basis::logical(lp.num_col, lp.num_row));
        let matrix = if basis.num_basic_logicals == lp.num_row {
            SparseMatrix::setup_logical_basis(
                lp.num_col,
                lp.num_row,
                &lp.a_start,
                &lp.a_index,
                &lp.a_value,
            )
        } else {
            SparseMatrix::setup(
                lp.num_col,
                lp.num_row,
                &lp.a_start,
                &lp.a_index,
                &lp.a_value,
                &basis.nonbasic_flag[..lp.num_col],
            )
        };
        let factor = Factor::new(lp.num_row, options.update_limit);
        let num_col = lp.num_col;
        let num_row = lp.num_row;
        let mut lp = lp;
        lp.flags.has_basis = true;
        lp.flags.has_matrix_col_wise = true;
        lp.flags.has_matrix_row_wise = true;
        lp.flags.has_factor = true;

        Self {
            lp,
            options,
            basis,
            matrix,
            factor,
            edge_weights: vec![1.0; num_row],
            row_ep: SparseVector::new(num_row),
            row_ap: SparseVector::new(num_col),
            column: SparseVector::new(num_row),
            dse_column: SparseVector::new(num_row),
            flip_column: SparseVector::new(num_row),
            row_ep_density: 1.0,
            column_density: 1.0,
            iteration_count: 0,
            dual_objective: 0.0,
            updated_dual_objective: 0.0,
            rebuild_needed: true,
            rank_repaired_this_phase: false,
            consecutive_abandoned: 0,
            cleanup_rounds: 0,
            start: Instant::now(),
            correction_stream: StdRng::seed_from_u64(CORRECTION_STREAM_SEED),
        }
    }

    fn num_col(&self) -> usize {
        self.lp.num_col
    }

    fn num_row(&self) -> usize {
        self.lp.num_row
    }

    /// Run the two-phase dual simplex to a terminal status.
    pub fn run(&mut self) -> SolveStatus {
        self.start = Instant::now();
        self.basis
            .populate_work_arrays(&self.lp, 2, self.options.perturb_costs);

        // Factorize and compute duals once, uncorrected, to pick the
        // starting phase: bound flips repair boxed infeasibilities for
        // free, so only the rest forces phase 1.
        if let Err(status) = self.ensure_factorized() {
            return status;
        }
        self.compute_dual();
        let needs_phase1 = self.count_unfixable_dual_infeasibilities() > 0;

        if needs_phase1 {
            debug!("dual infeasible start: entering phase 1");
            self.basis.initialise_bound(&self.lp, 1);
            self.basis.initialise_value();
            self.lp.flags.has_fresh_rebuild = false;
            self.rebuild_needed = true;

            match self.solve_phase(1) {
                Ok(PhaseOutcome::Optimal) => {
                    if self.dual_objective.abs() > PHASE1_OBJECTIVE_TOLERANCE {
                        debug!(
                            "phase 1 optimum {:e} leaves dual infeasibility",
                            self.dual_objective
                        );
                        return SolveStatus::Unbounded;
                    }
                }
                Ok(PhaseOutcome::RatioTestFailed) => return SolveStatus::Unbounded,
                Err(status) => return status,
            }

            // Back to the true bounds.
            self.basis.initialise_bound(&self.lp, 2);
            self.basis.initialise_value();
            self.lp.flags.has_fresh_rebuild = false;
            self.rebuild_needed = true;
        }

        self.rank_repaired_this_phase = false;
        loop {
            match self.solve_phase(2) {
                Ok(PhaseOutcome::Optimal) => {
                    if self.basis.costs_perturbed && self.cleanup_rounds < CLEANUP_ROUND_LIMIT {
                        debug!("removing cost perturbation and re-verifying optimality");
                        self.cleanup_rounds += 1;
                        self.basis.initialise_cost(&self.lp, false);
                        self.lp.flags.has_fresh_rebuild = false;
                        self.rebuild_needed = true;
                        continue;
                    }
                    return SolveStatus::Optimal;
                }
                Ok(PhaseOutcome::RatioTestFailed) => return SolveStatus::Infeasible,
                Err(status) => return status,
            }
        }
    }

    /// One phase of the rebuild-then-iterate loop.
    fn solve_phase(&mut self, phase: u8) -> Result<PhaseOutcome, SolveStatus> {
        loop {
            if self.rebuild_needed || !self.lp.flags.has_fresh_rebuild {
                self.rebuild(phase)?;
            }
            self.check_limits(phase)?;

            match self.iterate(phase)? {
                Inner::Rebuild => continue,
                Inner::Optimal => {
                    if self.factor.update_count() > 0 || !self.lp.flags.has_fresh_rebuild {
                        // Confirm against a fresh factorization.
                        self.rebuild_needed = true;
                        continue;
                    }
                    debug!(
                        "phase {} optimal after {} iterations, dual objective {:.10e}",
                        phase, self.iteration_count, self.dual_objective
                    );
                    return Ok(PhaseOutcome::Optimal);
                }
                Inner::RatioTestFailed => {
                    if self.factor.update_count() > 0 || !self.lp.flags.has_fresh_rebuild {
                        self.rebuild_needed = true;
                        continue;
                    }
                    debug!("phase {} ratio test empty on a fresh factorization", phase);
                    return Ok(PhaseOutcome::RatioTestFailed);
                }
            }
        }
    }

    /// Inner pivot loop; runs until the phase looks finished or a rebuild
    /// is due.
    fn iterate(&mut self, phase: u8) -> Result<Inner, SolveStatus> {
        loop {
            self.check_limits(phase)?;

            let Some(row_out) = self.chuzr() else {
                return Ok(Inner::Optimal);
            };

            // BTRAN: rho = B^-T e_r.
            self.row_ep.clear();
            self.row_ep.set(row_out, 1.0);
            let hint = self.row_ep_density;
            self.factor.btran(&mut self.row_ep, hint);
            if !self.row_ep.is_indexed() {
                self.row_ep.rebuild_index(0.0);
            }
            self.row_ep_density = DENSITY_SMOOTHING * self.row_ep_density
                + (1.0 - DENSITY_SMOOTHING) * self.row_ep.density();

            // PRICE: row_ap = A' rho over nonbasic structurals.
            self.row_ap.clear();
            match self.options.price_strategy {
                PriceStrategy::Row => self.matrix.price_by_row(&mut self.row_ap, &self.row_ep),
                PriceStrategy::Col => self.matrix.price_by_col(&mut self.row_ap, &self.row_ep),
            }

            let delta_primal = self.primal_infeasibility_of(row_out);
            match self.chuzc(delta_primal) {
                Chuzc::Empty => return Ok(Inner::RatioTestFailed),
                Chuzc::Pivot {
                    col_in,
                    alpha_row,
                    flips,
                } => {
                    if self.pivot(phase, row_out, delta_primal, col_in, alpha_row, flips) {
                        self.consecutive_abandoned = 0;
                    } else {
                        self.consecutive_abandoned += 1;
                        if self.consecutive_abandoned > ABANDONED_PIVOT_LIMIT {
                            return Err(SolveStatus::Singular);
                        }
                    }
                }
            }

            if self.rebuild_needed {
                return Ok(Inner::Rebuild);
            }
        }
    }

    /// Execute the pivot chosen by CHUZR/CHUZC. Returns whether it was
    /// accepted; an abandoned pivot leaves the basis unchanged and forces
    /// a rebuild.
    fn pivot(
        &mut self,
        phase: u8,
        row_out: usize,
        delta_primal: f64,
        col_in: usize,
        alpha_row: f64,
        flips: Vec<usize>,
    ) -> bool {
        // FTRAN the entering column.
        self.column.clear();
        self.matrix.collect_column(&mut self.column, col_in, 1.0);
        let hint = self.column_density;
        self.factor.ftran(&mut self.column, hint);
        if !self.column.is_indexed() {
            self.column.rebuild_index(0.0);
        }
        self.column_density = DENSITY_SMOOTHING * self.column_density
            + (1.0 - DENSITY_SMOOTHING) * self.column.density();

        let alpha = self.column.value(row_out);
        let pivot_tolerance =
            PIVOT_TOLERANCE * (1.0 + self.column.count() as f64 / self.num_row().max(1) as f64);
        if alpha.abs() < pivot_tolerance {
            warn!(
                "abandoning pivot in row {}: |{:e}| below tolerance",
                row_out, alpha
            );
            self.rebuild_needed = true;
            return false;
        }
        if (alpha - alpha_row).abs() > PIVOT_AGREEMENT_TOLERANCE * (1.0 + alpha.abs())
            && self.factor.update_count() > 0
        {
            trace!(
                "pivot disagreement: priced {:e} vs solved {:e}",
                alpha_row,
                alpha
            );
            self.rebuild_needed = true;
            return false;
        }

        // Bound flips accumulated by the ratio test change nonbasic values
        // before the basis change; their effect on the basic values goes
        // through one combined FTRAN.
        if !flips.is_empty() {
            self.flip_column.clear();
            for &var in &flips {
                let old_value = self.basis.work_value[var];
                self.basis.flip_bound(var);
                let delta = self.basis.work_value[var] - old_value;
                self.matrix.collect_column(&mut self.flip_column, var, delta);
            }
            self.factor.ftran(&mut self.flip_column, 1.0);
            for i in 0..self.num_row() {
                let change = self.flip_column.value(i);
                if change != 0.0 {
                    self.basis.base_value[i] -= change;
                }
            }
            trace!("flipped {} bounds during the ratio test", flips.len());
        }
        // The flips moved the basic values; the leaving row keeps its
        // infeasible side but not its magnitude.
        let delta_primal = if flips.is_empty() {
            delta_primal
        } else if delta_primal < 0.0 {
            self.basis.base_value[row_out] - self.basis.base_lower[row_out]
        } else {
            self.basis.base_value[row_out] - self.basis.base_upper[row_out]
        };

        // Dual update over the priced row, then the two special values.
        let theta_dual = self.basis.work_dual[col_in] / alpha_row;
        if theta_dual != 0.0 {
            for k in 0..self.row_ap.count() {
                let j = self.row_ap.indices()[k];
                if self.basis.nonbasic_flag[j] == NONBASIC {
                    self.basis.work_dual[j] -= theta_dual * self.row_ap.value(j);
                }
            }
            for k in 0..self.row_ep.count() {
                let r = self.row_ep.indices()[k];
                let var = self.num_col() + r;
                if self.basis.nonbasic_flag[var] == NONBASIC {
                    self.basis.work_dual[var] -= theta_dual * self.row_ep.value(r);
                }
            }
        }
        self.basis.work_dual[col_in] = 0.0;
        let col_out = self.basis.basic_index[row_out];
        self.basis.work_dual[col_out] = -theta_dual;

        // Primal update.
        let theta_primal = delta_primal / alpha;
        if theta_primal != 0.0 {
            for k in 0..self.column.count() {
                let i = self.column.indices()[k];
                self.basis.base_value[i] -= theta_primal * self.column.value(i);
            }
        }

        // Steepest-edge weight update, using the FTRAN of rho.
        if self.options.dual_edge_weight_strategy == DualEdgeWeightStrategy::SteepestEdge {
            let weight_out = self.row_ep.norm2();
            self.dse_column.clear();
            for (i, value) in self.row_ep.iter() {
                self.dse_column.set(i, value);
            }
            self.factor.ftran(&mut self.dse_column, 1.0);
            for k in 0..self.column.count() {
                let i = self.column.indices()[k];
                if i == row_out {
                    continue;
                }
                let kai = self.column.value(i) / alpha;
                let updated = self.edge_weights[i] - 2.0 * kai * self.dse_column.value(i)
                    + kai * kai * weight_out;
                self.edge_weights[i] = updated.max(DSE_WEIGHT_FLOOR * kai * kai * weight_out);
            }
            self.edge_weights[row_out] = (weight_out / (alpha * alpha)).max(DSE_WEIGHT_FLOOR);
        }

        // The basis change itself, then its consequences for the matrix
        // partition and the factorization.
        let source_out = if delta_primal < 0.0 { -1 } else { 1 };
        let (col_out, dual_delta) = self.basis.update_pivots(col_in, row_out, source_out);
        self.basis.base_value[row_out] = self.basis.work_value[col_in] + theta_primal;
        self.updated_dual_objective += dual_delta + theta_dual * delta_primal;
        self.matrix.update(col_in, col_out);

        match self.factor.update(&self.column, row_out) {
            Ok(()) => {}
            Err(UpdateHint::UpdateLimitReached) | Err(UpdateHint::SmallPivot) => {
                // The basis already moved on; force a clean factorization.
                self.rebuild_needed = true;
            }
        }

        self.lp.flags.has_fresh_invert = false;
        self.lp.flags.has_fresh_rebuild = false;
        self.iteration_count += 1;
        trace!(
            "iteration {}: var {} in, var {} out, row {}, theta_dual {:e}, phase {}",
            self.iteration_count,
            col_in,
            col_out,
            row_out,
            theta_dual,
            phase,
        );
        true
    }

    /// CHUZR: the basic row with greatest weighted primal infeasibility.
    fn chuzr(&self) -> Option<usize> {
        let tau_p = self.options.primal_feasibility_tolerance;
        let mut best_row = None;
        let mut best_score = 0.0;
        for r in 0..self.num_row() {
            let value = self.basis.base_value[r];
            let infeasibility = if value < self.basis.base_lower[r] - tau_p {
                self.basis.base_lower[r] - value
            } else if value > self.basis.base_upper[r] + tau_p {
                value - self.basis.base_upper[r]
            } else {
                continue;
            };
            let score = infeasibility * infeasibility / self.edge_weights[r];
            if score > best_score {
                best_score = score;
                best_row = Some(r);
            }
        }
        best_row
    }

    /// Signed violation of the leaving row: negative below the lower
    /// bound, positive above the upper.
    fn primal_infeasibility_of(&self, row: usize) -> f64 {
        let value = self.basis.base_value[row];
        if value < self.basis.base_lower[row] {
            value - self.basis.base_lower[row]
        } else {
            value - self.basis.base_upper[row]
        }
    }

    /// CHUZC: Harris two-pass ratio test over the priced row, extended by
    /// bound flipping. Nonbasic boxed variables whose dual would flip sign
    /// within the step flip bounds instead of entering, as long as their
    /// combined contribution keeps the leaving row infeasible.
    fn chuzc(&self, delta_primal: f64) -> Chuzc {
        let tau_d = self.options.dual_feasibility_tolerance;
        let alpha_tolerance = self.options.primal_feasibility_tolerance;
        let leaving_increases = delta_primal < 0.0;

        let consider = |var: usize, alpha: f64, basis: &Basis| -> Option<Candidate> {
            if basis.nonbasic_flag[var] != NONBASIC || alpha.abs() <= alpha_tolerance {
                return None;
            }
            let lower = basis.work_lower[var];
            let upper = basis.work_upper[var];
            if lower == upper {
                return None;
            }
            // The direction the candidate would move when entering; a
            // variable resting at a bound may only move off that bound.
            let entering_increases = if alpha > 0.0 {
                !leaving_increases
            } else {
                leaving_increases
            };
            let eligible = match basis.nonbasic_move[var] {
                MOVE_UP => entering_increases,
                MOVE_DOWN => !entering_increases,
                _ => true,
            };
            if !eligible {
                return None;
            }
            let dual = basis.work_dual[var];
            // Sign-infeasible duals count as zero distance.
            let mv = basis.nonbasic_move[var];
            let clamped = if (mv == MOVE_UP && dual < 0.0) || (mv == MOVE_DOWN && dual > 0.0) {
                0.0
            } else {
                dual.abs()
            };
            let boxed = !is_infinite(-lower) && !is_infinite(upper);
            Some(Candidate {
                var,
                alpha,
                ratio: clamped / alpha.abs(),
                flip_gain: alpha.abs() * basis.work_range[var],
                boxed,
            })
        };

        let mut candidates: Vec<Candidate> = Vec::new();
        for k in 0..self.row_ap.count() {
            let j = self.row_ap.indices()[k];
            if let Some(candidate) = consider(j, self.row_ap.value(j), &self.basis) {
                candidates.push(candidate);
            }
        }
        for k in 0..self.row_ep.count() {
            let r = self.row_ep.indices()[k];
            let var = self.num_col() + r;
            if let Some(candidate) = consider(var, self.row_ep.value(r), &self.basis) {
                candidates.push(candidate);
            }
        }
        if candidates.is_empty() {
            return Chuzc::Empty;
        }

        // First Harris pass: the tolerance-relaxed bound on the dual step.
        let relaxed_bound = candidates
            .iter()
            .map(|c| (c.ratio * c.alpha.abs() + tau_d) / c.alpha.abs())
            .fold(f64::INFINITY, f64::min);

        candidates.sort_by(|a, b| a.ratio.partial_cmp(&b.ratio).unwrap());

        // Walk the candidates in ratio order, flipping boxed ones while
        // the leaving row stays infeasible without them.
        let mut remain = delta_primal.abs();
        let mut flips = Vec::new();
        let mut stop = None;
        for (at, candidate) in candidates.iter().enumerate() {
            if candidate.boxed && remain - candidate.flip_gain > 0.0 {
                remain -= candidate.flip_gain;
                flips.push(candidate.var);
            } else {
                stop = Some(at);
                break;
            }
        }
        let Some(stop) = stop else {
            // Every candidate flipped away and infeasibility remains.
            return Chuzc::Empty;
        };

        // Second Harris pass: among candidates within the tolerance-
        // widened ratio of the stopping group, take the largest pivot.
        let stop_candidate = candidates[stop];
        let group_bound = relaxed_bound.max(
            (stop_candidate.ratio * stop_candidate.alpha.abs() + tau_d)
                / stop_candidate.alpha.abs(),
        );
        let mut chosen = stop_candidate;
        for candidate in &candidates[stop..] {
            if candidate.ratio <= group_bound && candidate.alpha.abs() > chosen.alpha.abs() {
                chosen = *candidate;
            }
        }

        Chuzc::Pivot {
            col_in: chosen.var,
            alpha_row: chosen.alpha,
            flips,
        }
    }

    /// Factorize the basis matrix, repairing at most one rank deficiency
    /// per phase by swapping each unpivotable basic variable for the
    /// logical of an unpivoted row.
    fn ensure_factorized(&mut self) -> Result<(), SolveStatus> {
        if let Err(deficiency) = self.factor.build(&self.matrix, &self.basis.basic_index) {
            if self.rank_repaired_this_phase {
                return Err(SolveStatus::Singular);
            }
            self.rank_repaired_this_phase = true;
            debug!(
                "repairing rank deficiency of {} by logical substitution",
                deficiency.count()
            );
            for k in 0..deficiency.count() {
                let col_in = self.num_col() + deficiency.rows[k];
                let row_out = deficiency.columns[k];
                let col_out = self.basis.basic_index[row_out];
                let source_out = self.basis.source_out_from_bound(col_out);
                self.basis.update_pivots(col_in, row_out, source_out);
                self.matrix.update(col_in, col_out);
            }
            if self.factor.build(&self.matrix, &self.basis.basic_index).is_err() {
                return Err(SolveStatus::Singular);
            }
        }
        self.lp.flags.has_invert = true;
        self.lp.flags.has_fresh_invert = true;
        Ok(())
    }

    /// Rebuild boundary: refactorize, then recompute duals, correct them,
    /// recompute primals and the dual objective.
    fn rebuild(&mut self, phase: u8) -> Result<(), SolveStatus> {
        if !self.basis.is_consistent() {
            // Asserted during development; in release builds the solve
            // ends with the current basis preserved.
            debug_assert!(false, "basis lost consistency");
            return Err(SolveStatus::Failed);
        }
        self.ensure_factorized()?;

        self.compute_dual();
        self.correct_dual();
        self.compute_primal();
        self.compute_dual_objective();
        self.updated_dual_objective = self.dual_objective;

        self.rebuild_needed = false;
        self.lp.flags.has_fresh_rebuild = true;
        self.lp.flags.has_dse_weights = true;
        debug!(
            "rebuild at iteration {}: dual objective {:.10e} (phase {})",
            self.iteration_count, self.dual_objective, phase
        );
        Ok(())
    }

    /// pi = B^-T c_B, then reduced costs for every nonbasic variable.
    pub(crate) fn compute_dual(&mut self) {
        self.row_ep.clear();
        for r in 0..self.num_row() {
            let cost = self.basis.work_cost[self.basis.basic_index[r]];
            if cost != 0.0 {
                self.row_ep.set(r, cost);
            }
        }
        self.factor.btran(&mut self.row_ep, 1.0);

        self.row_ap.clear();
        self.matrix.price_by_col(&mut self.row_ap, &self.row_ep);
        for j in 0..self.num_col() {
            self.basis.work_dual[j] = self.basis.work_cost[j] - self.row_ap.value(j);
        }
        for r in 0..self.num_row() {
            let var = self.num_col() + r;
            self.basis.work_dual[var] = self.basis.work_cost[var] - self.row_ep.value(r);
        }
        self.lp.flags.has_nonbasic_duals = true;
    }

    /// Remove dual infeasibilities on nonbasic variables: boxed ones flip
    /// to their other bound, one-sided ones get their cost shifted just
    /// past the feasible side.
    fn correct_dual(&mut self) {
        let tau_d = self.options.dual_feasibility_tolerance;
        for var in 0..self.basis.num_tot() {
            if self.basis.nonbasic_flag[var] != NONBASIC {
                continue;
            }
            let lower = self.basis.work_lower[var];
            let upper = self.basis.work_upper[var];
            if is_infinite(-lower) && is_infinite(upper) {
                continue;
            }
            let mv = self.basis.nonbasic_move[var];
            if f64::from(mv) * self.basis.work_dual[var] <= -tau_d {
                if !is_infinite(-lower) && !is_infinite(upper) {
                    self.basis.flip_bound(var);
                } else {
                    let draw: f64 = self.correction_stream.gen();
                    let new_dual = f64::from(mv) * (1.0 + draw) * tau_d;
                    self.basis.shift_cost(var, new_dual);
                }
            }
        }
    }

    /// Basic values from the nonbasic contributions through one FTRAN.
    pub(crate) fn compute_primal(&mut self) {
        self.column.clear();
        for var in 0..self.basis.num_tot() {
            if self.basis.nonbasic_flag[var] == NONBASIC && self.basis.work_value[var] != 0.0 {
                self.matrix
                    .collect_column(&mut self.column, var, self.basis.work_value[var]);
            }
        }
        self.factor.ftran(&mut self.column, 1.0);

        for r in 0..self.num_row() {
            let var = self.basis.basic_index[r];
            self.basis.base_value[r] = -self.column.value(r);
            self.basis.base_lower[r] = self.basis.work_lower[var];
            self.basis.base_upper[r] = self.basis.work_upper[var];
        }
        self.lp.flags.has_basic_primals = true;
    }

    /// Dual objective of the working problem: the sum of nonbasic
    /// `value * dual` contributions.
    fn compute_dual_objective(&mut self) {
        let mut value = 0.0;
        for var in 0..self.basis.num_tot() {
            if self.basis.nonbasic_flag[var] == NONBASIC {
                value += self.basis.work_value[var] * self.basis.work_dual[var];
            }
        }
        self.dual_objective = value;
        self.lp.flags.has_dual_objective = true;
    }

    /// Dual objective brought to the original problem space: cost scale
    /// and sense undone, offset applied.
    pub fn reported_dual_objective(&self) -> f64 {
        self.lp.sense * self.dual_objective * self.lp.scale.cost + self.lp.offset
    }

    /// Primal objective in the original problem space, without offset.
    pub fn compute_primal_objective(&self) -> f64 {
        let mut value = 0.0;
        for r in 0..self.num_row() {
            let var = self.basis.basic_index[r];
            if var < self.num_col() {
                value += self.basis.base_value[r] * self.lp.col_cost[var];
            }
        }
        for j in 0..self.num_col() {
            if self.basis.nonbasic_flag[j] == NONBASIC {
                value += self.basis.work_value[j] * self.lp.col_cost[j];
            }
        }
        value * self.lp.scale.cost
    }

    /// Dual infeasibilities that bound flips cannot remove, judged against
    /// the original bound patterns: free variables with a sizable dual, or
    /// one-sided variables with the wrong dual sign.
    fn count_unfixable_dual_infeasibilities(&self) -> usize {
        let tau_d = self.options.dual_feasibility_tolerance;
        let mut count = 0;
        for var in 0..self.basis.num_tot() {
            if self.basis.nonbasic_flag[var] != NONBASIC {
                continue;
            }
            let (lower, upper) = self.original_bounds(var);
            if is_infinite(-lower) && is_infinite(upper) {
                if self.basis.work_dual[var].abs() >= tau_d {
                    count += 1;
                }
            } else if is_infinite(-lower) || is_infinite(upper) {
                let mv = f64::from(self.basis.nonbasic_move[var]);
                if mv * self.basis.work_dual[var] <= -tau_d {
                    count += 1;
                }
            }
        }
        count
    }

    fn original_bounds(&self, var: usize) -> (f64, f64) {
        if var < self.num_col() {
            (self.lp.col_lower[var], self.lp.col_upper[var])
        } else {
            let row = var - self.num_col();
            (-self.lp.row_upper[row], -self.lp.row_lower[row])
        }
    }

    fn check_limits(&self, phase: u8) -> Result<(), SolveStatus> {
        if self.iteration_count >= self.options.iteration_limit {
            return Err(SolveStatus::ReachedIterationLimit);
        }
        if self.start.elapsed().as_secs_f64() > self.options.time_limit {
            return Err(SolveStatus::OutOfTime);
        }
        if phase == 2 {
            let reported =
                self.lp.sense * self.updated_dual_objective * self.lp.scale.cost + self.lp.offset;
            if reported > self.options.dual_objective_value_upper_bound {
                return Err(SolveStatus::ReachedDualObjectiveBound);
            }
        }
        Ok(())
    }
}
