//! # Basis matrix factorization
//!
//! Maintains `B = L U` for the `num_row x num_row` basis matrix whose r-th
//! column is the column of the extended constraint matrix belonging to
//! `basic_index[r]`. The factorization is built from scratch with
//! Markowitz-biased threshold pivoting and kept current across pivots with
//! forward product-form updates: every basis change appends one elementary
//! eta factor, and the caller refactorizes once the chain grows past its
//! limit.
//!
//! FTRAN solves `B x = v`, BTRAN solves `B' x = v`; both operate in place
//! on a [`SparseVector`] and use the caller's density hint to decide
//! whether the result keeps an index list.
use log::debug;

use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::vector::SparseVector;

/// Pivots smaller than this are never accepted during a build.
const BUILD_PIVOT_TOLERANCE: f64 = 1e-11;
/// A build pivot must be at least this fraction of the largest candidate in
/// its column.
const BUILD_RELATIVE_THRESHOLD: f64 = 0.1;
/// Eta pivots smaller than this make the update unusable.
const UPDATE_PIVOT_TOLERANCE: f64 = 1e-12;
/// Values below this are dropped when an index list is regenerated.
const DROP_TOLERANCE: f64 = 1e-14;
/// Expected result densities under this keep the index list.
const HYPER_SPARSE_RESULT: f64 = 0.1;

const UNPIVOTED: usize = usize::MAX;

/// Why a product-form update could not proceed as usual.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateHint {
    /// The eta chain reached its limit; the update was still applied but
    /// the factorization should be rebuilt at the next boundary.
    UpdateLimitReached,
    /// The eta pivot is numerically unusable; the update was not applied.
    SmallPivot,
}

/// Rank deficiency report from a build: position k of the basis could not
/// be pivoted (`columns[k]`), and row `rows[k]` received no pivot. Swapping
/// each deficient basic variable for the logical of the matching row makes
/// the basis nonsingular.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RankDeficiency {
    pub rows: Vec<usize>,
    pub columns: Vec<usize>,
}

impl RankDeficiency {
    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

/// LU factors of the basis matrix plus the product-form update chain.
#[derive(Debug)]
pub struct Factor {
    num_row: usize,
    update_limit: usize,
    valid: bool,

    // L is unit lower triangular in pivot order; per pivot position the
    // strictly-below entries are stored against original row indices.
    l_start: Vec<usize>,
    l_index: Vec<usize>,
    l_value: Vec<f64>,
    // U columns hold the strictly-above entries against pivot positions;
    // the diagonal is separate.
    u_start: Vec<usize>,
    u_index: Vec<usize>,
    u_value: Vec<f64>,
    u_diag: Vec<f64>,

    /// Pivot position -> original row, and its inverse.
    row_of_pos: Vec<usize>,
    pos_of_row: Vec<usize>,
    /// Pivot position -> basis position (column of B).
    col_of_pos: Vec<usize>,

    // Product-form etas over basis positions; the pivot entry is stored
    // apart from the off-pivot entries.
    pf_start: Vec<usize>,
    pf_index: Vec<usize>,
    pf_value: Vec<f64>,
    pf_pivot: Vec<(usize, f64)>,

    // Scratch sized to the factored matrix.
    work: Vec<f64>,
    pos_mark: Vec<u32>,
    row_mark: Vec<u32>,
    stamp: u32,
}

impl Factor {
    pub fn new(num_row: usize, update_limit: usize) -> Self {
        Self {
            num_row,
            update_limit,
            valid: false,
            l_start: vec![0],
            l_index: Vec::new(),
            l_value: Vec::new(),
            u_start: vec![0],
            u_index: Vec::new(),
            u_value: Vec::new(),
            u_diag: Vec::new(),
            row_of_pos: Vec::new(),
            pos_of_row: vec![UNPIVOTED; num_row],
            col_of_pos: Vec::new(),
            pf_start: vec![0],
            pf_index: Vec::new(),
            pf_value: Vec::new(),
            pf_pivot: Vec::new(),
            work: vec![0.0; num_row],
            pos_mark: vec![0; num_row],
            row_mark: vec![0; num_row],
            stamp: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Length of the product-form chain since the last build.
    pub fn update_count(&self) -> usize {
        self.pf_pivot.len()
    }

    /// Factorize the basis matrix from scratch.
    ///
    /// Columns are processed in order of increasing fill potential; within a
    /// column the pivot is the entry of smallest row degree among those
    /// within [`BUILD_RELATIVE_THRESHOLD`] of the largest magnitude. On rank
    /// deficiency the factorization is left invalid and the unpivotable
    /// basis positions and unpivoted rows are reported so the caller can
    /// repair the basis.
    pub fn build(
        &mut self,
        matrix: &SparseMatrix,
        basic_index: &[usize],
    ) -> Result<(), RankDeficiency> {
        debug_assert_eq!(basic_index.len(), self.num_row);
        let m = self.num_row;
        self.reset();

        // Gather the basis columns once; a logical is the positive unit
        // vector of its row.
        let num_col = matrix.num_col();
        let columns: Vec<Vec<(usize, f64)>> = basic_index
            .iter()
            .map(|&var| {
                if var < num_col {
                    matrix.column(var).collect()
                } else {
                    vec![(var - num_col, 1.0)]
                }
            })
            .collect();

        let mut row_degree = vec![0usize; m];
        for column in &columns {
            for &(i, _) in column {
                row_degree[i] += 1;
            }
        }

        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by_key(|&bpos| columns[bpos].len());

        let mut no_pivot_columns = Vec::new();
        let mut touched: Vec<usize> = Vec::with_capacity(m);
        let mut reach: Vec<usize> = Vec::with_capacity(m);
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for &bpos in &order {
            self.stamp += 1;
            touched.clear();
            reach.clear();

            // Scatter the column and collect the pivoted positions its
            // elimination can reach, following the pattern of L.
            for &(i, value) in &columns[bpos] {
                self.work[i] += value;
                self.touch_row(i, &mut touched);
                self.reach_from(i, &mut reach, &mut stack);
            }
            reach.sort_unstable();

            // Eliminate with the reached pivots in pivot order.
            for &p in reach.iter() {
                let t = self.work[self.row_of_pos[p]];
                if t == 0.0 {
                    continue;
                }
                for k in self.l_start[p]..self.l_start[p + 1] {
                    let i = self.l_index[k];
                    self.work[i] -= self.l_value[k] * t;
                    self.touch_row(i, &mut touched);
                }
            }

            // Split the result into the U column (pivoted rows) and the
            // pivot candidates (unpivoted rows).
            let mut max_candidate = 0.0_f64;
            for &i in &touched {
                if self.pos_of_row[i] == UNPIVOTED {
                    max_candidate = max_candidate.max(self.work[i].abs());
                }
            }

            if max_candidate < BUILD_PIVOT_TOLERANCE {
                no_pivot_columns.push(bpos);
                for &i in &touched {
                    self.work[i] = 0.0;
                }
                continue;
            }

            let acceptable = BUILD_RELATIVE_THRESHOLD * max_candidate;
            let mut pivot_row = UNPIVOTED;
            for &i in &touched {
                if self.pos_of_row[i] == UNPIVOTED
                    && self.work[i].abs() >= acceptable
                    && (pivot_row == UNPIVOTED || row_degree[i] < row_degree[pivot_row])
                {
                    pivot_row = i;
                }
            }
            let pivot_value = self.work[pivot_row];

            let p = self.row_of_pos.len();
            for &i in &touched {
                let value = self.work[i];
                self.work[i] = 0.0;
                if value == 0.0 || i == pivot_row {
                    continue;
                }
                let pos = self.pos_of_row[i];
                if pos == UNPIVOTED {
                    self.l_index.push(i);
                    self.l_value.push(value / pivot_value);
                } else {
                    self.u_index.push(pos);
                    self.u_value.push(value);
                }
            }
            self.l_start.push(self.l_index.len());
            self.u_start.push(self.u_index.len());
            self.u_diag.push(pivot_value);
            self.row_of_pos.push(pivot_row);
            self.pos_of_row[pivot_row] = p;
            self.col_of_pos.push(bpos);
        }

        if self.row_of_pos.len() < m {
            let rows = (0..m).filter(|&i| self.pos_of_row[i] == UNPIVOTED).collect();
            no_pivot_columns.sort_unstable();
            let deficiency = RankDeficiency {
                rows,
                columns: no_pivot_columns,
            };
            debug!(
                "factorization rank deficient: {} of {} pivots missing",
                deficiency.count(),
                m
            );
            return Err(deficiency);
        }

        self.valid = true;
        debug!(
            "factorized basis: dimension {}, fill-in {} (L) + {} (U)",
            m,
            self.l_index.len(),
            self.u_index.len()
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.valid = false;
        self.l_start.clear();
        self.l_start.push(0);
        self.l_index.clear();
        self.l_value.clear();
        self.u_start.clear();
        self.u_start.push(0);
        self.u_index.clear();
        self.u_value.clear();
        self.u_diag.clear();
        self.row_of_pos.clear();
        self.pos_of_row.fill(UNPIVOTED);
        self.col_of_pos.clear();
        self.pf_start.clear();
        self.pf_start.push(0);
        self.pf_index.clear();
        self.pf_value.clear();
        self.pf_pivot.clear();
    }

    fn touch_row(&mut self, row: usize, touched: &mut Vec<usize>) {
        if self.row_mark[row] != self.stamp {
            self.row_mark[row] = self.stamp;
            touched.push(row);
        }
    }

    /// Depth-first search through the pattern of L from `row`, collecting
    /// every pivot position whose elimination step can fire.
    fn reach_from(&mut self, row: usize, reach: &mut Vec<usize>, stack: &mut Vec<(usize, usize)>) {
        let start = self.pos_of_row[row];
        if start == UNPIVOTED || self.pos_mark[start] == self.stamp {
            return;
        }
        self.pos_mark[start] = self.stamp;
        stack.push((start, self.l_start[start]));

        while let Some(&(p, k)) = stack.last() {
            if k < self.l_start[p + 1] {
                stack.last_mut().unwrap().1 += 1;
                let child = self.pos_of_row[self.l_index[k]];
                if child != UNPIVOTED && self.pos_mark[child] != self.stamp {
                    self.pos_mark[child] = self.stamp;
                    stack.push((child, self.l_start[child]));
                }
            } else {
                reach.push(p);
                stack.pop();
            }
        }
    }

    /// Solve `B x = v` in place. `v` enters in row space and leaves in
    /// basis-position space.
    pub fn ftran(&mut self, v: &mut SparseVector, expected_density: f64) {
        debug_assert!(self.valid);
        let m = self.num_row;
        let array = v.dense_mut();

        // Forward solve with L, skipping never-filled positions.
        for p in 0..m {
            let t = array[self.row_of_pos[p]];
            if t == 0.0 {
                continue;
            }
            for k in self.l_start[p]..self.l_start[p + 1] {
                array[self.l_index[k]] -= self.l_value[k] * t;
            }
        }

        // Backward solve with U, scattering the result by basis position.
        for p in (0..m).rev() {
            let r = self.row_of_pos[p];
            let t = array[r];
            if t == 0.0 {
                continue;
            }
            array[r] = 0.0;
            let x = t / self.u_diag[p];
            self.work[self.col_of_pos[p]] = x;
            for k in self.u_start[p]..self.u_start[p + 1] {
                array[self.row_of_pos[self.u_index[k]]] -= self.u_value[k] * x;
            }
        }
        for p in 0..m {
            let bpos = self.col_of_pos[p];
            array[bpos] = self.work[bpos];
            self.work[bpos] = 0.0;
        }

        // Product-form chain, in append order.
        for e in 0..self.pf_pivot.len() {
            let (r, pivot) = self.pf_pivot[e];
            let t = array[r];
            if t == 0.0 {
                continue;
            }
            let x = t / pivot;
            array[r] = x;
            for k in self.pf_start[e]..self.pf_start[e + 1] {
                array[self.pf_index[k]] -= self.pf_value[k] * x;
            }
        }

        self.finish(v, expected_density);
    }

    /// Solve `B' x = v` in place. `v` enters in basis-position space and
    /// leaves in row space.
    pub fn btran(&mut self, v: &mut SparseVector, expected_density: f64) {
        debug_assert!(self.valid);
        let m = self.num_row;
        let array = v.dense_mut();

        // Transposed product-form chain, newest eta first.
        for e in (0..self.pf_pivot.len()).rev() {
            let (r, pivot) = self.pf_pivot[e];
            let mut t = array[r];
            for k in self.pf_start[e]..self.pf_start[e + 1] {
                t -= self.pf_value[k] * array[self.pf_index[k]];
            }
            array[r] = t / pivot;
        }

        // U' forward solve into scratch, consuming the input.
        for p in 0..m {
            let bpos = self.col_of_pos[p];
            let mut t = array[bpos];
            array[bpos] = 0.0;
            for k in self.u_start[p]..self.u_start[p + 1] {
                t -= self.u_value[k] * self.work[self.u_index[k]];
            }
            self.work[p] = if t == 0.0 { 0.0 } else { t / self.u_diag[p] };
        }

        // L' backward solve back into the vector, by original row.
        for p in (0..m).rev() {
            let mut t = self.work[p];
            self.work[p] = 0.0;
            for k in self.l_start[p]..self.l_start[p + 1] {
                t -= self.l_value[k] * array[self.l_index[k]];
            }
            array[self.row_of_pos[p]] = t;
        }

        self.finish(v, expected_density);
    }

    fn finish(&self, v: &mut SparseVector, expected_density: f64) {
        if expected_density < HYPER_SPARSE_RESULT {
            v.rebuild_index(DROP_TOLERANCE);
        } else {
            v.set_dense();
        }
    }

    /// Append the product-form eta of a basis change: `column` is the
    /// FTRAN'd entering column and `row_out` the leaving basis position.
    ///
    /// A numerically unusable pivot refuses the update; reaching the chain
    /// limit still applies it but asks for a rebuild.
    pub fn update(&mut self, column: &SparseVector, row_out: usize) -> Result<(), UpdateHint> {
        debug_assert!(self.valid);
        let pivot = column.value(row_out);
        if pivot.abs() < UPDATE_PIVOT_TOLERANCE {
            return Err(UpdateHint::SmallPivot);
        }

        for (i, value) in column.iter() {
            if i != row_out && value != 0.0 {
                self.pf_index.push(i);
                self.pf_value.push(value);
            }
        }
        self.pf_start.push(self.pf_index.len());
        self.pf_pivot.push((row_out, pivot));

        if self.pf_pivot.len() >= self.update_limit {
            return Err(UpdateHint::UpdateLimitReached);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use approx::assert_abs_diff_eq;

    use super::*;

    /// 3x3 structural matrix
    ///
    /// ```text
    ///      2  1  0
    ///      0  1  0
    ///      1  0  4
    /// ```
    fn test_matrix() -> SparseMatrix {
        let a_start = vec![0, 2, 4, 5];
        let a_index = vec![0, 2, 0, 1, 2];
        let a_value = vec![2.0, 1.0, 1.0, 1.0, 4.0];
        SparseMatrix::setup_logical_basis(3, 3, &a_start, &a_index, &a_value)
    }

    fn vector_from(entries: &[(usize, f64)], n: usize) -> SparseVector {
        let mut v = SparseVector::new(n);
        for &(i, value) in entries {
            v.add(i, value);
        }
        v
    }

    #[test]
    fn logical_basis_is_identity() {
        let matrix = test_matrix();
        let mut factor = Factor::new(3, 100);
        factor.build(&matrix, &[3, 4, 5]).unwrap();

        let mut v = vector_from(&[(0, 1.5), (2, -2.0)], 3);
        factor.ftran(&mut v, 0.0);
        assert_eq!(v.dense(), &[1.5, 0.0, -2.0]);
        factor.btran(&mut v, 0.0);
        assert_eq!(v.dense(), &[1.5, 0.0, -2.0]);
    }

    #[test]
    fn ftran_solves_structural_basis() {
        let matrix = test_matrix();
        let mut factor = Factor::new(3, 100);
        // B = A: full structural basis.
        factor.build(&matrix, &[0, 1, 2]).unwrap();

        // B x = [3, 1, 9]' has solution x = [1, 1, 2]'.
        let mut v = vector_from(&[(0, 3.0), (1, 1.0), (2, 9.0)], 3);
        factor.ftran(&mut v, 1.0);
        assert_abs_diff_eq!(v.dense()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.dense()[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.dense()[2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn btran_solves_transpose() {
        let matrix = test_matrix();
        let mut factor = Factor::new(3, 100);
        factor.build(&matrix, &[0, 1, 2]).unwrap();

        // B' x = [2, 2, 4]' has solution x = [1, 1, 1]' since column sums
        // of B are (3, 2, 4) -- check against an explicit solve instead:
        // B' x = b with b = [3, 2, 4]' gives x = [1, 1, 1]'.
        let mut v = vector_from(&[(0, 3.0), (1, 2.0), (2, 4.0)], 3);
        factor.btran(&mut v, 1.0);
        assert_abs_diff_eq!(v.dense()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.dense()[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.dense()[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn mixed_basis_with_logical() {
        let matrix = test_matrix();
        let mut factor = Factor::new(3, 100);
        // Columns: structural 1, logical of row 0, structural 2, giving
        // B = [[1, 1, 0], [1, 0, 0], [0, 0, 4]].
        factor.build(&matrix, &[1, 3, 2]).unwrap();

        // B x = [2, 1, 4]' -> x = [1, 1, 1]'.
        let mut v = vector_from(&[(0, 2.0), (1, 1.0), (2, 4.0)], 3);
        factor.ftran(&mut v, 1.0);
        assert_abs_diff_eq!(v.dense()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.dense()[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.dense()[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn update_matches_rebuild() {
        let matrix = test_matrix();
        let mut factor = Factor::new(3, 100);
        factor.build(&matrix, &[3, 4, 5]).unwrap();

        // Variable 0 replaces the logical in row 2.
        let mut entering = SparseVector::new(3);
        matrix.collect_column(&mut entering, 0, 1.0);
        factor.ftran(&mut entering, 0.0);
        factor.update(&entering, 2).unwrap();

        let mut rebuilt = Factor::new(3, 100);
        rebuilt.build(&matrix, &[3, 4, 0]).unwrap();

        let rhs = [(0, 1.0), (1, -2.0), (2, 3.0)];
        let mut updated_result = vector_from(&rhs, 3);
        factor.ftran(&mut updated_result, 1.0);
        let mut rebuilt_result = vector_from(&rhs, 3);
        rebuilt.ftran(&mut rebuilt_result, 1.0);
        for i in 0..3 {
            assert_abs_diff_eq!(
                updated_result.dense()[i],
                rebuilt_result.dense()[i],
                epsilon = 1e-12
            );
        }

        let mut updated_result = vector_from(&rhs, 3);
        factor.btran(&mut updated_result, 1.0);
        let mut rebuilt_result = vector_from(&rhs, 3);
        rebuilt.btran(&mut rebuilt_result, 1.0);
        for i in 0..3 {
            assert_abs_diff_eq!(
                updated_result.dense()[i],
                rebuilt_result.dense()[i],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn update_limit_is_reported() {
        let matrix = test_matrix();
        let mut factor = Factor::new(3, 1);
        factor.build(&matrix, &[3, 4, 5]).unwrap();

        let mut entering = SparseVector::new(3);
        matrix.collect_column(&mut entering, 0, 1.0);
        factor.ftran(&mut entering, 0.0);
        assert_eq!(
            factor.update(&entering, 2),
            Err(UpdateHint::UpdateLimitReached)
        );
        // The update was still applied.
        assert_eq!(factor.update_count(), 1);
    }

    #[test]
    fn small_pivot_is_refused() {
        let matrix = test_matrix();
        let mut factor = Factor::new(3, 100);
        factor.build(&matrix, &[3, 4, 5]).unwrap();

        let column = vector_from(&[(0, 1.0), (1, 1e-13)], 3);
        assert_eq!(factor.update(&column, 1), Err(UpdateHint::SmallPivot));
        assert_eq!(factor.update_count(), 0);
    }

    #[test]
    fn rank_deficiency_reports_rows_and_columns() {
        let matrix = test_matrix();
        let mut factor = Factor::new(3, 100);
        // Structural 0 twice: the second copy cannot be pivoted and row 1
        // never receives a pivot.
        let result = factor.build(&matrix, &[0, 0, 5]);
        let deficiency = result.unwrap_err();
        assert_eq!(deficiency.count(), 1);
        assert_eq!(deficiency.rows, vec![1]);
        assert!(!factor.is_valid());
        // The deficient basis position refers to one of the duplicates.
        assert!(deficiency.columns == vec![0] || deficiency.columns == vec![1]);
    }
}
