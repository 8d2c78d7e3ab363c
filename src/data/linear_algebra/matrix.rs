//! # Column- and row-wise constraint matrix
//!
//! The simplex iterates over the constraint matrix in both orientations:
//! FTRAN gathers columns, PRICE multiplies a row-space vector against the
//! nonbasic columns. The row-wise copy keeps, per row, the entries of
//! nonbasic columns ahead of those of basic columns so that PRICE scans
//! only the nonbasic half; a pivot swaps the entering and leaving column
//! between the two halves.
//!
//! Logical (slack) columns are implicit positive unit vectors and are not
//! stored in either copy.
use crate::data::linear_algebra::vector::SparseVector;

/// Column-wise and partitioned row-wise copies of the structural matrix.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    num_col: usize,
    num_row: usize,
    // Column-wise copy.
    a_start: Vec<usize>,
    a_index: Vec<usize>,
    a_value: Vec<f64>,
    // Row-wise copy; entries of nonbasic columns occupy
    // `ar_start[i]..ar_nonbasic_end[i]`, entries of basic columns the rest
    // of the row.
    ar_start: Vec<usize>,
    ar_nonbasic_end: Vec<usize>,
    ar_index: Vec<usize>,
    ar_value: Vec<f64>,
}

impl SparseMatrix {
    /// General setup: the row-wise copy is partitioned according to
    /// `nonbasic_flag` (indexed by structural column).
    pub fn setup(
        num_col: usize,
        num_row: usize,
        a_start: &[usize],
        a_index: &[usize],
        a_value: &[f64],
        nonbasic_flag: &[i8],
    ) -> Self {
        debug_assert_eq!(a_start.len(), num_col + 1);
        let nnz = a_start[num_col];

        // Count the two halves of every row.
        let mut nonbasic_count = vec![0; num_row];
        let mut basic_count = vec![0; num_row];
        for j in 0..num_col {
            let counts = if nonbasic_flag[j] != 0 {
                &mut nonbasic_count
            } else {
                &mut basic_count
            };
            for k in a_start[j]..a_start[j + 1] {
                counts[a_index[k]] += 1;
            }
        }

        let mut ar_start = vec![0; num_row + 1];
        let mut ar_nonbasic_end = vec![0; num_row];
        for i in 0..num_row {
            ar_nonbasic_end[i] = ar_start[i] + nonbasic_count[i];
            ar_start[i + 1] = ar_start[i] + nonbasic_count[i] + basic_count[i];
        }

        let mut nonbasic_fill: Vec<usize> = ar_start[..num_row].to_vec();
        let mut basic_fill: Vec<usize> = ar_nonbasic_end.clone();
        let mut ar_index = vec![0; nnz];
        let mut ar_value = vec![0.0; nnz];
        for j in 0..num_col {
            let fill = if nonbasic_flag[j] != 0 {
                &mut nonbasic_fill
            } else {
                &mut basic_fill
            };
            for k in a_start[j]..a_start[j + 1] {
                let i = a_index[k];
                let put = fill[i];
                fill[i] += 1;
                ar_index[put] = j;
                ar_value[put] = a_value[k];
            }
        }

        Self {
            num_col,
            num_row,
            a_start: a_start.to_vec(),
            a_index: a_index.to_vec(),
            a_value: a_value.to_vec(),
            ar_start,
            ar_nonbasic_end,
            ar_index,
            ar_value,
        }
    }

    /// Specialised setup for the all-logicals basis: every structural
    /// column is nonbasic, so the partition step is skipped.
    pub fn setup_logical_basis(
        num_col: usize,
        num_row: usize,
        a_start: &[usize],
        a_index: &[usize],
        a_value: &[f64],
    ) -> Self {
        let nnz = a_start[num_col];

        let mut count = vec![0; num_row];
        for &i in &a_index[..nnz] {
            count[i] += 1;
        }
        let mut ar_start = vec![0; num_row + 1];
        for i in 0..num_row {
            ar_start[i + 1] = ar_start[i] + count[i];
        }
        let ar_nonbasic_end = ar_start[1..].to_vec();

        let mut fill: Vec<usize> = ar_start[..num_row].to_vec();
        let mut ar_index = vec![0; nnz];
        let mut ar_value = vec![0.0; nnz];
        for j in 0..num_col {
            for k in a_start[j]..a_start[j + 1] {
                let i = a_index[k];
                let put = fill[i];
                fill[i] += 1;
                ar_index[put] = j;
                ar_value[put] = a_value[k];
            }
        }

        Self {
            num_col,
            num_row,
            a_start: a_start.to_vec(),
            a_index: a_index.to_vec(),
            a_value: a_value.to_vec(),
            ar_start,
            ar_nonbasic_end,
            ar_index,
            ar_value,
        }
    }

    pub fn num_col(&self) -> usize {
        self.num_col
    }

    pub fn num_row(&self) -> usize {
        self.num_row
    }

    /// Entries of structural column `j` as `(row, value)` pairs.
    pub fn column(&self, j: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        (self.a_start[j]..self.a_start[j + 1])
            .map(move |k| (self.a_index[k], self.a_value[k]))
    }

    /// `v += scale * A[:, var]` for a variable of the extended matrix: a
    /// structural column, or the positive unit vector of a logical.
    pub fn collect_column(&self, v: &mut SparseVector, var: usize, scale: f64) {
        if var < self.num_col {
            for k in self.a_start[var]..self.a_start[var + 1] {
                v.add(self.a_index[k], scale * self.a_value[k]);
            }
        } else {
            v.add(var - self.num_col, scale);
        }
    }

    /// `result[j] = A[:, j]' pi` for every structural column, walking the
    /// column-wise copy.
    pub fn price_by_col(&self, result: &mut SparseVector, pi: &SparseVector) {
        debug_assert_eq!(result.len(), self.num_col);
        let pi_array = pi.dense();
        for j in 0..self.num_col {
            let mut value = 0.0;
            for k in self.a_start[j]..self.a_start[j + 1] {
                value += pi_array[self.a_index[k]] * self.a_value[k];
            }
            if value != 0.0 {
                result.add(j, value);
            }
        }
    }

    /// Row-wise PRICE: multiplies only the nonbasic half of each row, so
    /// the result holds reduced values for nonbasic structurals only.
    pub fn price_by_row(&self, result: &mut SparseVector, pi: &SparseVector) {
        debug_assert_eq!(result.len(), self.num_col);
        for (i, multiplier) in pi.iter() {
            for k in self.ar_start[i]..self.ar_nonbasic_end[i] {
                result.add(self.ar_index[k], multiplier * self.ar_value[k]);
            }
        }
    }

    /// After a pivot, restore the row-wise partition: the entering column
    /// moves to the basic half, the leaving column to the nonbasic half.
    /// Logical variables are not stored and are skipped.
    pub fn update(&mut self, col_in: usize, col_out: usize) {
        if col_in < self.num_col {
            for k in self.a_start[col_in]..self.a_start[col_in + 1] {
                let i = self.a_index[k];
                let section = self.ar_start[i]..self.ar_nonbasic_end[i];
                let at = self.find_in_row(section, col_in);
                self.ar_nonbasic_end[i] -= 1;
                let last = self.ar_nonbasic_end[i];
                self.ar_index.swap(at, last);
                self.ar_value.swap(at, last);
            }
        }
        if col_out < self.num_col {
            for k in self.a_start[col_out]..self.a_start[col_out + 1] {
                let i = self.a_index[k];
                let section = self.ar_nonbasic_end[i]..self.ar_start[i + 1];
                let at = self.find_in_row(section, col_out);
                let first = self.ar_nonbasic_end[i];
                self.ar_nonbasic_end[i] += 1;
                self.ar_index.swap(at, first);
                self.ar_value.swap(at, first);
            }
        }
    }

    fn find_in_row(&self, section: std::ops::Range<usize>, col: usize) -> usize {
        for k in section.clone() {
            if self.ar_index[k] == col {
                return k;
            }
        }
        unreachable!("column {} missing from row section {:?}", col, section);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// 3x2 test matrix
    ///
    /// ```text
    ///      2  0
    ///      1  3
    ///      0 -1
    /// ```
    fn test_matrix() -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        (
            vec![0, 2, 4],
            vec![0, 1, 1, 2],
            vec![2.0, 1.0, 3.0, -1.0],
        )
    }

    #[test]
    fn collect_structural_and_logical() {
        let (start, index, value) = test_matrix();
        let matrix = SparseMatrix::setup_logical_basis(2, 3, &start, &index, &value);

        let mut v = SparseVector::new(3);
        matrix.collect_column(&mut v, 0, 2.0);
        assert_eq!(v.dense(), &[4.0, 2.0, 0.0]);

        matrix.collect_column(&mut v, 2 + 1, -1.0);
        assert_eq!(v.dense(), &[4.0, 1.0, 0.0]);
    }

    #[test]
    fn price_row_and_col_agree_on_nonbasic_columns() {
        let (start, index, value) = test_matrix();
        let matrix = SparseMatrix::setup_logical_basis(2, 3, &start, &index, &value);

        let mut pi = SparseVector::new(3);
        pi.add(0, 1.0);
        pi.add(1, -2.0);
        pi.add(2, 0.5);

        let mut by_row = SparseVector::new(2);
        matrix.price_by_row(&mut by_row, &pi);
        let mut by_col = SparseVector::new(2);
        matrix.price_by_col(&mut by_col, &pi);

        assert_eq!(by_row.dense(), by_col.dense());
        assert_eq!(by_row.dense(), &[0.0, -6.5]);
    }

    #[test]
    fn update_moves_column_out_of_priced_half() {
        let (start, index, value) = test_matrix();
        let nonbasic_flag = vec![1, 1];
        let mut matrix = SparseMatrix::setup(2, 3, &start, &index, &value, &nonbasic_flag);

        // Column 1 enters the basis, the leaving variable is a logical.
        matrix.update(1, 2 + 0);

        let mut pi = SparseVector::new(3);
        pi.add(1, 1.0);
        pi.add(2, 1.0);
        let mut row_ap = SparseVector::new(2);
        matrix.price_by_row(&mut row_ap, &pi);
        // Only column 0 is still nonbasic.
        assert_eq!(row_ap.dense(), &[1.0, 0.0]);

        // Swap back in: the leaving structural rejoins the priced half.
        matrix.update(2 + 0, 1);
        let mut row_ap = SparseVector::new(2);
        matrix.price_by_row(&mut row_ap, &pi);
        assert_eq!(row_ap.dense(), &[1.0, 2.0]);
    }

    #[test]
    fn partitioned_setup_skips_basic_columns() {
        let (start, index, value) = test_matrix();
        // Column 0 basic, column 1 nonbasic.
        let matrix = SparseMatrix::setup(2, 3, &start, &index, &value, &[0, 1]);

        let mut pi = SparseVector::new(3);
        pi.add(0, 1.0);
        pi.add(1, 1.0);
        let mut row_ap = SparseVector::new(2);
        matrix.price_by_row(&mut row_ap, &pi);
        assert_eq!(row_ap.dense(), &[0.0, 3.0]);
    }
}
