//! # Preparation passes
//!
//! Four optional passes over the working copy before the solve, in fixed
//! order: transpose, scale, permute, tighten. Every pass is idempotent
//! behind its status flag and invalidates all derived state when it
//! changes the problem.
use itertools::Itertools;
use itertools::MinMaxResult;
use log::debug;
use rand::Rng;

use crate::algorithm::dual_simplex::model::{Scale, SimplexLp};
use crate::data::linear_program::elements::{is_infinite, INF};

/// Scale factors are kept within `[1/1024, 1024]`.
const MIN_ALLOWED_SCALE: f64 = 1.0 / 1024.0;
const MAX_ALLOWED_SCALE: f64 = 1024.0;
const MAX_ALLOWED_COST_SCALE: f64 = 1024.0;

/// Bounds beyond this take no part in constraint propagation.
const BIG_BOUND: f64 = 1e10;

/// Replace the primal by its dual when the problem is much wider than
/// tall. Cancels, leaving the working copy untouched, unless every column
/// and row fits one of the four dualizable bound patterns.
pub fn transpose(lp: &mut SimplexLp) {
    if lp.flags.is_transposed {
        return;
    }
    if lp.num_row == 0 || lp.num_col as f64 / lp.num_row as f64 > 0.2 {
        return;
    }
    // The dual construction below assumes minimization.
    if lp.is_maximization() {
        return;
    }

    // Primal column pattern -> dual row bounds.
    //
    //   free     row = c
    //   x >= 0   row <= c
    //   x <= 0   row >= c
    //   x = 0    row free
    let mut dual_row_lower = vec![0.0; lp.num_col];
    let mut dual_row_upper = vec![0.0; lp.num_col];
    for j in 0..lp.num_col {
        let lower = lp.col_lower[j];
        let upper = lp.col_upper[j];
        let cost = lp.col_cost[j];
        if is_infinite(-lower) && is_infinite(upper) {
            dual_row_lower[j] = cost;
            dual_row_upper[j] = cost;
        } else if lower == 0.0 && is_infinite(upper) {
            dual_row_lower[j] = -INF;
            dual_row_upper[j] = cost;
        } else if is_infinite(-lower) && upper == 0.0 {
            dual_row_lower[j] = cost;
            dual_row_upper[j] = INF;
        } else if lower == 0.0 && upper == 0.0 {
            dual_row_lower[j] = -INF;
            dual_row_upper[j] = INF;
        } else {
            return;
        }
    }

    // Primal row pattern -> dual column bounds and cost.
    //
    //   row = b     y free
    //   row <= b    y <= 0
    //   row >= b    y >= 0
    //   row free    y = 0
    let mut dual_col_lower = vec![0.0; lp.num_row];
    let mut dual_col_upper = vec![0.0; lp.num_row];
    let mut dual_cost = vec![0.0; lp.num_row];
    for i in 0..lp.num_row {
        let lower = lp.row_lower[i];
        let upper = lp.row_upper[i];
        if lower == upper {
            dual_col_lower[i] = -INF;
            dual_col_upper[i] = INF;
            dual_cost[i] = -lower;
        } else if is_infinite(-lower) && !is_infinite(upper) {
            dual_col_lower[i] = -INF;
            dual_col_upper[i] = 0.0;
            dual_cost[i] = -upper;
        } else if !is_infinite(-lower) && is_infinite(upper) {
            dual_col_lower[i] = 0.0;
            dual_col_upper[i] = INF;
            dual_cost[i] = -lower;
        } else if is_infinite(-lower) && is_infinite(upper) {
            dual_col_lower[i] = 0.0;
            dual_col_upper[i] = 0.0;
            dual_cost[i] = 0.0;
        } else {
            return;
        }
    }

    let (ar_start, ar_index, ar_value) =
        transpose_matrix(lp.num_col, lp.num_row, &lp.a_start, &lp.a_index, &lp.a_value);

    debug!(
        "transposing: {} columns x {} rows becomes {} x {}",
        lp.num_col, lp.num_row, lp.num_row, lp.num_col
    );
    std::mem::swap(&mut lp.num_col, &mut lp.num_row);
    lp.a_start = ar_start;
    lp.a_index = ar_index;
    lp.a_value = ar_value;
    lp.col_lower = dual_col_lower;
    lp.col_upper = dual_col_upper;
    lp.col_cost = dual_cost;
    lp.row_lower = dual_row_lower;
    lp.row_upper = dual_row_upper;
    lp.scale = Scale::identity(lp.num_col, lp.num_row);
    lp.col_permutation = (0..lp.num_col).collect();
    // The dual objective differs from the primal one by sign and offset;
    // both are restored when the solution is mapped back.
    lp.offset = 0.0;
    lp.initialise_random_vectors();

    lp.flags.is_transposed = true;
    lp.flags.invalidate_derived();
}

fn transpose_matrix(
    num_col: usize,
    num_row: usize,
    a_start: &[usize],
    a_index: &[usize],
    a_value: &[f64],
) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
    let nnz = a_start[num_col];
    let mut count = vec![0usize; num_row];
    for &i in &a_index[..nnz] {
        count[i] += 1;
    }
    let mut ar_start = vec![0; num_row + 1];
    for i in 0..num_row {
        ar_start[i + 1] = ar_start[i] + count[i];
    }
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
    (ar_start, ar_index, ar_value)
}

/// Geometric-mean equilibration of the matrix, bounds and costs, with the
/// final factors rounded to powers of two so that applying and undoing
/// them is exact in binary floating point.
pub fn scale(lp: &mut SimplexLp) {
    if lp.flags.is_scaled {
        return;
    }
    lp.scale = Scale::identity(lp.num_col, lp.num_row);

    // Skip matrix scaling when all entry magnitudes already sit in a
    // narrow band.
    let well_scaled = match lp.a_value.iter().map(|v| v.abs()).minmax() {
        MinMaxResult::NoElements => true,
        MinMaxResult::OneElement(v) => v >= 0.2 && v <= 5.0,
        MinMaxResult::MinMax(min, max) => min >= 0.2 && max <= 5.0,
    };
    if well_scaled {
        scale_costs(lp);
        lp.flags.is_scaled = true;
        lp.flags.invalidate_derived();
        return;
    }

    // Fold small costs into the column measure.
    let min_nonzero_cost = lp
        .col_cost
        .iter()
        .filter(|&&c| c != 0.0)
        .map(|c| c.abs())
        .fold(f64::INFINITY, f64::min);
    let include_cost = min_nonzero_cost < 0.1;

    let mut row_min = vec![f64::INFINITY; lp.num_row];
    let mut row_max = vec![0.0_f64; lp.num_row];
    for _ in 0..6 {
        for j in 0..lp.num_col {
            let mut col_min = f64::INFINITY;
            let mut col_max = 0.0_f64;
            let cost = lp.col_cost[j].abs();
            if include_cost && cost != 0.0 {
                col_min = col_min.min(cost);
                col_max = col_max.max(cost);
            }
            for k in lp.a_start[j]..lp.a_start[j + 1] {
                let value = lp.a_value[k].abs() * lp.scale.row[lp.a_index[k]];
                col_min = col_min.min(value);
                col_max = col_max.max(value);
            }
            lp.scale.col[j] = if col_max == 0.0 {
                // Empty column: nothing to equilibrate.
                1.0
            } else {
                (1.0 / (col_min * col_max).sqrt()).clamp(MIN_ALLOWED_SCALE, MAX_ALLOWED_SCALE)
            };
            for k in lp.a_start[j]..lp.a_start[j + 1] {
                let i = lp.a_index[k];
                let value = lp.a_value[k].abs() * lp.scale.col[j];
                row_min[i] = row_min[i].min(value);
                row_max[i] = row_max[i].max(value);
            }
        }
        for i in 0..lp.num_row {
            lp.scale.row[i] = if row_max[i] == 0.0 {
                1.0
            } else {
                (1.0 / (row_min[i] * row_max[i]).sqrt()).clamp(MIN_ALLOWED_SCALE, MAX_ALLOWED_SCALE)
            };
        }
        row_min.fill(f64::INFINITY);
        row_max.fill(0.0);
    }

    // Power-of-two rounding keeps multiply and divide exact.
    for scale in lp.scale.col.iter_mut().chain(lp.scale.row.iter_mut()) {
        *scale = (2.0_f64).powf((scale.log2() + 0.5).floor());
    }

    for j in 0..lp.num_col {
        for k in lp.a_start[j]..lp.a_start[j + 1] {
            lp.a_value[k] *= lp.scale.col[j] * lp.scale.row[lp.a_index[k]];
        }
    }
    for j in 0..lp.num_col {
        if !is_infinite(-lp.col_lower[j]) {
            lp.col_lower[j] /= lp.scale.col[j];
        }
        if !is_infinite(lp.col_upper[j]) {
            lp.col_upper[j] /= lp.scale.col[j];
        }
        lp.col_cost[j] *= lp.scale.col[j];
    }
    for i in 0..lp.num_row {
        if !is_infinite(-lp.row_lower[i]) {
            lp.row_lower[i] *= lp.scale.row[i];
        }
        if !is_infinite(lp.row_upper[i]) {
            lp.row_upper[i] *= lp.scale.row[i];
        }
    }

    scale_costs(lp);
    debug!(
        "scaled matrix: cost scale {}, {} columns, {} rows",
        lp.scale.cost, lp.num_col, lp.num_row
    );
    lp.flags.is_scaled = true;
    lp.flags.invalidate_derived();
}

/// Divide all costs by a power of two when the largest nonzero cost sits
/// outside `[1/16, 16]`.
///
/// Scaling costs up effectively loosens the dual tolerance, so the factor
/// is capped.
fn scale_costs(lp: &mut SimplexLp) {
    let max_nonzero_cost = lp
        .col_cost
        .iter()
        .map(|c| c.abs())
        .fold(0.0_f64, f64::max);
    if max_nonzero_cost <= 0.0 || (1.0 / 16.0..=16.0).contains(&max_nonzero_cost) {
        return;
    }
    let cost_scale =
        (2.0_f64).powf((max_nonzero_cost.log2() + 0.5).floor()).min(MAX_ALLOWED_COST_SCALE);
    if cost_scale == 1.0 {
        return;
    }
    for cost in &mut lp.col_cost {
        *cost /= cost_scale;
    }
    lp.scale.cost = cost_scale;
}

/// Shuffle the columns with the dedicated deterministic stream.
pub fn permute(lp: &mut SimplexLp) {
    if lp.flags.is_permuted {
        return;
    }
    let mut stream = lp.permutation_stream();
    let mut permutation: Vec<usize> = (0..lp.num_col).collect();
    for i in (1..lp.num_col).rev() {
        let j = stream.gen_range(0..=i);
        permutation.swap(i, j);
    }

    let mut a_start = vec![0; lp.num_col + 1];
    let mut a_index = Vec::with_capacity(lp.a_index.len());
    let mut a_value = Vec::with_capacity(lp.a_value.len());
    let mut col_cost = vec![0.0; lp.num_col];
    let mut col_lower = vec![0.0; lp.num_col];
    let mut col_upper = vec![0.0; lp.num_col];
    let mut col_scale = vec![1.0; lp.num_col];
    for (new, &old) in permutation.iter().enumerate() {
        a_start[new] = a_index.len();
        for k in lp.a_start[old]..lp.a_start[old + 1] {
            a_index.push(lp.a_index[k]);
            a_value.push(lp.a_value[k]);
        }
        col_cost[new] = lp.col_cost[old];
        col_lower[new] = lp.col_lower[old];
        col_upper[new] = lp.col_upper[old];
        col_scale[new] = lp.scale.col[old];
    }
    a_start[lp.num_col] = a_index.len();

    lp.a_start = a_start;
    lp.a_index = a_index;
    lp.a_value = a_value;
    lp.col_cost = col_cost;
    lp.col_lower = col_lower;
    lp.col_upper = col_upper;
    lp.scale.col = col_scale;
    lp.col_permutation = permutation;

    lp.flags.is_permuted = true;
    lp.flags.invalidate_derived();
}

/// Interval-arithmetic constraint propagation: derive tighter column
/// bounds from row activity ranges, for up to ten passes.
pub fn tighten(lp: &mut SimplexLp) {
    if lp.flags.is_tightened {
        return;
    }
    let (ar_start, ar_index, ar_value) =
        transpose_matrix(lp.num_col, lp.num_row, &lp.a_start, &lp.a_index, &lp.a_value);

    let col_lower_0 = lp.col_lower.clone();
    let col_upper_0 = lp.col_upper.clone();

    for _pass in 0..10 {
        let mut changed = 0usize;
        for i in 0..lp.num_row {
            if lp.row_lower[i] < -BIG_BOUND && lp.row_upper[i] > BIG_BOUND {
                continue;
            }

            // Activity range of the row, counting infinite contributions
            // separately.
            let mut inf_upper = 0usize;
            let mut inf_lower = 0usize;
            let mut activity_upper = 0.0;
            let mut activity_lower = 0.0;
            for k in ar_start[i]..ar_start[i + 1] {
                let j = ar_index[k];
                let value = ar_value[k];
                let (lower, upper) = if value > 0.0 {
                    (lp.col_lower[j], lp.col_upper[j])
                } else {
                    (-lp.col_upper[j], -lp.col_lower[j])
                };
                let magnitude = value.abs();
                if upper < BIG_BOUND {
                    activity_upper += upper * magnitude;
                } else {
                    inf_upper += 1;
                }
                if lower > -BIG_BOUND {
                    activity_lower += lower * magnitude;
                } else {
                    inf_lower += 1;
                }
            }

            activity_upper += 1e-8 * activity_upper.abs();
            activity_lower -= 1e-8 * activity_lower.abs();
            let lower_margin = if activity_lower.abs() > 1e8 {
                1e-12 * activity_lower.abs()
            } else {
                0.0
            };
            let upper_margin = if activity_upper.abs() > 1e8 {
                1e-12 * activity_upper.abs()
            } else {
                0.0
            };

            // Redundant row: its activity range cannot leave the bounds.
            let reach_upper = activity_upper + inf_upper as f64 * 1e31;
            let reach_lower = activity_lower - inf_lower as f64 * 1e31;
            if reach_upper <= lp.row_upper[i] + 1e-7 && reach_lower >= lp.row_lower[i] - 1e-7 {
                continue;
            }

            let row_lower = lp.row_lower[i];
            let row_upper = lp.row_upper[i];
            for k in ar_start[i]..ar_start[i + 1] {
                let j = ar_index[k];
                let value = ar_value[k];
                let col_lower = lp.col_lower[j];
                let col_upper = lp.col_upper[j];
                let mut new_lower = -INF;
                let mut new_upper = INF;

                if value > 0.0 {
                    if row_lower > -BIG_BOUND
                        && inf_upper <= 1
                        && (inf_upper == 0 || col_upper > BIG_BOUND)
                    {
                        new_lower = (row_lower - activity_upper) / value
                            + (1 - inf_upper as i64) as f64 * col_upper
                            - upper_margin;
                    }
                    if row_upper < BIG_BOUND
                        && inf_lower <= 1
                        && (inf_lower == 0 || col_lower < -BIG_BOUND)
                    {
                        new_upper = (row_upper - activity_lower) / value
                            + (1 - inf_lower as i64) as f64 * col_lower
                            + lower_margin;
                    }
                } else {
                    if row_lower > -BIG_BOUND
                        && inf_upper <= 1
                        && (inf_upper == 0 || col_lower < -BIG_BOUND)
                    {
                        new_upper = (row_lower - activity_upper) / value
                            + (1 - inf_upper as i64) as f64 * col_lower
                            + upper_margin;
                    }
                    if row_upper < BIG_BOUND
                        && inf_lower <= 1
                        && (inf_lower == 0 || col_upper > BIG_BOUND)
                    {
                        new_lower = (row_upper - activity_lower) / value
                            + (1 - inf_lower as i64) as f64 * col_upper
                            - lower_margin;
                    }
                }

                if new_upper < col_upper - 1e-12 && new_upper < BIG_BOUND {
                    lp.col_upper[j] = new_upper.max(col_lower);
                    changed += 1;
                }
                if new_lower > col_lower + 1e-12 && new_lower > -BIG_BOUND {
                    lp.col_lower[j] = new_lower.min(col_upper);
                    changed += 1;
                }
            }
        }
        if changed == 0 {
            break;
        }
    }

    // Relax intervals that (nearly) collapsed, staying inside the original
    // interval.
    let use_tolerance = 1e-3;
    let relax = 100.0 * use_tolerance;
    for j in 0..lp.num_col {
        if col_upper_0[j] > col_lower_0[j] + use_tolerance {
            if lp.col_upper[j] - lp.col_lower[j] < use_tolerance + 1e-8 {
                lp.col_lower[j] = col_lower_0[j].max(lp.col_lower[j] - relax);
                lp.col_upper[j] = col_upper_0[j].min(lp.col_upper[j] + relax);
            } else {
                if lp.col_upper[j] < col_upper_0[j] {
                    lp.col_upper[j] = (lp.col_upper[j] + relax).min(col_upper_0[j]);
                }
                if lp.col_lower[j] > col_lower_0[j] {
                    lp.col_lower[j] = (lp.col_lower[j] - relax).max(col_lower_0[j]);
                }
            }
        }
    }

    lp.flags.is_tightened = true;
    lp.flags.invalidate_derived();
}

#[cfg(test)]
mod test {
    use approx::assert_abs_diff_eq;

    use crate::data::linear_program::elements::Objective;
    use crate::data::linear_program::model::LpProblem;

    use super::*;

    fn badly_scaled_problem() -> LpProblem {
        LpProblem {
            num_col: 2,
            num_row: 2,
            a_start: vec![0, 2, 4],
            a_index: vec![0, 1, 0, 1],
            a_value: vec![1000.0, 0.001, 2000.0, 0.004],
            col_cost: vec![1.0, 2.0],
            col_lower: vec![0.0, 0.0],
            col_upper: vec![10.0, INF],
            row_lower: vec![-INF, -INF],
            row_upper: vec![500.0, 1.0],
            objective: Objective::Minimize,
            offset: 0.0,
            model_name: "badly-scaled".to_string(),
            col_names: vec!["x0".to_string(), "x1".to_string()],
            row_names: vec!["r0".to_string(), "r1".to_string()],
        }
    }

    mod scaling {
        use super::*;

        #[test]
        fn is_a_no_op_behind_its_flag() {
            let problem = badly_scaled_problem();
            let mut lp = SimplexLp::from_problem(&problem);
            scale(&mut lp);
            let snapshot = lp.a_value.clone();
            let cost_snapshot = lp.col_cost.clone();
            scale(&mut lp);
            assert_eq!(lp.a_value, snapshot);
            assert_eq!(lp.col_cost, cost_snapshot);
        }

        #[test]
        fn factors_are_powers_of_two() {
            let problem = badly_scaled_problem();
            let mut lp = SimplexLp::from_problem(&problem);
            scale(&mut lp);
            for &scale in lp.scale.col.iter().chain(lp.scale.row.iter()) {
                assert_eq!(scale.log2().fract(), 0.0, "{} is not a power of two", scale);
            }
        }

        #[test]
        fn skips_well_scaled_matrices() {
            let mut problem = badly_scaled_problem();
            problem.a_value = vec![1.0, 0.5, 2.0, 4.0];
            let mut lp = SimplexLp::from_problem(&problem);
            let original = lp.a_value.clone();
            scale(&mut lp);
            assert!(lp.flags.is_scaled);
            assert_eq!(lp.a_value, original);
            assert!(lp.scale.col.iter().all(|&s| s == 1.0));
        }

        #[test]
        fn relates_scaled_to_original_entries() {
            let problem = badly_scaled_problem();
            let mut lp = SimplexLp::from_problem(&problem);
            scale(&mut lp);
            for j in 0..problem.num_col {
                for k in problem.a_start[j]..problem.a_start[j + 1] {
                    let i = problem.a_index[k];
                    assert_abs_diff_eq!(
                        lp.a_value[k],
                        problem.a_value[k] * lp.scale.col[j] * lp.scale.row[i],
                    );
                }
            }
        }
    }

    mod permutation {
        use super::*;

        #[test]
        fn is_deterministic() {
            let problem = badly_scaled_problem();
            let mut a = SimplexLp::from_problem(&problem);
            let mut b = SimplexLp::from_problem(&problem);
            permute(&mut a);
            permute(&mut b);
            assert_eq!(a.col_permutation, b.col_permutation);
            assert_eq!(a.a_value, b.a_value);
        }

        #[test]
        fn inverse_restores_columns_bit_exactly() {
            let problem = badly_scaled_problem();
            let mut lp = SimplexLp::from_problem(&problem);
            permute(&mut lp);

            for (new, &old) in lp.col_permutation.clone().iter().enumerate() {
                assert_eq!(lp.col_cost[new], problem.col_cost[old]);
                assert_eq!(lp.col_lower[new], problem.col_lower[old]);
                assert_eq!(lp.col_upper[new], problem.col_upper[old]);
                let original: Vec<(usize, f64)> = (problem.a_start[old]
                    ..problem.a_start[old + 1])
                    .map(|k| (problem.a_index[k], problem.a_value[k]))
                    .collect();
                let permuted: Vec<(usize, f64)> = (lp.a_start[new]..lp.a_start[new + 1])
                    .map(|k| (lp.a_index[k], lp.a_value[k]))
                    .collect();
                assert_eq!(original, permuted);
            }
        }
    }

    mod transposition {
        use super::*;

        fn tall_problem() -> LpProblem {
            // One nonnegative column against six >= rows.
            LpProblem {
                num_col: 1,
                num_row: 6,
                a_start: vec![0, 6],
                a_index: vec![0, 1, 2, 3, 4, 5],
                a_value: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                col_cost: vec![1.0],
                col_lower: vec![0.0],
                col_upper: vec![INF],
                row_lower: vec![1.0; 6],
                row_upper: vec![INF; 6],
                objective: Objective::Minimize,
                offset: 0.0,
                model_name: "tall".to_string(),
                col_names: vec!["x".to_string()],
                row_names: (0..6).map(|i| format!("r{}", i)).collect(),
            }
        }

        #[test]
        fn dualizes_a_tall_problem() {
            let problem = tall_problem();
            let mut lp = SimplexLp::from_problem(&problem);
            transpose(&mut lp);
            assert!(lp.flags.is_transposed);
            assert_eq!(lp.num_col, 6);
            assert_eq!(lp.num_row, 1);
            // y >= 0 with cost -b, one row A'y <= c.
            assert!(lp.col_lower.iter().all(|&l| l == 0.0));
            assert_eq!(lp.col_cost, vec![-1.0; 6]);
            assert_eq!(lp.row_upper, vec![1.0]);
        }

        #[test]
        fn cancels_on_wide_problems() {
            let problem = badly_scaled_problem();
            let mut lp = SimplexLp::from_problem(&problem);
            transpose(&mut lp);
            assert!(!lp.flags.is_transposed);
            assert_eq!(lp.num_col, 2);
        }

        #[test]
        fn cancels_on_general_bounds() {
            let mut problem = tall_problem();
            // A boxed column does not match any dualizable pattern.
            problem.col_upper = vec![10.0];
            let mut lp = SimplexLp::from_problem(&problem);
            transpose(&mut lp);
            assert!(!lp.flags.is_transposed);
        }
    }

    mod tightening {
        use super::*;

        #[test]
        fn propagates_row_bounds_to_columns() {
            // x0 + x1 <= 1 with x >= 0 bounds both columns by 1.
            let problem = LpProblem {
                num_col: 2,
                num_row: 1,
                a_start: vec![0, 1, 2],
                a_index: vec![0, 0],
                a_value: vec![1.0, 1.0],
                col_cost: vec![1.0, 1.0],
                col_lower: vec![0.0, 0.0],
                col_upper: vec![INF, INF],
                row_lower: vec![-INF],
                row_upper: vec![1.0],
                objective: Objective::Minimize,
                offset: 0.0,
                model_name: "tighten".to_string(),
                col_names: vec!["x0".to_string(), "x1".to_string()],
                row_names: vec!["r0".to_string()],
            };
            let mut lp = SimplexLp::from_problem(&problem);
            tighten(&mut lp);
            assert!(lp.flags.is_tightened);
            assert!(lp.col_upper[0] <= 1.0 + 0.2);
            assert!(lp.col_upper[1] <= 1.0 + 0.2);
        }
    }
}
