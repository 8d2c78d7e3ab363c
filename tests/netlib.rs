//! # Netlib and infeasibility test instances
//!
//! These tests read MPS problem files that are not shipped with the
//! crate. Drop the instances into `tests/problem_files` and enable the
//! `netlib` feature to run them:
//!
//! ```text
//! cargo test --features netlib
//! ```
#![cfg(feature = "netlib")]
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;

use dualis::algorithm::dual_simplex::driver::solve;
use dualis::algorithm::dual_simplex::options::SolverOptions;
use dualis::data::linear_program::elements::SolveStatus;
use dualis::data::linear_program::solution::SolveResult;
use dualis::io::import;

/// Relative path of the folder where the problem files are stored.
fn problem_file_directory() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("problem_files")
}

fn run(name: &str) -> SolveResult {
    let path = problem_file_directory().join(name).with_extension("mps");
    let problem = import(&path).unwrap();
    solve(&problem, &SolverOptions::default())
}

#[test]
fn afiro() {
    let result = run("afiro");
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_relative_eq!(result.objective, -4.6475314286e2, max_relative = 1e-4);
}

#[test]
fn adlittle() {
    let result = run("adlittle");
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_relative_eq!(result.objective, 2.2549496316e5, max_relative = 1e-4);
}

#[test]
fn blend() {
    let result = run("blend");
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_relative_eq!(result.objective, -3.0812149846e1, max_relative = 1e-4);
}

#[test]
fn sc50a() {
    let result = run("sc50a");
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_relative_eq!(result.objective, -6.4575077059e1, max_relative = 1e-4);
}

#[test]
fn woodinfe() {
    let result = run("woodinfe");
    assert_eq!(result.status, SolveStatus::Infeasible);
}

#[test]
fn gas11() {
    let result = run("gas11");
    assert_eq!(result.status, SolveStatus::Unbounded);
}

#[test]
#[ignore = "considerably larger than the rest of the suite"]
fn maros_r7() {
    let result = run("maros-r7");
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_relative_eq!(result.objective, 1.4971851665e6, max_relative = 1e-4);
}
