//! # A revised dual simplex solver.
//!
//! Solves large sparse linear programs of the form `min c'x` subject to
//! `l_r <= Ax <= u_r` and `l_c <= x <= u_c` with the revised dual simplex
//! method: an LU factorization of the basis matrix kept current through
//! product-form updates, dual steepest-edge pricing and a two-pass ratio
//! test with bound flipping.
//!
//! The problem is read from an MPS file through the [`io`] module or built
//! directly as a [`data::linear_program::model::LpProblem`]; solving goes
//! through [`algorithm::dual_simplex::driver::solve`].
pub mod algorithm;
pub mod data;
pub mod io;
