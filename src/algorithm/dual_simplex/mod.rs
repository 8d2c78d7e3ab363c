//! # The revised dual simplex
//!
//! The engine behind [`driver::solve`]: a working copy of the problem
//! ([`model`]), preparation passes over it ([`prep`]), the basis partition
//! with its work arrays ([`basis`]), the LU factorization of the basis
//! matrix with product-form updates ([`factor`]), and the pivot loop
//! itself ([`solver`]).
pub mod basis;
pub mod driver;
pub mod factor;
pub mod model;
pub mod options;
pub mod prep;
pub mod solver;
