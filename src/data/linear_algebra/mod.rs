//! # Linear algebra
//!
//! Sparse vectors and matrices in the shapes the simplex kernels consume:
//! an indexed dense/sparse hybrid vector and a matrix held both column-wise
//! and row-wise.
pub mod matrix;
pub mod vector;
