//! # Data structures
//!
//! Containers for sparse linear algebra and the linear program itself. The
//! algorithm module builds on these.
pub mod linear_algebra;
pub mod linear_program;
