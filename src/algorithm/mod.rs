//! # Algorithms to solve linear programs
pub mod dual_simplex;
