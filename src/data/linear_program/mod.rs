//! # Linear program representation
pub mod elements;
pub mod model;
pub mod solution;
