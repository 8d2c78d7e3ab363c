//! # Reading of linear programs
//!
//! Takes a file path, chooses a parser by extension and returns an
//! [`LpProblem`] ready for the solver. Only the MPS format is currently
//! supported.
use std::fs;
use std::path::Path;

use crate::data::linear_program::model::LpProblem;
use crate::io::error::Import;

pub mod error;
pub mod mps;

/// Import a problem from a file.
///
/// # Errors
///
/// When the extension is unknown, the file cannot be read, its contents do
/// not parse, or the described program is inconsistent.
pub fn import(file_path: &Path) -> Result<LpProblem, Import> {
    let program = fs::read_to_string(file_path)?;

    match file_path.extension().and_then(|e| e.to_str()) {
        Some("mps" | "MPS" | "sif" | "SIF") => mps::parse(&program),
        Some(other) => Err(Import::FileExtension(format!(
            "unrecognised file extension \"{}\" of file {:?}",
            other, file_path
        ))),
        None => Err(Import::FileExtension(format!(
            "could not read an extension from file path {:?}",
            file_path
        ))),
    }
}
