//! # Error reporting for reading of linear program files
//!
//! A small hierarchy: [`Import`] is what callers see; it wraps IO
//! failures, syntax-level [`Parse`] errors carrying a file location, and
//! [`Inconsistency`] for files that parse but do not describe a coherent
//! linear program.
use std::error::Error;
use std::fmt;
use std::io;

/// Anything that can go wrong while importing a problem file.
#[derive(Debug)]
pub enum Import {
    /// The file extension of the provided file path is not known or
    /// supported.
    FileExtension(String),
    /// The file isn't found, or reading it failed or was interrupted.
    IO(io::Error),
    /// Contents of the file could not be parsed.
    Parse(Parse),
    /// There is a logical inconsistency in the described linear program,
    /// e.g. a bound for an unknown column.
    Inconsistency(Inconsistency),
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Import::FileExtension(message) => message.fmt(f),
            Import::IO(error) => error.fmt(f),
            Import::Parse(error) => error.fmt(f),
            Import::Inconsistency(error) => error.fmt(f),
        }
    }
}

impl Error for Import {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Import::FileExtension(_) => None,
            Import::IO(error) => Some(error),
            Import::Parse(error) => Some(error),
            Import::Inconsistency(error) => Some(error),
        }
    }
}

impl From<io::Error> for Import {
    fn from(error: io::Error) -> Self {
        Import::IO(error)
    }
}

/// A syntax error, pointing at the line that caused it.
#[derive(Debug, Eq, PartialEq)]
pub struct Parse {
    description: String,
    line_number: Option<usize>,
}

impl Parse {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            line_number: None,
        }
    }

    pub fn at_line(description: impl Into<String>, line_number: usize) -> Self {
        Self {
            description: description.into(),
            line_number: Some(line_number),
        }
    }
}

impl fmt::Display for Parse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_number {
            Some(line) => write!(f, "parse error at line {}: {}", line, self.description),
            None => write!(f, "parse error: {}", self.description),
        }
    }
}

impl Error for Parse {}

/// The file parsed, but the program it describes contradicts itself.
#[derive(Debug, Eq, PartialEq)]
pub struct Inconsistency {
    description: String,
}

impl Inconsistency {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inconsistent linear program: {}", self.description)
    }
}

impl Error for Inconsistency {}
