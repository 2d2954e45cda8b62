//! Error type shared by the loaders and table builders.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Unknown metric group: {0}")]
    UnknownGroup(String),

    #[error("Unrecognized metric file: {0}")]
    UnrecognizedMetricFile(String),

    #[error("InterOp file must have `bin` extension: {0}")]
    InvalidExtension(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Column `{column}` not found in: {valid:?} - column not consistent with level or misspelled")]
    UnknownColumn { column: String, valid: Vec<String> },

    #[error("Column shape mismatch: expected {expected} values, found {actual}")]
    InvalidColumnShape { expected: usize, actual: usize },

    #[error("cannot open file {}", .0.display())]
    RunInfoNotFound(PathBuf),

    #[error("Error parsing RunInfo: {0}")]
    RunInfoParse(String),

    #[error("Bad format in {file}: {reason}")]
    BadFormat { file: String, reason: String },

    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, TableError>;

impl TableError {
    /// Builds an `UnknownColumn` error with the valid names sorted
    pub fn unknown_column<I, S>(column: &str, valid: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut valid: Vec<String> = valid.into_iter().map(Into::into).collect();
        valid.sort();

        TableError::UnknownColumn { column: column.to_owned(), valid }
    }
}
