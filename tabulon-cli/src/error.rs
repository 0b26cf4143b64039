//! This module defines all the errors that can occur while executing tabulon-cli.

use std::path::PathBuf;

use thiserror::Error;

/// Error that occur during execution of Tabulon's CLI app
#[derive(Error, Debug)]
pub enum CliError {
    /// Error while reading a table file
    #[error("unable to read `{}`: {error}", filename.display())]
    Reading {
        /// Name of the file that could not be read
        filename: PathBuf,
        /// Underlying error
        error: tabulon_physical::Error,
    },
    /// Error while writing a table file
    #[error("unable to write `{}`: {error}", filename.display())]
    Writing {
        /// Name of the file that could not be written
        filename: PathBuf,
        /// Underlying error
        error: tabulon_physical::Error,
    },
    /// The output file exists and may not be replaced
    #[error("`{}` already exists, use --overwrite to replace it", filename.display())]
    OutputExists {
        /// Name of the existing file
        filename: PathBuf,
    },
    /// A requested column does not exist
    #[error("no column named `{name}`")]
    UnknownColumn {
        /// Name of the missing column
        name: String,
    },
    /// Some columns violate their declared characteristics
    #[error("{count} column(s) violate their declared characteristics")]
    Verification {
        /// Number of violating columns
        count: usize,
    },
    /// Error resulting from io operations
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// Error while serializing a summary as json
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}
