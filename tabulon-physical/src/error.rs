//! Error-handling module for the crate

use thiserror::Error;

use crate::datatypes::ElementType;

/// Error-Collection for all the possible Errors occurring in this crate
#[derive(Error, Debug)]
pub enum Error {
    /// An argument was rejected before any data was touched,
    /// e.g. a range out of bounds or mismatching element types.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation is not defined for the characteristics of the column,
    /// e.g. sorting a column that contains nulls.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// Serialized data could not be decoded.
    #[error("corrupt or incompatible data: {0}")]
    Corrupt(String),
    /// A dictionary encoded column outgrew the width of its codes.
    #[error("dictionary with {distinct} distinct values does not fit into {width}-byte codes")]
    CapacityOverflow {
        /// Maximal width of the codes in bytes
        width: usize,
        /// Number of distinct values that were requested
        distinct: usize,
    },
    /// Two columns of different element types were combined.
    #[error("element type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Element type of the receiving column
        expected: ElementType,
        /// Element type of the argument
        found: ElementType,
    },
    /// Error while reading or writing serialized columns
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    /// Returns `true` if this error rejected an argument.
    ///
    /// Element type mismatches count as invalid arguments.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::TypeMismatch { .. })
    }
}

/// Result type of the fallible operations in this crate
pub type Result<T> = std::result::Result<T, Error>;
