//! Error types for the adaptation layer.

use crate::protocol::{Format, Oid};
use thiserror::Error;

/// The main error type for adaptation operations.
#[derive(Debug, Error)]
pub enum AdaptError {
    /// No dumper registered for a type in the requested format.
    #[error("cannot adapt type {ty} to format {format}")]
    CannotAdapt { ty: &'static str, format: Format },

    /// No loader for the OID and no fallback loader for unknown types.
    #[error("no loader available for oid {oid} in format {format}")]
    LoaderNotFound { oid: Oid, format: Format },

    /// Rows requested before a result was bound.
    #[error("result not set")]
    ResultNotSet,

    /// Row range outside the bound result.
    #[error("rows must be included between 0 and {ntuples} (got {row0}..{row1})")]
    RowRange {
        row0: usize,
        row1: usize,
        ntuples: usize,
    },

    /// Flat record length differs from the number of column loaders.
    #[error("cannot load sequence of {got} items: {expected} loaders registered")]
    SequenceShape { got: usize, expected: usize },

    /// Parameter and format lists of different lengths.
    #[error("got {params} parameters but {formats} formats")]
    FormatCount { params: usize, formats: usize },

    /// A list contains itself, directly or through a nested list.
    #[error("cannot dump a recursive list")]
    RecursiveList,

    /// Registration rejected before any use.
    #[error("invalid registration: {0}")]
    Registration(String),

    /// Bytes or values a codec cannot handle.
    #[error("data error: {0}")]
    Data(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AdaptError {
    /// Create a data error from anything printable.
    pub fn data(message: impl std::fmt::Display) -> Self {
        Self::Data(message.to_string())
    }
}

/// Result type alias for adaptation operations.
pub type AdaptResult<T> = Result<T, AdaptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdaptError::CannotAdapt {
            ty: "json",
            format: Format::Binary,
        };
        assert_eq!(err.to_string(), "cannot adapt type json to format BINARY");

        let err = AdaptError::SequenceShape {
            got: 3,
            expected: 2,
        };
        assert_eq!(
            err.to_string(),
            "cannot load sequence of 3 items: 2 loaders registered"
        );
    }
}
