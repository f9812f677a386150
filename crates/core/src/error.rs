//! Error types for escarp
//!
//! Only input preparation (grid access, parameter validation, file I/O) fails
//! hard with these errors. Stage-local failures inside the cliff pipeline have
//! their own error types in `escarp-algorithms` and degrade to the baseline.

use thiserror::Error;

/// Main error type for escarp operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Non-finite elevation {value} at ({row}, {col})")]
    NonFiniteValue { row: usize, col: usize, value: f64 },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for building an [`Error::InvalidParameter`]
    pub fn invalid_param(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for escarp operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_message() {
        let err = Error::invalid_param("upscale_factor", 0, "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: upscale_factor = 0 (must be at least 1)"
        );
    }
}
