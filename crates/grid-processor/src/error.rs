//! Error types for grid processing.

use geogrid::GeoGridError;
use thiserror::Error;
use tile_common::TileError;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// The variable is neither in the file nor derivable from it.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// The selected slice cannot be arranged as latitude x longitude.
    #[error("invalid grid shape: {0}")]
    InvalidShape(String),

    /// A requested ordinal is outside its axis.
    #[error("selection out of range: {0}")]
    OutOfRange(String),

    /// The field has no valid samples to derive statistics from.
    #[error("no valid data: {0}")]
    NoValidData(String),

    /// Failed to read from the grid source.
    #[error(transparent)]
    Source(#[from] GeoGridError),
}

impl GridProcessorError {
    /// Create an InvalidShape error.
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }

    /// Create an OutOfRange error.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }
}

/// Result type for grid processing operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;

impl From<GridProcessorError> for TileError {
    fn from(err: GridProcessorError) -> Self {
        match err {
            GridProcessorError::UnknownVariable(name) => TileError::UnknownVariable(name),
            GridProcessorError::NoValidData(msg) => TileError::NotFound(msg),
            GridProcessorError::Source(e) => e.into(),
            other => TileError::SourceRead(other.to_string()),
        }
    }
}
