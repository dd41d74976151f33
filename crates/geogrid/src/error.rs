//! Error types for grid source access.

use thiserror::Error;

/// Result type for grid source operations.
pub type GeoGridResult<T> = Result<T, GeoGridError>;

#[derive(Error, Debug)]
pub enum GeoGridError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file could not be opened as a grid
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Missing coordinate variable or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Unsupported time units: {0}")]
    TimeUnits(String),
}

impl GeoGridError {
    pub fn open(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        GeoGridError::Open {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl From<GeoGridError> for tile_common::TileError {
    fn from(err: GeoGridError) -> Self {
        match err {
            GeoGridError::VariableNotFound(name) => tile_common::TileError::UnknownVariable(name),
            other => tile_common::TileError::SourceRead(other.to_string()),
        }
    }
}
