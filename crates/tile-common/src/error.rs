//! Error types for the tile pipeline.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Primary error type for tile operations.
#[derive(Debug, Error)]
pub enum TileError {
    // === Request Errors ===
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    // === Data Errors ===
    #[error("No data: {0}")]
    NotFound(String),

    #[error("Failed to read grid source: {0}")]
    SourceRead(String),

    // === Infrastructure Errors ===
    #[error("Catalog store error: {0}")]
    Store(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Request timeout")]
    Timeout,
}

impl TileError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TileError::InvalidRequest(_)
            | TileError::InvalidTime(_)
            | TileError::UnknownVariable(_) => 400,

            TileError::NotFound(_) => 404,
            TileError::Store(_) => 503,
            TileError::Timeout => 504,

            _ => 500,
        }
    }

    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        self.http_status_code() == 400
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TileError::InvalidRequest(_) => "invalid_request",
            TileError::InvalidTime(_) => "invalid_time",
            TileError::UnknownVariable(_) => "unknown_variable",
            TileError::NotFound(_) => "not_found",
            TileError::SourceRead(_) => "source_read",
            TileError::Store(_) => "store",
            TileError::Render(_) => "render",
            TileError::Internal(_) => "internal",
            TileError::Timeout => "timeout",
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for TileError {
    fn from(err: std::io::Error) -> Self {
        TileError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for TileError {
    fn from(err: serde_json::Error) -> Self {
        TileError::Internal(format!("JSON error: {}", err))
    }
}

impl From<crate::time::TimeParseError> for TileError {
    fn from(err: crate::time::TimeParseError) -> Self {
        TileError::InvalidTime(err.to_string())
    }
}
