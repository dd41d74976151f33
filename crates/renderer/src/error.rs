//! Error types for tile rendering.

use thiserror::Error;
use tile_common::TileError;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Pixel buffer does not match the declared dimensions.
    #[error("invalid image dimensions: {0}")]
    InvalidDimensions(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    /// A palette document or colour entry could not be used.
    #[error("invalid palette: {0}")]
    Palette(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;

impl From<RenderError> for TileError {
    fn from(err: RenderError) -> Self {
        TileError::Render(err.to_string())
    }
}
