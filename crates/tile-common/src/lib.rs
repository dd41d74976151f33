//! Common types and utilities shared across the grid tile crates and services.

pub mod bbox;
pub mod dataset;
pub mod error;
pub mod range;
pub mod tile;
pub mod time;

pub use bbox::BoundingBox;
pub use dataset::DatasetType;
pub use error::{TileError, TileResult};
pub use range::ValueRange;
pub use tile::{TileCoord, TileGrid, TILE_SIZE};
pub use time::{parse_request_time, TimeParseError};
