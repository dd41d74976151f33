//! HTTP request handlers.
//!
//! - `tile`: the tile endpoint
//! - `api`: catalog listing and manual reindex
//! - `metrics`: health check and Prometheus metrics
//! - `common`: error responses

pub mod api;
pub mod common;
pub mod metrics;
pub mod tile;

pub use api::{datasets_handler, reindex_handler, times_handler, DatasetsQuery, DatasetsResponse};
pub use common::ApiError;
pub use metrics::{health_handler, metrics_handler};
pub use tile::tile_handler;
