//! Grid tile API service library.
//!
//! Exposes the service modules so the binary and integration tests share
//! one router.

pub mod config;
pub mod handlers;
pub mod indexing;
pub mod metrics;
pub mod request;
pub mod router;
pub mod service;
pub mod state;

pub use config::ServiceConfig;
pub use router::build_router;
pub use service::{TileOutcome, TileService, TileSettings};
pub use state::AppState;
