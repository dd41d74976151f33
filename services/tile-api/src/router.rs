//! HTTP router assembly.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

/// All routes with shared state and the standard middleware stack.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Tiles
        .route("/tile/:z/:x/:y", get(handlers::tile_handler))
        // Health check
        .route("/health", get(handlers::health_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        // Catalog API
        .route("/api/datasets", get(handlers::datasets_handler))
        .route("/api/times", get(handlers::times_handler))
        .route("/api/reindex", post(handlers::reindex_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
