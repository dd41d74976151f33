//! GET /tile/{z}/{x}/{y}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use storage::ResolvedDataset;

use crate::handlers::common::ApiError;
use crate::request::TileQuery;
use crate::service::TileOutcome;
use crate::state::AppState;

/// Render a tile.
///
/// Rendered and fully transparent tiles are `image/png`. A request with no
/// dataset within the time tolerance gets an empty 200 response.
#[instrument(skip_all)]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((z, x, y)): Path<(u32, u32, String)>,
    Query(query): Query<TileQuery>,
) -> Result<Response, ApiError> {
    let request = query.into_request(z, x, &y)?;
    let outcome = state.tiles.render(request).await?;

    Ok(match outcome {
        TileOutcome::Rendered { png, resolved } | TileOutcome::Transparent { png, resolved } => {
            png_response(png, &resolved)
        }
        TileOutcome::NoMatch => StatusCode::OK.into_response(),
    })
}

fn png_response(png: Vec<u8>, resolved: &ResolvedDataset) -> Response {
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=300"),
        ],
        png,
    )
        .into_response();

    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&resolved.matched_time.to_rfc3339()) {
        headers.insert("x-matched-time", v);
    }
    if let Ok(v) = HeaderValue::from_str(&format!("{}", resolved.diff_hours)) {
        headers.insert("x-time-diff-hours", v);
    }
    response
}
