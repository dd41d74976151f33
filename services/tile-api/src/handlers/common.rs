//! Error responses shared by all handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use tile_common::TileError;

/// A [`TileError`] rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub TileError);

impl From<TileError> for ApiError {
    fn from(err: TileError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_client_error() {
            warn!(kind = self.0.kind(), error = %self.0, "Rejected request");
        } else {
            error!(kind = self.0.kind(), error = %self.0, "Request failed");
        }
        let body = Json(json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        }));
        (status, body).into_response()
    }
}
