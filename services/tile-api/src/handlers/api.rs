//! Catalog API handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use storage::{DatasetRecord, ReindexReport};
use tile_common::{DatasetType, TileError};

use crate::handlers::common::ApiError;
use crate::indexing::run_sweep;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DatasetsQuery {
    #[serde(rename = "type")]
    pub dataset_type: Option<String>,
}

impl DatasetsQuery {
    fn parse_type(&self) -> Result<Option<DatasetType>, ApiError> {
        self.dataset_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| {
                t.parse::<DatasetType>()
                    .map_err(|e| ApiError(TileError::InvalidRequest(e.to_string())))
            })
            .transpose()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetsResponse {
    pub count: usize,
    pub datasets: Vec<DatasetRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimesResponse {
    pub dataset_type: DatasetType,
    pub times: Vec<DateTime<Utc>>,
}

/// GET /api/datasets?type= - Indexed files, optionally of one type
#[instrument(skip(state))]
pub async fn datasets_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<DatasetsQuery>,
) -> Result<Json<DatasetsResponse>, ApiError> {
    let datasets = state.catalog.list_records(query.parse_type()?).await?;
    Ok(Json(DatasetsResponse {
        count: datasets.len(),
        datasets,
    }))
}

/// GET /api/times?type= - Distinct valid times of one dataset type
#[instrument(skip(state))]
pub async fn times_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<DatasetsQuery>,
) -> Result<Json<TimesResponse>, ApiError> {
    let dataset_type = query
        .parse_type()?
        .unwrap_or(state.config.default_dataset_type);
    let times = state.catalog.available_times(dataset_type).await?;
    Ok(Json(TimesResponse {
        dataset_type,
        times,
    }))
}

/// POST /api/reindex - Run an indexing sweep now
pub async fn reindex_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ReindexReport>, ApiError> {
    info!("Manual reindex requested");
    Ok(Json(run_sweep(&state).await?))
}
