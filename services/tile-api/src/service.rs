//! Tile orchestration.
//!
//! Each request runs through the same stages:
//!
//! ```text
//! TileRequest ─► resolve catalog ─► open handle ─► variable plan
//!                     │                                │
//!                 no match                          resample ─► all missing?
//!                     │                                │             │
//!                     ▼                            statistics    transparent
//!                  NoMatch                             │
//!                                                   colorize ─► encode PNG
//! ```
//!
//! The catalog lookup is async; everything after it runs on the blocking pool.
//! The whole pipeline is bounded by the request timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use grid_processor::{Interpolation, ResampledTile, VariablePlan};
use renderer::PaletteRegistry;
use storage::{Catalog, ResolvedDataset, ResourceCache};
use tile_common::{DatasetType, TileError, TileResult, TILE_SIZE};

use crate::metrics;
use crate::request::TileRequest;

/// Result of a tile request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum TileOutcome {
    /// A coloured tile.
    Rendered {
        png: Vec<u8>,
        resolved: ResolvedDataset,
    },
    /// The dataset matched but holds no data for this tile.
    Transparent {
        png: Vec<u8>,
        resolved: ResolvedDataset,
    },
    /// No dataset within the time tolerance.
    NoMatch,
}

impl TileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TileOutcome::Rendered { .. } => "rendered",
            TileOutcome::Transparent { .. } => "transparent",
            TileOutcome::NoMatch => "no_match",
        }
    }
}

/// Settings the orchestrator needs from the service configuration.
#[derive(Debug, Clone)]
pub struct TileSettings {
    pub tolerance_hours: f64,
    pub default_dataset_type: DatasetType,
    pub interpolation: Interpolation,
    pub timeout: Duration,
}

/// Stateless per-request pipeline over the shared catalog and caches.
#[derive(Clone)]
pub struct TileService {
    catalog: Catalog,
    cache: Arc<ResourceCache>,
    palettes: Arc<PaletteRegistry>,
    settings: TileSettings,
}

impl TileService {
    pub fn new(
        catalog: Catalog,
        cache: Arc<ResourceCache>,
        palettes: Arc<PaletteRegistry>,
        settings: TileSettings,
    ) -> Self {
        Self {
            catalog,
            cache,
            palettes,
            settings,
        }
    }

    /// Render one tile, bounded by the request timeout.
    pub async fn render(&self, request: TileRequest) -> TileResult<TileOutcome> {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.settings.timeout, self.run(request)).await {
            Ok(result) => result,
            Err(_) => Err(TileError::Timeout),
        };

        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(e) => e.kind(),
        };
        metrics::record_tile_request(outcome, start.elapsed());
        result
    }

    async fn run(&self, request: TileRequest) -> TileResult<TileOutcome> {
        let dataset_type = request
            .dataset_type
            .unwrap_or(self.settings.default_dataset_type);

        let resolved = self
            .catalog
            .resolve_nearest(dataset_type, request.time, self.settings.tolerance_hours)
            .await?;
        let Some(resolved) = resolved else {
            debug!(
                dataset_type = %dataset_type,
                time = %request.time,
                tolerance_hours = self.settings.tolerance_hours,
                "No dataset within tolerance"
            );
            return Ok(TileOutcome::NoMatch);
        };
        debug!(
            path = %resolved.path.display(),
            matched_time = %resolved.matched_time,
            diff_hours = resolved.diff_hours,
            time_ordinal = resolved.time_ordinal,
            "Resolved dataset"
        );

        let cache = self.cache.clone();
        let palettes = self.palettes.clone();
        let method = request.interpolation.unwrap_or(self.settings.interpolation);
        tokio::task::spawn_blocking(move || {
            render_resolved(&cache, &palettes, resolved, &request, method)
        })
        .await
        .map_err(|e| TileError::Internal(format!("Render task failed: {}", e)))?
    }
}

/// Blocking stages: open, plan, resample, colour, encode.
fn render_resolved(
    cache: &ResourceCache,
    palettes: &PaletteRegistry,
    resolved: ResolvedDataset,
    request: &TileRequest,
    method: Interpolation,
) -> TileResult<TileOutcome> {
    let handle = cache.open(&resolved.path)?;
    let plan = VariablePlan::resolve(&request.variable, request.level, handle.as_ref())?;

    let tile = plan.render(handle.as_ref(), resolved.time_ordinal, &request.coord, method)?;
    if tile.all_invalid() {
        debug!(tile = %request.coord.cache_key(), plan = %plan, "Tile outside data");
        return transparent(resolved);
    }
    debug!(plan = %plan, valid = tile.valid_count(), "Resampled tile");

    let range = cache.get_or_compute_stats(&resolved.path, &handle, &plan.stats_key(), || {
        Ok(plan.value_range(handle.as_ref())?)
    });
    let range = match range {
        Ok(range) => range,
        Err(TileError::NotFound(msg)) => {
            debug!(plan = %plan, reason = %msg, "No statistics for variable");
            return transparent(resolved);
        }
        Err(e) => return Err(e),
    };
    if range.span().is_none() {
        warn!(plan = %plan, low = range.low, high = range.high, "Degenerate colour range");
    }

    let palette = palettes.resolve(request.palette.as_deref());
    let png = encode(&tile, range, palette)?;
    Ok(TileOutcome::Rendered { png, resolved })
}

fn encode(
    tile: &ResampledTile,
    range: tile_common::ValueRange,
    palette: &renderer::Palette,
) -> TileResult<Vec<u8>> {
    Ok(renderer::render_png(
        &tile.values,
        &tile.valid,
        tile.width,
        tile.height,
        range,
        palette,
    )?)
}

fn transparent(resolved: ResolvedDataset) -> TileResult<TileOutcome> {
    let png = renderer::transparent_png(TILE_SIZE, TILE_SIZE)?;
    Ok(TileOutcome::Transparent { png, resolved })
}
